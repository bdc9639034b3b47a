//! `check-connection`, `models` and `show`.

use std::path::Path;
use std::process::ExitCode;

use picscribe::config::{Config, ImageFormat};
use picscribe::inference::InferenceClient;
use picscribe::metadata::MetadataWriter;
use picscribe::pipeline::open_store;
use picscribe::PicscribeError;

pub fn check_connection(config: &Config) -> Result<ExitCode, PicscribeError> {
    let client = InferenceClient::from_config(&config.ollama)?;
    let endpoint = client.backend().endpoint().to_string();
    if client.check_connection() {
        println!("Vision endpoint reachable: {}", endpoint);
        Ok(ExitCode::SUCCESS)
    } else {
        println!("Cannot reach vision endpoint: {}", endpoint);
        Ok(ExitCode::from(1))
    }
}

pub fn models(config: &Config) -> Result<ExitCode, PicscribeError> {
    let client = InferenceClient::from_config(&config.ollama)?;
    let models = client.list_models()?;
    if models.is_empty() {
        println!("No models installed");
    }
    for model in models {
        let marker = if model == config.ollama.model
            || model.strip_suffix(":latest") == Some(config.ollama.model.as_str())
        {
            " (configured)"
        } else {
            ""
        };
        println!("{}{}", model, marker);
    }
    Ok(ExitCode::SUCCESS)
}

pub fn show(config: &Config, image: &Path) -> Result<ExitCode, PicscribeError> {
    let path = image.canonicalize().unwrap_or_else(|_| image.to_path_buf());
    // Read-only: a missing database is not created.
    let store = open_store(&config.database, true)?;

    match store.get(&path)? {
        Some(record) => {
            println!("Stored description ({}):", record.updated_at.to_rfc3339());
            println!("  {}", record.description);
        }
        None => println!("No stored description"),
    }
    if let Some(record) = store.rename_record(&path)? {
        println!("Named after ({}):", record.updated_at.to_rfc3339());
        println!("  {}", record.description);
    }

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let writer = MetadataWriter::from_config(&config.metadata);
    match writer.read_description(&path, ImageFormat::from_extension(extension))? {
        Some(text) => {
            println!("Embedded description:");
            println!("  {}", text);
        }
        None => println!("No embedded description"),
    }
    Ok(ExitCode::SUCCESS)
}
