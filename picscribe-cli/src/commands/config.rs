//! Effective configuration inspection.

use std::process::ExitCode;

use clap::Subcommand;

use picscribe::config::Config;
use picscribe::PicscribeError;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print one value by dotted key, e.g. `ollama.timeout`
    Get { key: String },

    /// Print the whole effective configuration as YAML
    Dump,
}

pub fn run(config: &Config, command: ConfigCommand) -> Result<ExitCode, PicscribeError> {
    match command {
        ConfigCommand::Get { key } => {
            let value = config.get(&key)?;
            println!("{}", render(&value)?);
        }
        ConfigCommand::Dump => {
            print!("{}", config.to_yaml()?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn render(value: &serde_yaml::Value) -> Result<String, PicscribeError> {
    Ok(match value {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map_err(picscribe::ConfigError::from)?
            .trim_end()
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_scalars_plainly() {
        let config = Config::default();
        assert_eq!(render(&config.get("ollama.model").unwrap()).unwrap(), "llava");
        assert_eq!(render(&config.get("ollama.retry_attempts").unwrap()).unwrap(), "3");
    }

    #[test]
    fn test_render_sequence_as_yaml() {
        let config = Config::default();
        let rendered = render(&config.get("images.supported_extensions").unwrap()).unwrap();
        assert!(rendered.starts_with("- png"));
    }
}
