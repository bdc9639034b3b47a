//! Description database maintenance.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Subcommand;

use picscribe::config::Config;
use picscribe::db::DescriptionStore;
use picscribe::PicscribeError;

#[derive(Subcommand)]
pub enum DbCommand {
    /// Show record counts and the database location
    Stats,

    /// List the most recently updated descriptions
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Write a consistent copy of the database
    Backup { file: PathBuf },
}

pub fn run(config: &Config, command: DbCommand) -> Result<ExitCode, PicscribeError> {
    let path = &config.database.path;
    if !path.exists() {
        println!("No database at {}", path.display());
        return Ok(ExitCode::from(1));
    }
    let store = DescriptionStore::open(path)?;

    match command {
        DbCommand::Stats => {
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            println!("Database: {}", path.display());
            println!("Records:  {}", store.count()?);
            println!("Renames:  {}", store.rename_count()?);
            println!("Size:     {} bytes", size);
        }
        DbCommand::List { limit } => {
            for record in store.list(Some(limit))? {
                println!(
                    "{}  {}\n    {}",
                    record.updated_at.format("%Y-%m-%d %H:%M:%S"),
                    record.file_path.display(),
                    one_line(&record.description, 100)
                );
            }
        }
        DbCommand::Backup { file } => {
            store.backup_to(&file)?;
            println!("Backed up {} to {}", path.display(), file.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn one_line(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
