//! `picscribe` command-line front end.

mod commands;
mod logging;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use picscribe::config::resolve_config;
use picscribe::pipeline::Mode;

#[derive(Parser)]
#[command(name = "picscribe")]
#[command(about = "Describe and rename images with a local vision model")]
#[command(version)]
struct Cli {
    /// Config file (default: ./picscribe.yaml, then the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print warnings, errors and the final summary
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe images and embed the description as metadata
    Process {
        /// Image file or directory
        path: PathBuf,

        /// Report what would happen without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Reprocess images that already have a description
        #[arg(long)]
        force: bool,

        /// Prompt to use instead of the configured one
        #[arg(long, value_name = "TEXT")]
        prompt: Option<String>,

        /// Only process the top level of a directory
        #[arg(long)]
        no_recursive: bool,
    },

    /// Rename images after their content
    Rename {
        /// Image file or directory
        path: PathBuf,

        /// Report the planned renames without moving anything
        #[arg(long)]
        dry_run: bool,

        /// Prompt to use instead of the configured one
        #[arg(long, value_name = "TEXT")]
        prompt: Option<String>,

        /// Only process the top level of a directory
        #[arg(long)]
        no_recursive: bool,
    },

    /// Process a directory, then keep processing new images until Ctrl-C
    Watch {
        directory: PathBuf,

        #[arg(long, default_value = "describe", value_parser = parse_mode)]
        mode: Mode,

        #[arg(long)]
        dry_run: bool,
    },

    /// Check that the vision endpoint is reachable
    CheckConnection,

    /// List the models the vision endpoint serves
    Models,

    /// Show the stored and embedded description of an image
    Show { image: PathBuf },

    /// Description database maintenance
    #[command(subcommand)]
    Db(commands::db::DbCommand),

    /// Inspect the effective configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

fn parse_mode(value: &str) -> Result<Mode, String> {
    value.parse()
}

fn main() -> ExitCode {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let (config, config_path) = match resolve_config(cli.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(1);
        }
    };

    let json = cli.json_logs || config.logging.format == picscribe::config::LogFormat::Json;
    if let Err(e) = logging::init(&config.logging, cli.verbose, cli.quiet, json) {
        eprintln!("Warning: logging setup failed: {}", e);
    }

    match &config_path {
        Some(path) => tracing::debug!("Loaded config from {}", path.display()),
        None => tracing::debug!("No config file found, using defaults"),
    }

    let show_progress = !cli.quiet && !json;
    let result = match cli.command {
        Commands::Process {
            path,
            dry_run,
            force,
            prompt,
            no_recursive,
        } => commands::run::batch(
            &config,
            &path,
            commands::run::BatchArgs {
                mode: Mode::Describe,
                dry_run,
                force,
                prompt,
                recursive: !no_recursive,
                show_progress,
            },
        ),
        Commands::Rename {
            path,
            dry_run,
            prompt,
            no_recursive,
        } => commands::run::batch(
            &config,
            &path,
            commands::run::BatchArgs {
                mode: Mode::Rename,
                dry_run,
                force: false,
                prompt,
                recursive: !no_recursive,
                show_progress,
            },
        ),
        Commands::Watch {
            directory,
            mode,
            dry_run,
        } => commands::run::watch(&config, &directory, mode, dry_run, show_progress),
        Commands::CheckConnection => commands::inspect::check_connection(&config),
        Commands::Models => commands::inspect::models(&config),
        Commands::Show { image } => commands::inspect::show(&config, &image),
        Commands::Db(command) => commands::db::run(&config, command),
        Commands::Config(command) => commands::config::run(&config, command),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}
