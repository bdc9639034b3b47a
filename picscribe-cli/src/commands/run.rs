//! `process`, `rename` and `watch`.

use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use picscribe::config::Config;
use picscribe::inference::InferenceClient;
use picscribe::pipeline::{
    open_store, Action, BatchOrchestrator, FileOutcome, Mode, NoopProgress, Pipeline,
    ProgressReporter, RunOptions, RunSummary,
};
use picscribe::worker::DirectoryScanner;
use picscribe::PicscribeError;

use crate::progress::BarProgress;

pub struct BatchArgs {
    pub mode: Mode,
    pub dry_run: bool,
    pub force: bool,
    pub prompt: Option<String>,
    pub recursive: bool,
    pub show_progress: bool,
}

pub fn batch(config: &Config, path: &Path, args: BatchArgs) -> Result<ExitCode, PicscribeError> {
    let options = RunOptions {
        mode: args.mode,
        dry_run: args.dry_run,
        force: args.force,
        prompt: args.prompt,
    };
    let orchestrator = prepare(config, &options)?;
    let scanner = DirectoryScanner::new(path, &config.images).with_recursive(args.recursive);

    let bar = args.show_progress.then(|| Arc::new(BarProgress::new()));
    let summary = orchestrator.run_path(&scanner, reporter(&bar))?;
    if let Some(bar) = &bar {
        bar.finish();
    }

    print_summary(&summary, options.dry_run);
    Ok(exit_code(&summary))
}

pub fn watch(
    config: &Config,
    directory: &Path,
    mode: Mode,
    dry_run: bool,
    show_progress: bool,
) -> Result<ExitCode, PicscribeError> {
    let options = RunOptions {
        mode,
        dry_run,
        ..Default::default()
    };
    let orchestrator = prepare(config, &options)?;
    let scanner = DirectoryScanner::new(directory, &config.images);

    let bar = show_progress.then(|| Arc::new(BarProgress::new()));
    let summary = orchestrator.watch(
        &scanner,
        config.processing.watch_poll_interval(),
        reporter(&bar),
    )?;
    if let Some(bar) = &bar {
        bar.finish();
    }

    print_summary(&summary, dry_run);
    Ok(exit_code(&summary))
}

/// Builds the orchestrator. The connectivity pre-flight (skipped for dry
/// runs) and the store open are fatal before any file is touched.
fn prepare(config: &Config, options: &RunOptions) -> Result<BatchOrchestrator, PicscribeError> {
    let client = InferenceClient::from_config(&config.ollama)?;
    if !options.dry_run && !client.check_connection() {
        return Err(PicscribeError::Preflight {
            endpoint: client.backend().endpoint().to_string(),
        });
    }

    let store = open_store(&config.database, options.dry_run)?;
    let pipeline = Pipeline::from_config(config, options, client, store);

    Ok(BatchOrchestrator::new(Arc::new(pipeline), config.processing.workers)
        .with_shutdown(install_interrupt_handler()))
}

fn install_interrupt_handler() -> Arc<AtomicBool> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::Relaxed) {
            // Second Ctrl-C: stop waiting for the current file.
            std::process::exit(130);
        }
        eprintln!("Interrupted, finishing the current file...");
    }) {
        log::warn!("Could not install Ctrl-C handler: {}", e);
    }
    shutdown
}

fn reporter(bar: &Option<Arc<BarProgress>>) -> Arc<dyn ProgressReporter> {
    match bar {
        Some(bar) => Arc::clone(bar) as Arc<dyn ProgressReporter>,
        None => Arc::new(NoopProgress),
    }
}

fn exit_code(summary: &RunSummary) -> ExitCode {
    if summary.interrupted {
        ExitCode::from(130)
    } else if summary.failed > 0 {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    if dry_run {
        for outcome in &summary.outcomes {
            if let FileOutcome::Succeeded { path, action } = outcome {
                match action {
                    Action::PlannedRename { target } => {
                        println!("{} -> {}", path.display(), target.display())
                    }
                    Action::PlannedDescription { description } => {
                        println!("{}: {}", path.display(), description)
                    }
                    _ => {}
                }
            }
        }
    }

    println!(
        "{}{} files in {:.1}s: {} succeeded, {} skipped, {} failed",
        if dry_run { "Dry run: " } else { "" },
        summary.attempted,
        summary.elapsed.as_secs_f64(),
        summary.succeeded,
        summary.skipped,
        summary.failed,
    );
    for failure in &summary.failures {
        println!(
            "  FAILED [{}] {}: {}",
            failure.kind,
            failure.path.display(),
            failure.message
        );
    }
    if summary.interrupted {
        println!("Run was interrupted; rerun to pick up the remaining files.");
    }
}
