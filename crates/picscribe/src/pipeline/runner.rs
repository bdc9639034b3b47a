use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, info_span, warn};

use crate::config::Config;
use crate::db::DescriptionStore;
use crate::inference::InferenceClient;
use crate::metadata::MetadataWriter;
use crate::naming::{NameDeriver, NameOptions};
use crate::storage::{CollisionResolver, DirectoryLocks, SafeFileMover};
use crate::validation::ImageValidator;
use crate::worker::job::Job;

use super::config::{Mode, PipelineConfig, RunOptions};
use super::context::{redact_path, PipelineContext};
use super::error::PipelineError;
use super::progress::{Phase, ProgressEvent, ProgressReporter};
use super::summary::{Action, FileOutcome};

/// The per-file state machine shared by batch runs, the worker pool and
/// watch mode.
pub struct Pipeline {
    config: PipelineConfig,
    validator: ImageValidator,
    client: InferenceClient,
    store: DescriptionStore,
    metadata: MetadataWriter,
    deriver: NameDeriver,
    resolver: CollisionResolver,
    mover: SafeFileMover,
    locks: DirectoryLocks,
    /// Targets handed out by dry-run renames, which never occupy them on disk.
    planned: Mutex<HashSet<PathBuf>>,
}

impl Pipeline {
    /// Production constructor. The client and the store are built by the
    /// caller, which owns the pre-flight checks for both.
    pub fn from_config(
        config: &Config,
        options: &RunOptions,
        client: InferenceClient,
        store: DescriptionStore,
    ) -> Self {
        Self::new(
            PipelineConfig::from_config(config, options),
            client,
            store,
            MetadataWriter::from_config(&config.metadata),
            NameDeriver::new(NameOptions::from_config(&config.filename)),
            SafeFileMover::from_config(&config.file_operations),
        )
    }

    /// Inject specific sub-components.
    pub fn new(
        config: PipelineConfig,
        client: InferenceClient,
        store: DescriptionStore,
        metadata: MetadataWriter,
        deriver: NameDeriver,
        mover: SafeFileMover,
    ) -> Self {
        let validator = ImageValidator::new(
            config.supported_extensions.clone(),
            config.max_file_size,
            config.verify_images,
        );
        Self {
            config,
            validator,
            client,
            store,
            metadata,
            deriver,
            resolver: CollisionResolver::new(),
            mover,
            locks: DirectoryLocks::new(),
            planned: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &DescriptionStore {
        &self.store
    }

    /// Runs one file to a terminal state. Never panics on per-file errors.
    pub fn run(&self, job: &Job, progress: &dyn ProgressReporter) -> FileOutcome {
        let filename = redact_path(job.path());
        let _pipeline_span = info_span!("pipeline",
            run_id = %job.id,
            filename = %filename,
            mode = %self.config.mode,
        )
        .entered();

        let mut ctx = PipelineContext::new(job);
        let path = job.path().to_path_buf();

        let outcome = match self.process(&mut ctx, progress) {
            Ok(Some(action)) => {
                info!(attempts = ctx.inference_attempts, "Succeeded: {}", describe_action(&action));
                FileOutcome::Succeeded { path, action }
            }
            Ok(None) => {
                info!("Skipped: already processed");
                FileOutcome::Skipped { path }
            }
            Err(e) => {
                let kind = e.kind();
                warn!(kind = %kind, "Failed: {}", e);
                FileOutcome::Failed {
                    path,
                    kind,
                    message: e.to_string(),
                }
            }
        };

        progress.report(ProgressEvent::Finished {
            outcome: outcome.clone(),
        });
        outcome
    }

    fn process(
        &self,
        ctx: &mut PipelineContext<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<Option<Action>, PipelineError> {
        if self.should_skip(ctx.path())? {
            return Ok(None);
        }

        // Step 1: Validate locally, before anything leaves the machine
        {
            let _step = info_span!("validate").entered();
            self.phase(ctx, progress, Phase::Validating);
            self.step_validate(ctx)?;
        }

        // Step 2: Describe the image
        {
            let _step = info_span!("infer").entered();
            self.phase(ctx, progress, Phase::Inferring);
            self.step_infer(ctx)?;
        }

        // Step 3: Persist or rename
        let action = match self.config.mode {
            Mode::Describe => self.step_record_description(ctx, progress)?,
            Mode::Rename => self.step_rename(ctx, progress)?,
        };
        Ok(Some(action))
    }

    fn phase(&self, ctx: &PipelineContext<'_>, progress: &dyn ProgressReporter, phase: Phase) {
        progress.report(ProgressEvent::Phase {
            path: ctx.path().to_path_buf(),
            phase,
        });
    }

    fn should_skip(&self, path: &Path) -> Result<bool, PipelineError> {
        if self.config.force {
            return Ok(false);
        }
        match self.config.mode {
            Mode::Describe => Ok(self.store.has_record(path)?),
            Mode::Rename if self.config.record_renames => self.is_already_named(path),
            Mode::Rename => Ok(false),
        }
    }

    /// A rename run skips a file whose recorded description already derives
    /// its current name, with or without a collision suffix.
    fn is_already_named(&self, path: &Path) -> Result<bool, PipelineError> {
        let Some(record) = self.store.rename_record(path)? else {
            return Ok(false);
        };
        let base = self.deriver.derive(&record.description);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        if stem == base {
            return Ok(true);
        }
        Ok(stem
            .strip_prefix(base.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false))
    }

    fn step_validate(&self, ctx: &mut PipelineContext<'_>) -> Result<(), PipelineError> {
        let validated = self.validator.validate(ctx.path())?;
        ctx.format = validated.format.unwrap_or(ctx.job.candidate.format);
        debug!(
            size = validated.size,
            format = ?ctx.format,
            dimensions = ?validated.dimensions,
            "Image validated"
        );

        ctx.image = std::fs::read(ctx.path()).map_err(|e| PipelineError::ReadImage {
            path: ctx.path().to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    fn step_infer(&self, ctx: &mut PipelineContext<'_>) -> Result<(), PipelineError> {
        let inference = self.client.describe(&ctx.image, &self.config.prompt)?;
        debug!(
            attempts = inference.attempts,
            chars = inference.description.chars().count(),
            "Description received"
        );
        ctx.inference_attempts = inference.attempts;
        ctx.description = Some(inference.description);
        // The payload is no longer needed; free it before the slow steps.
        ctx.image = Vec::new();
        Ok(())
    }

    fn step_record_description(
        &self,
        ctx: &mut PipelineContext<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<Action, PipelineError> {
        let description = ctx.description().to_string();

        if self.config.dry_run {
            info!("Dry run: would record description: {}", description);
            return Ok(Action::PlannedDescription { description });
        }

        {
            let _step = info_span!("persist").entered();
            self.phase(ctx, progress, Phase::Persisting);
            self.store.upsert(ctx.path(), &description)?;
        }

        // The store write stands even if embedding fails below.
        let embedded = {
            let _step = info_span!("embed_metadata").entered();
            self.phase(ctx, progress, Phase::Embedding);
            self.metadata
                .embed_with_retry(ctx.path(), ctx.format, &description)?
        };

        Ok(Action::Described {
            description,
            embedded,
        })
    }

    fn step_rename(
        &self,
        ctx: &mut PipelineContext<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<Action, PipelineError> {
        let source = ctx.path().to_path_buf();
        let directory = source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let extension = ctx.job.candidate.extension().to_string();

        let base = {
            let _step = info_span!("plan_rename").entered();
            self.phase(ctx, progress, Phase::PlanningRename);
            self.deriver.derive(ctx.description())
        };

        let current_name = source.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if current_name == format!("{}.{}", base, extension) {
            if !self.config.dry_run {
                self.record_rename(&source, ctx.description());
            }
            return Ok(Action::NameUnchanged);
        }

        if self.config.dry_run {
            let target = {
                let mut planned = self.planned.lock().unwrap_or_else(|p| p.into_inner());
                let target = self
                    .resolver
                    .resolve_avoiding(&directory, &base, &extension, &planned)?;
                planned.insert(target.clone());
                target
            };
            info!(
                "Dry run: would rename {} -> {}",
                source.display(),
                target.display()
            );
            return Ok(Action::PlannedRename { target });
        }

        let moved = {
            let _step = info_span!("move_file").entered();
            self.phase(ctx, progress, Phase::Moving);
            // Resolve and move under one lock so two workers never pick the same name.
            self.locks.with_lock(&directory, || {
                let target = self.resolver.resolve(&directory, &base, &extension)?;
                self.mover.move_file(&source, &target)
            })?
        };
        debug!(attempts = moved.attempts, "Move verified");

        self.record_rename(&moved.target, ctx.description());

        Ok(Action::Renamed {
            target: moved.target,
            backup: moved.backup,
        })
    }

    /// The move is the durability boundary for renames; a failed store write
    /// only costs a re-description on the next run.
    fn record_rename(&self, path: &Path, description: &str) {
        if !self.config.record_renames {
            return;
        }
        if let Err(e) = self.store.record_rename(path, description) {
            warn!("Renamed file could not be recorded: {}", e);
        }
    }
}

fn describe_action(action: &Action) -> String {
    match action {
        Action::Described { embedded, .. } => format!("description recorded ({:?})", embedded),
        Action::Renamed { target, .. } => format!("renamed to {}", redact_path(target)),
        Action::NameUnchanged => "name already matches".to_string(),
        Action::PlannedDescription { .. } => "description planned".to_string(),
        Action::PlannedRename { target } => format!("would rename to {}", redact_path(target)),
    }
}
