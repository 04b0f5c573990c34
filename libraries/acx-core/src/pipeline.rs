//! Pipeline orchestrator
//!
//! One [`MasteringPipeline`] serves any number of concurrent jobs; each job is
//! a [`JobInput`] produced by `ingest_*` and consumed by [`MasteringPipeline::run`].

use crate::asset::{extension_of, AudioAsset};
use crate::config::{EngineConfig, EstimatorConfig, PipelineConfig};
use crate::engine::{AudioEngine, FfmpegEngine};
use crate::error::{PipelineError, Result};
use crate::estimator::{Estimator, ProcessingEstimate};
use crate::executor::TranscodeExecutor;
use crate::lifecycle::{ArtifactRole, JobId, JobWorkspace, TempArtifact};
use crate::planner::FilterChainPlanner;
use crate::profile::MasteringProfile;
use crate::validator::{InputValidator, ValidationResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;

/// Terminal result of one run: exactly one per job
pub type ProcessingOutcome = std::result::Result<ProcessedAudio, PipelineError>;

/// An upload persisted into its own workspace, ready to run
#[derive(Debug)]
pub struct JobInput {
    workspace: JobWorkspace,
    input: TempArtifact,
    asset: AudioAsset,
}

impl JobInput {
    pub fn id(&self) -> JobId {
        self.workspace.id()
    }

    pub fn asset(&self) -> &AudioAsset {
        &self.asset
    }
}

/// Finished, conformant MP3 still in temporary storage
///
/// Dropping it deletes the file and its workspace, so hand it off first.
#[derive(Debug)]
pub struct ProcessedAudio {
    // Field order matters: the artifact must drop before its directory
    artifact: TempArtifact,
    workspace: JobWorkspace,
    byte_size: u64,
    second_pass: bool,
}

impl ProcessedAudio {
    pub(crate) fn new(
        workspace: JobWorkspace,
        artifact: TempArtifact,
        byte_size: u64,
        second_pass: bool,
    ) -> Self {
        Self {
            artifact,
            workspace,
            byte_size,
            second_pass,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.workspace.id()
    }

    pub fn path(&self) -> &Path {
        self.artifact.path()
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Whether the remux-only finishing pass ran
    pub fn ran_second_pass(&self) -> bool {
        self.second_pass
    }

    /// Open the file for streaming to a caller
    pub async fn open(&self) -> std::io::Result<tokio::fs::File> {
        tokio::fs::File::open(self.artifact.path()).await
    }

    /// Move the file to `dest` and clean up the workspace
    pub async fn deliver_to(self, dest: &Path) -> std::io::Result<PathBuf> {
        let Self {
            artifact,
            workspace,
            ..
        } = self;
        let delivered = artifact.persist(dest).await;
        workspace.close().await;
        delivered
    }
}

pub struct MasteringPipeline {
    config: PipelineConfig,
    validator: InputValidator,
    planner: FilterChainPlanner,
    executor: TranscodeExecutor,
    estimator: Estimator,
}

impl MasteringPipeline {
    /// Build a pipeline; `config` should already have passed [`PipelineConfig::validate`]
    pub fn new(config: PipelineConfig, engine: Arc<dyn AudioEngine>) -> Self {
        if let Err(e) = config.validate() {
            tracing::warn!("{}", e);
        }
        let profile = MasteringProfile::ACX;
        let mut executor = TranscodeExecutor::new(Arc::clone(&engine), config.encode_timeout());
        if config.verify_output {
            executor = executor.with_verification(profile);
        }

        Self {
            validator: InputValidator::new(engine, config.clone()),
            planner: FilterChainPlanner::new(profile, config.second_pass_threshold_bytes),
            executor,
            estimator: Estimator::default(),
            config,
        }
    }

    /// Pipeline backed by the FFmpeg engine
    pub fn with_ffmpeg(config: PipelineConfig, engine: &EngineConfig) -> Self {
        Self::new(config, Arc::new(FfmpegEngine::from_config(engine)))
    }

    pub fn with_estimator(mut self, config: EstimatorConfig) -> Self {
        self.estimator = Estimator::new(config);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Advisory estimate; does not touch the filesystem
    pub fn estimate(&self, byte_size: u64) -> ProcessingEstimate {
        self.estimator.estimate(byte_size)
    }

    /// Copy a file into a new job workspace
    pub async fn ingest_file(&self, source: &Path) -> Result<JobInput> {
        let workspace = JobWorkspace::create(&self.config.temp_root).await?;
        let extension = extension_of(source).unwrap_or_default();
        let input = workspace.artifact(ArtifactRole::Input, &input_file_name(&extension));

        let byte_size = tokio::fs::copy(source, input.path()).await?;
        tracing::info!(
            "Job {}: ingested {} ({} bytes)",
            workspace.id(),
            source.display(),
            byte_size
        );

        let asset = AudioAsset::new(input.path(), extension, byte_size);
        Ok(JobInput {
            workspace,
            input,
            asset,
        })
    }

    /// Persist uploaded bytes into a new job workspace
    ///
    /// `file_name` is only used for its extension; the stored name is fixed.
    pub async fn ingest_bytes(&self, file_name: &str, data: &[u8]) -> Result<JobInput> {
        let workspace = JobWorkspace::create(&self.config.temp_root).await?;
        let extension = extension_of(Path::new(file_name)).unwrap_or_default();
        let input = workspace.artifact(ArtifactRole::Input, &input_file_name(&extension));

        tokio::fs::write(input.path(), data).await?;
        tracing::info!(
            "Job {}: stored upload {} ({} bytes)",
            workspace.id(),
            file_name,
            data.len()
        );

        let asset = AudioAsset::new(input.path(), extension, data.len() as u64);
        Ok(JobInput {
            workspace,
            input,
            asset,
        })
    }

    /// Validate, plan and execute one job
    pub async fn run(&self, job: JobInput) -> ProcessingOutcome {
        let span = tracing::info_span!("job", id = %job.id());
        self.run_job(job).instrument(span).await
    }

    async fn run_job(&self, job: JobInput) -> ProcessingOutcome {
        let JobInput {
            workspace,
            input,
            asset,
        } = job;

        let accepted = match self.validator.validate(&asset).await? {
            ValidationResult::Accepted(accepted) => accepted,
            ValidationResult::Rejected(reason) => {
                tracing::info!("Rejected: {}", reason);
                input.discard().await;
                workspace.close().await;
                return Err(PipelineError::Validation(reason));
            }
        };

        let asset = match accepted.probe.clone() {
            Some(probe) => asset.with_probe(probe),
            None => asset,
        };
        let plan = self.planner.plan(&asset, &accepted);
        tracing::info!(
            "Accepted {} input ({:?}), large-file branch: {}",
            accepted.container.extension(),
            accepted.verification,
            plan.is_large_input()
        );

        let processed = self.executor.execute(input, &plan, workspace).await?;
        tracing::info!(
            "Finished: {} bytes, second pass: {}",
            processed.byte_size(),
            processed.ran_second_pass()
        );
        Ok(processed)
    }
}

/// Stored input name: fixed stem, sanitized extension
fn input_file_name(extension: &str) -> String {
    let extension: String = extension
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();
    if extension.is_empty() {
        "input".to_string()
    } else {
        format!("input.{}", extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_file_name_is_sanitized() {
        assert_eq!(input_file_name("WAV"), "input.wav");
        assert_eq!(input_file_name("mp3/../../x"), "input.mp3x");
        assert_eq!(input_file_name(""), "input");
    }
}
