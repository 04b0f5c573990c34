//! Transcode execution
//!
//! Pass 1 runs the full filter chain into `intermediate.mp3`. The plan then
//! decides the finishing branch: a stream-copy remux into `final.mp3` (which
//! also scrubs metadata a second time), or a plain rename of the
//! intermediate. Either way the final file must exist and be non-empty before
//! the job counts as done. Engine failures are never retried.

use crate::conformance;
use crate::engine::{AudioEngine, EncodeOperation, EncodePass, EncodeRequest};
use crate::error::{PipelineError, Result};
use crate::lifecycle::{ArtifactRole, JobWorkspace, TempArtifact};
use crate::pipeline::ProcessedAudio;
use crate::planner::ProcessingPlan;
use crate::profile::MasteringProfile;
use std::sync::Arc;
use std::time::Duration;

const INTERMEDIATE_FILE: &str = "intermediate.mp3";
const FINAL_FILE: &str = "final.mp3";
const VERIFY_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TranscodeExecutor {
    engine: Arc<dyn AudioEngine>,
    encode_timeout: Option<Duration>,
    /// Profile to check the finished file against, if verification is on
    verify_against: Option<MasteringProfile>,
}

impl TranscodeExecutor {
    pub fn new(engine: Arc<dyn AudioEngine>, encode_timeout: Option<Duration>) -> Self {
        Self {
            engine,
            encode_timeout,
            verify_against: None,
        }
    }

    pub fn with_verification(mut self, profile: MasteringProfile) -> Self {
        self.verify_against = Some(profile);
        self
    }

    /// Run the plan on `input`, consuming it. The returned artifact keeps the
    /// workspace alive until the caller is done with it.
    pub async fn execute(
        &self,
        input: TempArtifact,
        plan: &ProcessingPlan,
        workspace: JobWorkspace,
    ) -> Result<ProcessedAudio> {
        let intermediate = workspace.artifact(ArtifactRole::Intermediate, INTERMEDIATE_FILE);

        tracing::info!(
            "Pass 1: {} stages -> {}",
            plan.filter_chain.filters().len(),
            intermediate.path().display()
        );
        let master = self
            .engine
            .encode(&EncodeRequest {
                input: input.path(),
                output: intermediate.path(),
                operation: EncodeOperation::Master(plan),
                timeout: self.encode_timeout,
            })
            .await;

        // Pass 1 was the last reader of the input copy
        input.discard().await;

        if let Err(e) = master {
            tracing::error!("Pass 1 failed: {}", e);
            return Err(PipelineError::from_encode(EncodePass::Master, e));
        }

        let intermediate_size = require_non_empty(&intermediate, EncodePass::Master).await?;

        let (final_artifact, second_pass) = if plan.needs_second_pass(intermediate_size) {
            tracing::info!(
                "Pass 2: remuxing {} byte intermediate",
                intermediate_size
            );
            let final_artifact = workspace.artifact(ArtifactRole::Final, FINAL_FILE);
            let finish = self
                .engine
                .encode(&EncodeRequest {
                    input: intermediate.path(),
                    output: final_artifact.path(),
                    operation: EncodeOperation::Remux,
                    timeout: self.encode_timeout,
                })
                .await;

            intermediate.discard().await;

            if let Err(e) = finish {
                tracing::error!("Pass 2 failed: {}", e);
                return Err(PipelineError::from_encode(EncodePass::Finish, e));
            }
            (final_artifact, true)
        } else {
            tracing::info!("Skipping pass 2, promoting intermediate");
            let dest = workspace.path().join(FINAL_FILE);
            (intermediate.promote(dest, ArtifactRole::Final).await?, false)
        };

        let byte_size = require_non_empty(&final_artifact, EncodePass::Finish).await?;

        if let Some(profile) = &self.verify_against {
            self.verify(&final_artifact, profile).await?;
        }

        Ok(ProcessedAudio::new(workspace, final_artifact, byte_size, second_pass))
    }

    async fn verify(&self, artifact: &TempArtifact, profile: &MasteringProfile) -> Result<()> {
        let probe = self
            .engine
            .inspect(artifact.path(), VERIFY_PROBE_TIMEOUT)
            .await
            .map_err(PipelineError::Engine)?;

        let report = conformance::check(&probe, profile);
        if report.is_conformant() {
            tracing::debug!("Output conforms to profile");
            Ok(())
        } else {
            Err(PipelineError::Integrity {
                pass: EncodePass::Finish,
                path: artifact.path().to_path_buf(),
                reason: report.to_string(),
            })
        }
    }
}

/// The engine said it succeeded; make sure there is something to show for it
async fn require_non_empty(artifact: &TempArtifact, pass: EncodePass) -> Result<u64> {
    let reason = match artifact.size().await? {
        Some(size) if size > 0 => return Ok(size),
        Some(_) => "output file is empty",
        None => "output file was not created",
    };
    tracing::error!("{} produced no usable output: {}", pass, reason);
    Err(PipelineError::Integrity {
        pass,
        path: artifact.path().to_path_buf(),
        reason: reason.to_string(),
    })
}
