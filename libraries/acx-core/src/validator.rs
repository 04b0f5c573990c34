//! Input validation
//!
//! Decides whether an upload is worth spending engine time on. Expected
//! rejections come back as [`ValidationResult::Rejected`]; only unexpected
//! faults (unreadable file, engine binary missing) are errors.

use crate::asset::{AudioAsset, ContainerKind};
use crate::config::PipelineConfig;
use crate::engine::{AudioEngine, EngineError, Probe};
use crate::error::{PipelineError, Result};
use crate::header;
use crate::BYTES_PER_MB;
use std::sync::Arc;
use thiserror::Error;

/// Why an upload was turned away
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("File has no extension (expected .mp3 or .wav)")]
    MissingExtension,

    #[error("Unsupported file type: .{0} (expected .mp3 or .wav)")]
    UnsupportedExtension(String),

    #[error("File is empty")]
    Empty,

    #[error("File is {} MB, the limit is {} MB", .size / BYTES_PER_MB, .limit / BYTES_PER_MB)]
    TooLarge { size: u64, limit: u64 },

    #[error("Not a decodable audio file: {0}")]
    NotAudio(String),
}

/// How far an accepted input was checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The engine probe found an audio stream
    Probed,
    /// The probe ran out of time; trusted by extension
    TimedOut,
    /// Above the large-file threshold; only the header was read
    SkippedLargeFile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedInput {
    pub container: ContainerKind,
    pub verification: Verification,
    pub probe: Option<Probe>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Accepted(AcceptedInput),
    Rejected(RejectionReason),
}

pub struct InputValidator {
    engine: Arc<dyn AudioEngine>,
    config: PipelineConfig,
}

impl InputValidator {
    pub fn new(engine: Arc<dyn AudioEngine>, config: PipelineConfig) -> Self {
        Self { engine, config }
    }

    pub async fn validate(&self, asset: &AudioAsset) -> Result<ValidationResult> {
        let container = match asset.container() {
            Some(container) => container,
            None if asset.extension().is_empty() => {
                return Ok(ValidationResult::Rejected(RejectionReason::MissingExtension))
            }
            None => {
                return Ok(ValidationResult::Rejected(
                    RejectionReason::UnsupportedExtension(asset.extension().to_string()),
                ))
            }
        };

        if asset.byte_size() == 0 {
            return Ok(ValidationResult::Rejected(RejectionReason::Empty));
        }

        if asset.byte_size() > self.config.max_input_bytes {
            return Ok(ValidationResult::Rejected(RejectionReason::TooLarge {
                size: asset.byte_size(),
                limit: self.config.max_input_bytes,
            }));
        }

        if asset.byte_size() > self.config.large_file_threshold_bytes {
            return self.validate_header_only(asset, container).await;
        }

        self.validate_with_probe(asset, container).await
    }

    async fn validate_header_only(
        &self,
        asset: &AudioAsset,
        container: ContainerKind,
    ) -> Result<ValidationResult> {
        tracing::info!(
            "Input is {:.1} MB, checking {} header only",
            asset.size_mb(),
            container.extension()
        );

        if header::sniff(asset.path(), container).await? {
            Ok(ValidationResult::Accepted(AcceptedInput {
                container,
                verification: Verification::SkippedLargeFile,
                probe: None,
            }))
        } else {
            Ok(ValidationResult::Rejected(RejectionReason::NotAudio(format!(
                "header does not match a {} file",
                container.extension()
            ))))
        }
    }

    async fn validate_with_probe(
        &self,
        asset: &AudioAsset,
        container: ContainerKind,
    ) -> Result<ValidationResult> {
        let timeout = self.config.probe_timeout(asset.byte_size());

        match self.engine.inspect(asset.path(), timeout).await {
            Ok(probe) if probe.has_audio() => Ok(ValidationResult::Accepted(AcceptedInput {
                container,
                verification: Verification::Probed,
                probe: Some(probe),
            })),
            Ok(_) => Ok(ValidationResult::Rejected(RejectionReason::NotAudio(
                "no audio stream found".to_string(),
            ))),
            Err(EngineError::TimedOut { timeout, .. }) => {
                tracing::warn!(
                    "Probe timed out after {:?}, continuing unverified ({} by extension)",
                    timeout,
                    container.extension()
                );
                Ok(ValidationResult::Accepted(AcceptedInput {
                    container,
                    verification: Verification::TimedOut,
                    probe: None,
                }))
            }
            // The engine could not make sense of the container
            Err(EngineError::Failed { diagnostics, .. }) => Ok(ValidationResult::Rejected(
                RejectionReason::NotAudio(first_line(&diagnostics)),
            )),
            Err(e) => Err(PipelineError::Engine(e)),
        }
    }
}

fn first_line(diagnostics: &str) -> String {
    diagnostics
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("engine could not read the file")
        .to_string()
}
