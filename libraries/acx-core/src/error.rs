/// Pipeline error types
use crate::engine::{EncodePass, EngineError};
use crate::validator::RejectionReason;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using `PipelineError`
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Coarse category of a failed job, for callers that branch on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    EngineExecution,
    EngineTimeout,
    Integrity,
    Config,
    Internal,
}

/// Terminal failure of a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The upload was rejected before any encoding
    #[error("Validation failed: {0}")]
    Validation(#[from] RejectionReason),

    /// The engine exited non-zero
    #[error("Engine failed during {pass} (exit {}): {diagnostics}", exit_code(.status))]
    EngineExecution {
        pass: EncodePass,
        status: Option<i32>,
        diagnostics: String,
    },

    /// The caller-side encode limit was hit and the engine was killed
    #[error("Engine exceeded {timeout:?} during {pass}")]
    EngineTimeout { pass: EncodePass, timeout: Duration },

    /// The engine reported success but the artifact is missing, empty or off-profile
    #[error("Integrity check failed after {pass} for {}: {reason}", .path.display())]
    Integrity {
        pass: EncodePass,
        path: PathBuf,
        reason: String,
    },

    /// Pipeline settings are inconsistent
    #[error("Invalid pipeline configuration: {0}")]
    Config(String),

    /// The engine could not be driven at all
    #[error("Engine error: {0}")]
    Engine(EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::EngineExecution { .. } => ErrorKind::EngineExecution,
            Self::EngineTimeout { .. } => ErrorKind::EngineTimeout,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Config(_) => ErrorKind::Config,
            Self::Engine(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Engine stderr attached to an execution failure
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::EngineExecution { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }

    /// Map an encode failure to the error reported for `pass`
    pub(crate) fn from_encode(pass: EncodePass, err: EngineError) -> Self {
        match err {
            EngineError::Failed {
                status,
                diagnostics,
                ..
            } => Self::EngineExecution {
                pass,
                status,
                diagnostics,
            },
            EngineError::TimedOut { timeout, .. } => Self::EngineTimeout { pass, timeout },
            other => Self::Engine(other),
        }
    }
}

fn exit_code(status: &Option<i32>) -> String {
    status.map_or_else(|| "signal".to_string(), |code| code.to_string())
}
