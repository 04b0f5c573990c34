//! External audio engine capability
//!
//! The pipeline never shells out directly. It talks to an [`AudioEngine`],
//! which can inspect a file (bounded by a timeout) and run an encode described
//! by an [`EncodeRequest`]. [`FfmpegEngine`] is the production implementation;
//! tests substitute their own.

mod ffmpeg;
mod probe;

pub use ffmpeg::{build_master_args, build_probe_args, build_remux_args, FfmpegEngine};
pub use probe::{AudioStreamInfo, Probe};

use crate::planner::ProcessingPlan;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Which of the (at most) two encode passes an invocation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodePass {
    /// Full filter chain, encode to the delivery format
    Master,
    /// Stream-copy finishing pass (metadata scrub, container finalization)
    Finish,
}

impl fmt::Display for EncodePass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => write!(f, "pass 1 (master)"),
            Self::Finish => write!(f, "pass 2 (finish)"),
        }
    }
}

/// What an encode invocation should do
#[derive(Debug, Clone, Copy)]
pub enum EncodeOperation<'a> {
    /// Apply the plan's filter chain and output format
    Master(&'a ProcessingPlan),
    /// Copy the audio stream untouched, dropping all metadata
    Remux,
}

impl EncodeOperation<'_> {
    pub fn pass(&self) -> EncodePass {
        match self {
            Self::Master(_) => EncodePass::Master,
            Self::Remux => EncodePass::Finish,
        }
    }
}

/// One encode invocation
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub operation: EncodeOperation<'a>,
    /// Kill the engine if it runs longer than this
    pub timeout: Option<Duration>,
}

/// Engine failures
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {diagnostics}", exit_label(.status))]
    Failed {
        program: String,
        /// Exit code, `None` when killed by a signal
        status: Option<i32>,
        /// Everything the engine wrote to stderr
        diagnostics: String,
    },

    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("Unreadable probe output: {0}")]
    InvalidOutput(#[from] serde_json::Error),
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Capability interface over the external transcoding engine
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Inspect a file without decoding it fully
    ///
    /// Must give up with [`EngineError::TimedOut`] once `timeout` elapses.
    async fn inspect(&self, path: &Path, timeout: Duration) -> Result<Probe, EngineError>;

    /// Run one encode, writing `request.output`
    async fn encode(&self, request: &EncodeRequest<'_>) -> Result<(), EngineError>;
}
