//! ACX audiobook mastering pipeline
//!
//! Turns an uploaded MP3 or WAV file into an MP3 that meets the ACX
//! submission profile: -20 LUFS integrated, -3 dBTP true peak, at most
//! 11 LU loudness range, 2 s of silence at head and tail, 44.1 kHz mono,
//! 192 kbps CBR, no identifying tags.
//!
//! The DSP itself is done by an external engine (FFmpeg). This crate owns
//! everything around it:
//!
//! ```text
//! ┌─────────────┐   ┌────────────┐   ┌──────────┐   ┌──────────────────┐
//! │ JobInput    │──►│ Validator  │──►│ Planner  │──►│ Executor         │
//! │ (workspace) │   │ probe/sniff│   │ chain    │   │ pass 1 (+pass 2) │
//! └─────────────┘   └────────────┘   └──────────┘   └────────┬─────────┘
//!                                                            ▼
//!                                                   ┌──────────────────┐
//!                                                   │ ProcessedAudio   │
//!                                                   └──────────────────┘
//! ```
//!
//! Every temporary file lives in a per-job workspace directory and is
//! removed on every exit path.
//!
//! # Example
//!
//! ```ignore
//! use acx_core::{EngineConfig, MasteringPipeline, PipelineConfig};
//!
//! let pipeline = MasteringPipeline::with_ffmpeg(PipelineConfig::default(), &EngineConfig::default());
//!
//! let job = pipeline.ingest_file("chapter-01.wav".as_ref()).await?;
//! let processed = pipeline.run(job).await?;
//! processed.deliver_to("ACX_processed_chapter-01.mp3".as_ref()).await?;
//! ```

#![forbid(unsafe_code)]

pub mod asset;
pub mod config;
pub mod conformance;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod executor;
mod header;
pub mod lifecycle;
pub mod pipeline;
pub mod planner;
pub mod profile;
pub mod validator;

pub use asset::{AudioAsset, ContainerKind};
pub use config::{EngineConfig, EstimatorConfig, PipelineConfig};
pub use conformance::{ConformanceReport, Deviation};
pub use engine::{
    AudioEngine, AudioStreamInfo, EncodeOperation, EncodePass, EncodeRequest, EngineError,
    FfmpegEngine, Probe,
};
pub use error::{ErrorKind, PipelineError, Result};
pub use estimator::{Estimator, ProcessingEstimate};
pub use executor::TranscodeExecutor;
pub use lifecycle::{ArtifactRole, JobId, JobWorkspace, TempArtifact};
pub use pipeline::{JobInput, MasteringPipeline, ProcessedAudio, ProcessingOutcome};
pub use planner::{
    FilterChainPlanner, FilterChainSpec, FilterStage, ProcessingPlan, SecondPassPolicy, Stage,
};
pub use profile::MasteringProfile;
pub use validator::{AcceptedInput, InputValidator, RejectionReason, ValidationResult, Verification};

/// Bytes per megabyte as used for every size threshold and estimate
pub const BYTES_PER_MB: u64 = 1024 * 1024;
