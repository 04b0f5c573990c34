//! ACX Processor Library
//!
//! Configuration loading and batch job running for the `acx-processor`
//! command-line tool.
//!
//! This library exposes the core components for testing purposes.

pub mod config;
pub mod error;
pub mod jobs;

pub use config::{JobSettings, ProcessorConfig};
pub use error::{ProcessorError, Result};
pub use jobs::{BatchRunner, JobReport, JobStatus};
