//! Advisory processing-time estimate
//!
//! Pure function of the input size, no I/O. It never influences how a job runs.

use crate::config::EstimatorConfig;
use crate::BYTES_PER_MB;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProcessingEstimate {
    #[serde(rename = "estimatedMinutes")]
    pub minutes: f64,
    #[serde(rename = "fileSize")]
    pub size_mb: f64,
}

impl fmt::Display for ProcessingEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.minutes == 1.0 { "" } else { "s" };
        write!(f, "{} minute{} ({} MB)", self.minutes, plural, self.size_mb)
    }
}

/// Linear throughput model with a floor
#[derive(Debug, Clone, Copy)]
pub struct Estimator {
    config: EstimatorConfig,
}

impl Estimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn estimate(&self, byte_size: u64) -> ProcessingEstimate {
        let size_mb = byte_size as f64 / BYTES_PER_MB as f64;
        let raw_minutes = if self.config.throughput_mb_per_minute > 0.0 {
            size_mb / self.config.throughput_mb_per_minute
        } else {
            0.0
        };

        ProcessingEstimate {
            minutes: round_tenth(raw_minutes).max(self.config.minimum_minutes),
            size_mb: round_tenth(size_mb),
        }
    }
}

impl Default for Estimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
