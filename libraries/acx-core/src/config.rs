/// Pipeline configuration
///
/// These values are handed to `MasteringPipeline::new` explicitly; nothing in
/// the crate reads configuration from the environment on its own.
use crate::error::{PipelineError, Result};
use crate::BYTES_PER_MB;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory under which every job gets its own workspace
    pub temp_root: PathBuf,

    /// Absolute upload cap
    pub max_input_bytes: u64,

    /// Inputs larger than this skip the engine probe and only get a header check
    pub large_file_threshold_bytes: u64,

    /// Intermediates larger than this get a remux-only finishing pass
    pub second_pass_threshold_bytes: u64,

    pub probe_timeout_min_secs: f64,
    pub probe_timeout_max_secs: f64,
    pub probe_timeout_per_mb_secs: f64,

    /// Caller-side limit on each encode; the engine process is killed when hit
    pub encode_timeout_secs: Option<u64>,

    /// Probe the finished file and fail the job if it does not conform
    pub verify_output: bool,
}

impl PipelineConfig {
    /// Probe timeout scaled to the input size
    ///
    /// Bounds that are negative or not finite count as zero, and a maximum
    /// below the minimum is raised to it; [`validate`](Self::validate) reports those.
    pub fn probe_timeout(&self, byte_size: u64) -> Duration {
        let min = non_negative(self.probe_timeout_min_secs);
        let max = non_negative(self.probe_timeout_max_secs).max(min);
        let per_mb = non_negative(self.probe_timeout_per_mb_secs);

        let size_mb = byte_size as f64 / BYTES_PER_MB as f64;
        let secs = (min + size_mb * per_mb).clamp(min, max);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Check thresholds and timeout bounds for consistency
    pub fn validate(&self) -> Result<()> {
        if self.large_file_threshold_bytes > self.max_input_bytes {
            return Err(PipelineError::Config(format!(
                "large_file_threshold_bytes ({}) exceeds max_input_bytes ({})",
                self.large_file_threshold_bytes, self.max_input_bytes
            )));
        }

        let min = self.probe_timeout_min_secs;
        let max = self.probe_timeout_max_secs;
        if !(min.is_finite() && max.is_finite() && min > 0.0 && min <= max) {
            return Err(PipelineError::Config(format!(
                "probe timeout bounds are invalid: min {}s, max {}s",
                min, max
            )));
        }

        let per_mb = self.probe_timeout_per_mb_secs;
        if !(per_mb.is_finite() && per_mb >= 0.0) {
            return Err(PipelineError::Config(format!(
                "probe_timeout_per_mb_secs must be a non-negative number, got {}",
                per_mb
            )));
        }

        Ok(())
    }

    pub fn encode_timeout(&self) -> Option<Duration> {
        self.encode_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            temp_root: default_temp_root(),
            max_input_bytes: 500 * BYTES_PER_MB,
            large_file_threshold_bytes: 100 * BYTES_PER_MB,
            second_pass_threshold_bytes: 10 * BYTES_PER_MB,
            probe_timeout_min_secs: 5.0,
            probe_timeout_max_secs: 30.0,
            probe_timeout_per_mb_secs: 0.25,
            encode_timeout_secs: None,
            verify_output: false,
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn default_temp_root() -> PathBuf {
    std::env::temp_dir().join("acx-mastering")
}

/// Advisory processing-time model
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub throughput_mb_per_minute: f64,
    pub minimum_minutes: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            throughput_mb_per_minute: 3.0,
            minimum_minutes: 0.2,
        }
    }
}

/// Location of the external engine binaries
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ffmpeg_path: PathBuf,

    /// Defaults to `ffprobe` next to `ffmpeg_path`
    pub ffprobe_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_timeout_scales_and_clamps() {
        let config = PipelineConfig::default();

        assert_eq!(config.probe_timeout(0), Duration::from_secs(5));
        assert_eq!(config.probe_timeout(20 * BYTES_PER_MB), Duration::from_secs(10));
        assert_eq!(config.probe_timeout(400 * BYTES_PER_MB), Duration::from_secs(30));
    }

    #[test]
    fn test_inverted_probe_bounds_do_not_panic() {
        let config = PipelineConfig {
            probe_timeout_min_secs: 40.0,
            probe_timeout_max_secs: 30.0,
            ..PipelineConfig::default()
        };

        assert_eq!(config.probe_timeout(BYTES_PER_MB), Duration::from_secs(40));
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_nonsense_probe_bounds_do_not_panic() {
        let config = PipelineConfig {
            probe_timeout_min_secs: -5.0,
            probe_timeout_max_secs: f64::NAN,
            probe_timeout_per_mb_secs: f64::INFINITY,
            ..PipelineConfig::default()
        };

        assert_eq!(config.probe_timeout(10 * BYTES_PER_MB), Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_validates() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_unordered_size_thresholds_rejected() {
        let config = PipelineConfig {
            large_file_threshold_bytes: 600 * BYTES_PER_MB,
            ..PipelineConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("large_file_threshold_bytes"));
    }

    #[test]
    fn test_defaults_match_reference_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.large_file_threshold_bytes, 104_857_600);
        assert_eq!(config.second_pass_threshold_bytes, 10_485_760);
        assert!(config.encode_timeout().is_none());
    }
}
