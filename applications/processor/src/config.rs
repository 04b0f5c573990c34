/// Processor configuration
use crate::error::{ProcessorError, Result};
use acx_core::{EngineConfig, EstimatorConfig, FfmpegEngine, PipelineConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "acx.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProcessorConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub estimator: EstimatorConfig,

    #[serde(default)]
    pub jobs: JobSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobSettings {
    /// Jobs allowed to run at the same time in batch mode
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            output_dir: default_output_dir(),
        }
    }
}

impl ProcessorConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `acx.toml` is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables, e.g. ACX_PIPELINE__VERIFY_OUTPUT=true
        settings = settings.add_source(
            config::Environment::with_prefix("ACX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(settings.build()?.try_deserialize()?)
    }

    /// Validate everything that does not need the engine binaries
    pub fn validate_settings(&self) -> Result<()> {
        if self.jobs.workers == 0 {
            return Err(ProcessorError::Config(
                "jobs.workers must be at least 1".to_string(),
            ));
        }

        self.pipeline
            .validate()
            .map_err(|e| ProcessorError::Config(e.to_string()))?;

        if self.estimator.throughput_mb_per_minute <= 0.0 {
            return Err(ProcessorError::Config(
                "estimator.throughput_mb_per_minute must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Full validation, including that FFmpeg and ffprobe can be found
    pub fn validate(&self) -> Result<()> {
        self.validate_settings()?;

        let engine = FfmpegEngine::from_config(&self.engine);
        for program in [engine.ffmpeg_path(), engine.ffprobe_path()] {
            if resolve_program(program).is_none() {
                return Err(ProcessorError::Config(format!(
                    "{:?} not found (set ACX_ENGINE__FFMPEG_PATH)",
                    program
                )));
            }
        }

        Ok(())
    }
}

/// Locate an executable: paths are checked as given, bare names on `PATH`
pub fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }

    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

// Default values
fn default_workers() -> usize {
    2
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProcessorConfig::default();
        assert!(config.validate_settings().is_ok());
        assert_eq!(config.jobs.workers, 2);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = ProcessorConfig::default();
        config.jobs.workers = 0;

        let err = config.validate_settings().unwrap_err();
        assert!(err.to_string().contains("jobs.workers"));
    }

    #[test]
    fn test_unordered_thresholds_rejected() {
        let mut config = ProcessorConfig::default();
        config.pipeline.large_file_threshold_bytes = config.pipeline.max_input_bytes + 1;

        assert!(config.validate_settings().is_err());
    }

    #[test]
    fn test_inverted_probe_bounds_rejected() {
        let mut config = ProcessorConfig::default();
        config.pipeline.probe_timeout_min_secs = 40.0;
        config.pipeline.probe_timeout_max_secs = 30.0;

        let err = config.validate_settings().unwrap_err();
        assert!(matches!(err, ProcessorError::Config(_)));
        assert!(err.to_string().contains("probe timeout bounds"));
    }

    #[test]
    fn test_missing_engine_binary_rejected() {
        let mut config = ProcessorConfig::default();
        config.engine.ffmpeg_path = PathBuf::from("/nonexistent/bin/ffmpeg");

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ProcessorError::Config(_)));
        assert!(err.to_string().contains("/nonexistent/bin/ffmpeg"));
    }

    #[test]
    fn test_resolve_program_with_missing_path() {
        assert!(resolve_program(Path::new("/nonexistent/ffprobe")).is_none());
        assert!(resolve_program(Path::new("definitely-not-a-real-binary-acx")).is_none());
    }
}
