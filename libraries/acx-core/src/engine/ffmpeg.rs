/// FFmpeg/FFprobe implementation of the engine capability
use super::{AudioEngine, EncodeOperation, EncodeRequest, EngineError, Probe};
use crate::config::EngineConfig;
use crate::planner::ProcessingPlan;
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
}

impl FfmpegEngine {
    pub fn new(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
        }
    }

    /// Use `ffprobe` from the same directory as `ffmpeg` unless configured otherwise
    pub fn from_config(config: &EngineConfig) -> Self {
        let ffprobe_path = config.ffprobe_path.clone().unwrap_or_else(|| {
            match config.ffmpeg_path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.join("ffprobe"),
                _ => PathBuf::from("ffprobe"),
            }
        });
        Self::new(config.ffmpeg_path.clone(), ffprobe_path)
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe_path
    }

    async fn run(
        program: &Path,
        args: &[OsString],
        timeout: Option<Duration>,
    ) -> Result<Output, EngineError> {
        let program_name = program.display().to_string();
        tracing::debug!("{} {}", program_name, display_args(args));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the future on timeout must take the child down with it
            .kill_on_drop(true);

        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(EngineError::TimedOut {
                        program: program_name,
                        timeout: limit,
                    })
                }
            },
            None => cmd.output().await,
        };

        let output = result.map_err(|source| EngineError::Spawn {
            program: program_name.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                program: program_name,
                status: output.status.code(),
                diagnostics: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl AudioEngine for FfmpegEngine {
    async fn inspect(&self, path: &Path, timeout: Duration) -> Result<Probe, EngineError> {
        let output = Self::run(&self.ffprobe_path, &build_probe_args(path), Some(timeout)).await?;
        let json = String::from_utf8_lossy(&output.stdout);
        Ok(Probe::from_ffprobe_json(&json)?)
    }

    async fn encode(&self, request: &EncodeRequest<'_>) -> Result<(), EngineError> {
        let args = match request.operation {
            EncodeOperation::Master(plan) => build_master_args(request.input, request.output, plan),
            EncodeOperation::Remux => build_remux_args(request.input, request.output),
        };
        Self::run(&self.ffmpeg_path, &args, request.timeout).await?;
        Ok(())
    }
}

/// `ffprobe` arguments for a JSON dump of container and streams
pub fn build_probe_args(input: &Path) -> Vec<OsString> {
    let mut args = os_args(&[
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ]);
    args.push(input.as_os_str().to_owned());
    args
}

/// Pass 1: full filter chain and delivery format, metadata dropped
pub fn build_master_args(input: &Path, output: &Path, plan: &ProcessingPlan) -> Vec<OsString> {
    let mut args = leading_args(input);

    args.extend(os_args(&["-map", "0:a:0", "-af"]));
    args.push(plan.filter_chain.render().into());

    args.extend(os_args(&["-ar"]));
    args.push(plan.output_sample_rate.to_string().into());
    args.extend(os_args(&["-ac"]));
    args.push(plan.output_channels.to_string().into());
    args.extend(os_args(&["-c:a", "libmp3lame", "-b:a"]));
    args.push(format!("{}k", plan.output_bitrate_kbps).into());
    args.extend(os_args(&["-flags:a", "+bitexact"]));

    args.extend(metadata_scrub_args());
    args.extend(os_args(&["-f", "mp3"]));
    args.push(output.as_os_str().to_owned());
    args
}

/// Pass 2: stream copy that only rewrites the container without metadata
pub fn build_remux_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args = leading_args(input);
    args.extend(os_args(&["-map", "0:a:0", "-c:a", "copy"]));
    args.extend(metadata_scrub_args());
    args.extend(os_args(&["-f", "mp3"]));
    args.push(output.as_os_str().to_owned());
    args
}

fn leading_args(input: &Path) -> Vec<OsString> {
    let mut args = os_args(&["-hide_banner", "-nostdin", "-nostats", "-y", "-i"]);
    args.push(input.as_os_str().to_owned());
    args
}

fn metadata_scrub_args() -> Vec<OsString> {
    os_args(&[
        "-map_metadata",
        "-1",
        "-map_chapters",
        "-1",
        "-id3v2_version",
        "0",
        "-write_id3v1",
        "0",
        "-fflags",
        "+bitexact",
    ])
}

fn os_args(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

fn display_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.as_os_str())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AudioAsset;
    use crate::planner::FilterChainPlanner;
    use crate::validator::{AcceptedInput, Verification};
    use crate::ContainerKind;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn small_plan() -> ProcessingPlan {
        let asset = AudioAsset::new("/tmp/job/input.wav", "wav", 2 * 1024 * 1024);
        let accepted = AcceptedInput {
            container: ContainerKind::Wav,
            verification: Verification::Probed,
            probe: None,
        };
        FilterChainPlanner::default().plan(&asset, &accepted)
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_engine_paths_from_config() {
        let engine = FfmpegEngine::from_config(&EngineConfig {
            ffmpeg_path: PathBuf::from("/opt/ffmpeg/bin/ffmpeg"),
            ffprobe_path: None,
        });
        assert_eq!(engine.ffprobe_path(), Path::new("/opt/ffmpeg/bin/ffprobe"));

        let engine = FfmpegEngine::from_config(&EngineConfig::default());
        assert_eq!(engine.ffmpeg_path(), Path::new("ffmpeg"));
        assert_eq!(engine.ffprobe_path(), Path::new("ffprobe"));
    }

    #[test]
    fn test_master_args_are_fully_specified() {
        let plan = small_plan();
        let args = strings(&build_master_args(
            Path::new("/tmp/job/input.wav"),
            Path::new("/tmp/job/intermediate.mp3"),
            &plan,
        ));

        assert_eq!(value_after(&args, "-i"), Some("/tmp/job/input.wav"));
        assert_eq!(value_after(&args, "-ar"), Some("44100"));
        assert_eq!(value_after(&args, "-ac"), Some("1"));
        assert_eq!(value_after(&args, "-b:a"), Some("192k"));
        assert_eq!(value_after(&args, "-c:a"), Some("libmp3lame"));
        assert_eq!(value_after(&args, "-f"), Some("mp3"));
        assert_eq!(value_after(&args, "-af"), Some(plan.filter_chain.render().as_str()));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/job/intermediate.mp3"));
    }

    #[test]
    fn test_both_passes_strip_metadata() {
        let plan = small_plan();
        let input = Path::new("in.wav");
        let output = Path::new("out.mp3");

        for args in [
            strings(&build_master_args(input, output, &plan)),
            strings(&build_remux_args(input, output)),
        ] {
            assert_eq!(value_after(&args, "-map_metadata"), Some("-1"));
            assert_eq!(value_after(&args, "-map_chapters"), Some("-1"));
            assert_eq!(value_after(&args, "-id3v2_version"), Some("0"));
            assert_eq!(value_after(&args, "-write_id3v1"), Some("0"));
        }
    }

    #[test]
    fn test_remux_copies_without_filters() {
        let args = strings(&build_remux_args(Path::new("a.mp3"), Path::new("b.mp3")));
        assert_eq!(value_after(&args, "-c:a"), Some("copy"));
        assert!(!args.iter().any(|a| a == "-af"));
    }

    #[test]
    fn test_probe_args() {
        let args = strings(&build_probe_args(Path::new("book.mp3")));
        assert_eq!(value_after(&args, "-print_format"), Some("json"));
        assert!(args.contains(&"-show_streams".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("book.mp3"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let engine = FfmpegEngine::new(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
        );
        let err = engine
            .inspect(Path::new("book.mp3"), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }

    /// Shell script standing in for the engine: sleeps, then leaves a marker file
    #[cfg(unix)]
    fn slow_engine_script(dir: &Path) -> (PathBuf, PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("slow-engine.sh");
        let marker = dir.join("finished");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nsleep 1\ntouch '{}'\n", marker.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (script, marker)
    }

    /// Freshly written scripts can briefly fail with ETXTBSY while another
    /// test thread forks; retry the spawn in that case only
    #[cfg(unix)]
    async fn retry_busy<T, F, Fut>(mut call: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, EngineError>>,
    {
        for _ in 0..5 {
            match call().await {
                Err(EngineError::Spawn { source, .. }) if source.raw_os_error() == Some(26) => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                other => return other,
            }
        }
        call().await
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timed_out_engine_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let (script, marker) = slow_engine_script(dir.path());
        let engine = FfmpegEngine::new(script.clone(), script);
        let input = dir.path().join("input.wav");
        let output = dir.path().join("intermediate.mp3");

        let started = std::time::Instant::now();
        let err = retry_busy(|| async {
            engine
                .encode(&EncodeRequest {
                    input: &input,
                    output: &output,
                    operation: EncodeOperation::Remux,
                    timeout: Some(Duration::from_millis(200)),
                })
                .await
        })
        .await
        .unwrap_err();

        assert!(
            matches!(err, EngineError::TimedOut { timeout, .. } if timeout == Duration::from_millis(200)),
            "unexpected error: {:?}",
            err
        );
        assert!(started.elapsed() < Duration::from_millis(900));

        let err = retry_busy(|| engine.inspect(&input, Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::TimedOut { .. }));

        // A surviving child would have written the marker by now
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "engine process outlived its timeout");
    }
}
