/// Common test utilities and fixtures
use acx_core::{
    AudioEngine, AudioStreamInfo, EncodeOperation, EncodePass, EncodeRequest, EngineError,
    MasteringPipeline, PipelineConfig, Probe,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the fake does when asked to inspect a file
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum ProbeBehavior {
    /// Report a conformant mono 44.1 kHz MP3 stream
    Audio,
    /// Report a container without audio
    NoAudio,
    /// Report an audio stream carrying a title tag
    AudioWithTitle,
    TimeOut,
    /// Exit non-zero with this stderr
    Unreadable(String),
}

/// What the fake does for an encode pass
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum EncodeBehavior {
    /// Write this many bytes to the output
    Write(usize),
    /// Copy the input to the output
    Copy,
    Fail { status: i32, stderr: String },
    /// Leave a partial file and report the caller-side limit as hit
    TimeOut,
    WriteNothing,
    WriteEmpty,
}

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct RecordedCall {
    /// `None` for inspect calls
    pub pass: Option<EncodePass>,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub input_existed: bool,
    pub filter_graph: Option<String>,
}

/// In-process stand-in for FFmpeg
pub struct FakeEngine {
    probe: ProbeBehavior,
    master: EncodeBehavior,
    remux: EncodeBehavior,
    calls: Mutex<Vec<RecordedCall>>,
}

#[allow(dead_code)]
impl FakeEngine {
    pub fn new() -> Self {
        Self {
            probe: ProbeBehavior::Audio,
            master: EncodeBehavior::Write(4096),
            remux: EncodeBehavior::Copy,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn probe(mut self, behavior: ProbeBehavior) -> Self {
        self.probe = behavior;
        self
    }

    pub fn master(mut self, behavior: EncodeBehavior) -> Self {
        self.master = behavior;
        self
    }

    pub fn remux(mut self, behavior: EncodeBehavior) -> Self {
        self.remux = behavior;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn inspect_count(&self) -> usize {
        self.calls().iter().filter(|c| c.pass.is_none()).count()
    }

    pub fn encode_calls(&self, pass: EncodePass) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.pass == Some(pass))
            .collect()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn conformant_probe() -> Probe {
    Probe {
        format_name: Some("mp3".to_string()),
        duration_secs: Some(5.0),
        bit_rate: Some(192_000),
        audio: Some(AudioStreamInfo {
            codec_name: Some("mp3".to_string()),
            sample_rate: Some(44100),
            channels: Some(1),
            bit_rate: Some(192_000),
        }),
        tags: Default::default(),
    }
}

#[async_trait]
impl AudioEngine for FakeEngine {
    async fn inspect(&self, path: &Path, timeout: Duration) -> Result<Probe, EngineError> {
        self.record(RecordedCall {
            pass: None,
            input: path.to_path_buf(),
            output: None,
            input_existed: path.exists(),
            filter_graph: None,
        });

        match &self.probe {
            ProbeBehavior::Audio => Ok(conformant_probe()),
            ProbeBehavior::NoAudio => Ok(Probe {
                format_name: Some("image2".to_string()),
                ..Probe::default()
            }),
            ProbeBehavior::AudioWithTitle => {
                let mut probe = conformant_probe();
                probe.tags.insert("title".to_string(), "Chapter 1".to_string());
                Ok(probe)
            }
            ProbeBehavior::TimeOut => Err(EngineError::TimedOut {
                program: "fake-ffprobe".to_string(),
                timeout,
            }),
            ProbeBehavior::Unreadable(stderr) => Err(EngineError::Failed {
                program: "fake-ffprobe".to_string(),
                status: Some(1),
                diagnostics: stderr.clone(),
            }),
        }
    }

    async fn encode(&self, request: &EncodeRequest<'_>) -> Result<(), EngineError> {
        let pass = request.operation.pass();
        let filter_graph = match request.operation {
            EncodeOperation::Master(plan) => Some(plan.filter_chain.render()),
            EncodeOperation::Remux => None,
        };
        self.record(RecordedCall {
            pass: Some(pass),
            input: request.input.to_path_buf(),
            output: Some(request.output.to_path_buf()),
            input_existed: request.input.exists(),
            filter_graph,
        });

        let behavior = match pass {
            EncodePass::Master => &self.master,
            EncodePass::Finish => &self.remux,
        };

        match behavior {
            EncodeBehavior::Write(len) => {
                tokio::fs::write(request.output, vec![0xFFu8; *len])
                    .await
                    .expect("fake engine write");
                Ok(())
            }
            EncodeBehavior::Copy => {
                tokio::fs::copy(request.input, request.output)
                    .await
                    .expect("fake engine copy");
                Ok(())
            }
            EncodeBehavior::Fail { status, stderr } => {
                // A real engine often leaves a partial file behind
                tokio::fs::write(request.output, b"partial").await.ok();
                Err(EngineError::Failed {
                    program: "fake-ffmpeg".to_string(),
                    status: Some(*status),
                    diagnostics: stderr.clone(),
                })
            }
            EncodeBehavior::TimeOut => {
                tokio::fs::write(request.output, b"partial").await.ok();
                Err(EngineError::TimedOut {
                    program: "fake-ffmpeg".to_string(),
                    timeout: request.timeout.unwrap_or(Duration::from_secs(1)),
                })
            }
            EncodeBehavior::WriteNothing => Ok(()),
            EncodeBehavior::WriteEmpty => {
                tokio::fs::write(request.output, b"").await.expect("fake engine write");
                Ok(())
            }
        }
    }
}

/// Config rooted in a test directory
pub fn test_config(temp_root: &Path) -> PipelineConfig {
    PipelineConfig {
        temp_root: temp_root.to_path_buf(),
        ..PipelineConfig::default()
    }
}

#[allow(dead_code)]
pub fn pipeline(engine: &Arc<FakeEngine>, config: PipelineConfig) -> MasteringPipeline {
    MasteringPipeline::new(config, Arc::clone(engine) as Arc<dyn AudioEngine>)
}

/// Number of entries left under the temp root
#[allow(dead_code)]
pub fn leftover_entries(temp_root: &Path) -> usize {
    std::fs::read_dir(temp_root).map(|d| d.count()).unwrap_or(0)
}

/// Bytes that pass the WAV header check
#[allow(dead_code)]
pub fn wav_bytes(data_len: usize) -> Vec<u8> {
    let mut bytes = b"RIFF".to_vec();
    bytes.extend_from_slice(&((36 + data_len) as u32).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.resize(12 + data_len, 0);
    bytes
}

/// Bytes that pass the MP3 header check
#[allow(dead_code)]
pub fn mp3_bytes(len: usize) -> Vec<u8> {
    let mut bytes = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
    bytes.resize(len, 0);
    bytes
}
