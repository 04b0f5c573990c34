/// Container inspection results
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// First audio stream of a probed file
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AudioStreamInfo {
    pub codec_name: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub bit_rate: Option<u64>,
}

/// What the engine could tell about a file
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Probe {
    pub format_name: Option<String>,
    pub duration_secs: Option<f64>,
    pub bit_rate: Option<u64>,
    /// `None` when the container holds no audio stream
    pub audio: Option<AudioStreamInfo>,
    /// Container and stream tags, keys lowercased
    pub tags: BTreeMap<String, String>,
}

impl Probe {
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
    }

    pub fn codec(&self) -> Option<&str> {
        self.audio.as_ref().and_then(|a| a.codec_name.as_deref())
    }

    /// Parse `ffprobe -print_format json -show_format -show_streams` output
    pub fn from_ffprobe_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawProbe = serde_json::from_str(json)?;

        let mut tags = BTreeMap::new();
        let audio_stream = raw
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"));

        if let Some(stream) = audio_stream {
            collect_tags(&mut tags, &stream.tags);
        }
        if let Some(format) = &raw.format {
            collect_tags(&mut tags, &format.tags);
        }

        let audio = audio_stream.map(|s| AudioStreamInfo {
            codec_name: s.codec_name.clone(),
            sample_rate: s.sample_rate.as_deref().and_then(|v| v.parse().ok()),
            channels: s.channels,
            bit_rate: s.bit_rate.as_deref().and_then(|v| v.parse().ok()),
        });

        let format = raw.format.unwrap_or_default();

        Ok(Self {
            format_name: format.format_name,
            duration_secs: format.duration.as_deref().and_then(|d| d.parse().ok()),
            bit_rate: format.bit_rate.as_deref().and_then(|b| b.parse().ok()),
            audio,
            tags,
        })
    }
}

fn collect_tags(into: &mut BTreeMap<String, String>, tags: &BTreeMap<String, String>) {
    for (key, value) in tags {
        into.insert(key.to_ascii_lowercase(), value.clone());
    }
}

// ffprobe reports most numbers as strings
#[derive(Debug, Default, Deserialize)]
struct RawProbe {
    #[serde(default)]
    streams: Vec<RawStream>,
    format: Option<RawFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFormat {
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}
