//! Output conformance check against the mastering profile
//!
//! Covers what a probe can see: codec, sample rate, channel count, bitrate and
//! identifying tags. Loudness itself is the engine's job.

use crate::engine::Probe;
use crate::profile::MasteringProfile;
use serde::Serialize;
use std::fmt;

/// Tags that identify a recording and must not survive processing
pub const FORBIDDEN_TAGS: &[&str] = &[
    "title",
    "artist",
    "album",
    "album_artist",
    "comment",
    "genre",
    "date",
    "track",
    "composer",
    "copyright",
];

/// Allowed deviation from the nominal bitrate, in percent
const BITRATE_TOLERANCE_PERCENT: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Deviation {
    NoAudioStream,
    Codec { found: Option<String> },
    SampleRate { expected: u32, found: Option<u32> },
    Channels { expected: u32, found: Option<u32> },
    Bitrate { expected: u64, found: Option<u64> },
    Tag { key: String },
}

impl fmt::Display for Deviation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAudioStream => write!(f, "no audio stream"),
            Self::Codec { found } => write!(f, "codec is {}, expected mp3", or_unknown(found)),
            Self::SampleRate { expected, found } => {
                write!(f, "sample rate is {}, expected {}", or_unknown(found), expected)
            }
            Self::Channels { expected, found } => {
                write!(f, "channel count is {}, expected {}", or_unknown(found), expected)
            }
            Self::Bitrate { expected, found } => {
                write!(f, "bitrate is {}, expected {}", or_unknown(found), expected)
            }
            Self::Tag { key } => write!(f, "carries a '{}' tag", key),
        }
    }
}

fn or_unknown<T: fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map_or_else(|| "unknown".to_string(), ToString::to_string)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConformanceReport {
    pub deviations: Vec<Deviation>,
}

impl ConformanceReport {
    pub fn is_conformant(&self) -> bool {
        self.deviations.is_empty()
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.deviations.is_empty() {
            return write!(f, "conforms to profile");
        }
        let list = self
            .deviations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&list)
    }
}

pub fn check(probe: &Probe, profile: &MasteringProfile) -> ConformanceReport {
    let mut deviations = Vec::new();

    let Some(audio) = probe.audio.as_ref() else {
        deviations.push(Deviation::NoAudioStream);
        return ConformanceReport { deviations };
    };

    if audio.codec_name.as_deref() != Some("mp3") {
        deviations.push(Deviation::Codec {
            found: audio.codec_name.clone(),
        });
    }

    if audio.sample_rate != Some(profile.sample_rate) {
        deviations.push(Deviation::SampleRate {
            expected: profile.sample_rate,
            found: audio.sample_rate,
        });
    }

    if audio.channels != Some(profile.channels) {
        deviations.push(Deviation::Channels {
            expected: profile.channels,
            found: audio.channels,
        });
    }

    let expected = profile.bitrate_bps();
    let found = audio.bit_rate.or(probe.bit_rate);
    let tolerance = expected * BITRATE_TOLERANCE_PERCENT / 100;
    if !found.is_some_and(|bps| bps.abs_diff(expected) <= tolerance) {
        deviations.push(Deviation::Bitrate { expected, found });
    }

    for key in probe.tags.keys() {
        if FORBIDDEN_TAGS.contains(&key.as_str()) {
            deviations.push(Deviation::Tag { key: key.clone() });
        }
    }

    ConformanceReport { deviations }
}
