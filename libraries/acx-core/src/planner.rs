//! Filter-chain planning
//!
//! Turns validated input characteristics into a [`ProcessingPlan`]: the DSP
//! graph for pass 1, the delivery format, and when a finishing pass is needed.
//!
//! The stage order is fixed. Each stage expects the signal state the previous
//! one leaves behind:
//!
//! 1. format-normalize to 44.1 kHz float mono
//! 2. 80 Hz high-pass
//! 3. compression (peaks tamed before loudness is measured)
//! 4. loudness normalization to -20 LUFS / -3 dBTP / 11 LU
//! 5. limiter at the -3 dB ceiling
//! 6. 2 s of silence at head and tail, as exact sample counts

use crate::asset::{AudioAsset, ContainerKind};
use crate::profile::MasteringProfile;
use crate::validator::{AcceptedInput, Verification};
use crate::BYTES_PER_MB;
use std::fmt;

/// Mastering stages in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    FormatNormalize,
    HighPass,
    Compression,
    LoudnessNormalize,
    Limiter,
    SilencePad,
}

impl Stage {
    pub const CANONICAL: [Stage; 6] = [
        Stage::FormatNormalize,
        Stage::HighPass,
        Stage::Compression,
        Stage::LoudnessNormalize,
        Stage::Limiter,
        Stage::SilencePad,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FormatNormalize => "format-normalize",
            Self::HighPass => "high-pass",
            Self::Compression => "compression",
            Self::LoudnessNormalize => "loudness-normalize",
            Self::Limiter => "limiter",
            Self::SilencePad => "silence-pad",
        };
        f.write_str(name)
    }
}

/// One engine filter belonging to a mastering stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStage {
    stage: Stage,
    filter: &'static str,
    params: Vec<(&'static str, String)>,
}

impl FilterStage {
    fn new(stage: Stage, filter: &'static str, params: Vec<(&'static str, String)>) -> Self {
        Self {
            stage,
            filter,
            params,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn filter(&self) -> &'static str {
        self.filter
    }

    pub fn params(&self) -> &[(&'static str, String)] {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `name=key=value:key=value`
    pub fn render(&self) -> String {
        if self.params.is_empty() {
            return self.filter.to_string();
        }
        let params = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(":");
        format!("{}={}", self.filter, params)
    }
}

/// Ordered, immutable DSP graph for one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChainSpec {
    filters: Vec<FilterStage>,
}

impl FilterChainSpec {
    /// The canonical mastering chain for `profile`
    pub fn for_profile(profile: &MasteringProfile) -> Self {
        let rate = profile.sample_rate.to_string();
        let silence = profile.silence_samples().to_string();
        let comp = &profile.compressor;
        let limiter = &profile.limiter;

        let filters = vec![
            FilterStage::new(
                Stage::FormatNormalize,
                "aformat",
                vec![
                    ("sample_fmts", "flt".to_string()),
                    ("sample_rates", rate.clone()),
                    ("channel_layouts", channel_layout(profile.channels).to_string()),
                ],
            ),
            FilterStage::new(
                Stage::HighPass,
                "highpass",
                vec![("f", profile.highpass_hz.to_string())],
            ),
            FilterStage::new(
                Stage::Compression,
                "acompressor",
                vec![
                    ("threshold", format!("{}dB", num(comp.threshold_db))),
                    ("ratio", num(comp.ratio)),
                    ("attack", num(comp.attack_ms)),
                    ("release", num(comp.release_ms)),
                ],
            ),
            FilterStage::new(
                Stage::LoudnessNormalize,
                "loudnorm",
                vec![
                    ("I", num(profile.integrated_lufs)),
                    ("TP", num(profile.true_peak_dbtp)),
                    ("LRA", num(profile.loudness_range_lu)),
                ],
            ),
            // loudnorm upsamples internally; bring the signal back to the working rate
            FilterStage::new(
                Stage::LoudnessNormalize,
                "aresample",
                vec![("osr", rate)],
            ),
            FilterStage::new(
                Stage::Limiter,
                "alimiter",
                vec![
                    ("level_in", "1".to_string()),
                    ("level_out", "1".to_string()),
                    ("limit", format!("{:.6}", profile.limiter_ceiling_linear())),
                    ("attack", num(limiter.attack_ms)),
                    ("release", num(limiter.release_ms)),
                    ("level", "false".to_string()),
                ],
            ),
            FilterStage::new(
                Stage::SilencePad,
                "adelay",
                vec![("delays", format!("{}S", silence)), ("all", "1".to_string())],
            ),
            FilterStage::new(Stage::SilencePad, "apad", vec![("pad_len", silence)]),
        ];

        debug_assert!(filters.windows(2).all(|w| w[0].stage <= w[1].stage));
        Self { filters }
    }

    pub fn filters(&self) -> &[FilterStage] {
        &self.filters
    }

    /// Distinct stages in the order they run
    pub fn stages(&self) -> Vec<Stage> {
        let mut stages: Vec<Stage> = self.filters.iter().map(FilterStage::stage).collect();
        stages.dedup();
        stages
    }

    /// Comma-joined filter graph as the engine expects it
    pub fn render(&self) -> String {
        self.filters
            .iter()
            .map(FilterStage::render)
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn channel_layout(channels: u32) -> &'static str {
    if channels == 1 {
        "mono"
    } else {
        "stereo"
    }
}

fn num(value: f64) -> String {
    format!("{}", value)
}

/// When the remux-only finishing pass runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondPassPolicy {
    /// Large-input branch: always finish with a remux
    Forced,
    /// Remux only if the intermediate is strictly larger than this many bytes
    WhenIntermediateExceeds(u64),
}

/// Everything decided about a job before the engine runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingPlan {
    pub filter_chain: FilterChainSpec,
    pub output_sample_rate: u32,
    pub output_channels: u32,
    pub output_bitrate_kbps: u32,
    pub second_pass: SecondPassPolicy,
    pub input_container: ContainerKind,
}

impl ProcessingPlan {
    /// Resolve the finishing branch once the pass-1 output size is known
    pub fn needs_second_pass(&self, intermediate_bytes: u64) -> bool {
        match self.second_pass {
            SecondPassPolicy::Forced => true,
            SecondPassPolicy::WhenIntermediateExceeds(threshold) => intermediate_bytes > threshold,
        }
    }

    pub fn is_large_input(&self) -> bool {
        self.second_pass == SecondPassPolicy::Forced
    }
}

#[derive(Debug, Clone)]
pub struct FilterChainPlanner {
    profile: MasteringProfile,
    second_pass_threshold_bytes: u64,
}

impl FilterChainPlanner {
    pub fn new(profile: MasteringProfile, second_pass_threshold_bytes: u64) -> Self {
        Self {
            profile,
            second_pass_threshold_bytes,
        }
    }

    pub fn profile(&self) -> &MasteringProfile {
        &self.profile
    }

    /// Plan a job. Pure: the same inputs always give the same plan, and
    /// missing probe data just means the input-agnostic defaults are used.
    pub fn plan(&self, asset: &AudioAsset, accepted: &AcceptedInput) -> ProcessingPlan {
        let second_pass = match accepted.verification {
            Verification::SkippedLargeFile => SecondPassPolicy::Forced,
            Verification::Probed | Verification::TimedOut => {
                SecondPassPolicy::WhenIntermediateExceeds(self.second_pass_threshold_bytes)
            }
        };

        tracing::debug!(
            "Planning {} input of {:.1} MB ({:?}, second pass {:?})",
            accepted.container.extension(),
            asset.size_mb(),
            accepted.verification,
            second_pass
        );

        ProcessingPlan {
            filter_chain: FilterChainSpec::for_profile(&self.profile),
            output_sample_rate: self.profile.sample_rate,
            output_channels: self.profile.channels,
            output_bitrate_kbps: self.profile.bitrate_kbps,
            second_pass,
            input_container: accepted.container,
        }
    }
}

impl Default for FilterChainPlanner {
    fn default() -> Self {
        Self::new(MasteringProfile::ACX, 10 * BYTES_PER_MB)
    }
}
