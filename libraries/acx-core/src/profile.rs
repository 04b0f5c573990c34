//! The ACX mastering target
//!
//! All loudness and format numbers the planner and the conformance check use
//! come from here.

/// Dynamic-range compressor settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    /// Threshold in dB
    pub threshold_db: f64,
    /// Compression ratio (N:1)
    pub ratio: f64,
    /// Attack in milliseconds
    pub attack_ms: f64,
    /// Release in milliseconds
    pub release_ms: f64,
}

/// Brick-wall limiter settings. The ceiling is the profile's true peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterSettings {
    /// Attack in milliseconds
    pub attack_ms: f64,
    /// Release in milliseconds
    pub release_ms: f64,
}

/// Target loudness and delivery format
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteringProfile {
    /// Integrated loudness target (LUFS)
    pub integrated_lufs: f64,
    /// True peak ceiling (dBTP)
    pub true_peak_dbtp: f64,
    /// Maximum loudness range (LU)
    pub loudness_range_lu: f64,
    /// High-pass cutoff in Hz
    pub highpass_hz: u32,
    pub compressor: CompressorSettings,
    pub limiter: LimiterSettings,
    /// Silence added at head and tail, in seconds
    pub silence_secs: u32,
    /// Working and output sample rate
    pub sample_rate: u32,
    /// Output channel count
    pub channels: u32,
    /// Constant output bitrate in kbps
    pub bitrate_kbps: u32,
}

impl MasteringProfile {
    /// ACX audiobook submission requirements
    pub const ACX: Self = Self {
        integrated_lufs: -20.0,
        true_peak_dbtp: -3.0,
        loudness_range_lu: 11.0,
        highpass_hz: 80,
        compressor: CompressorSettings {
            threshold_db: -18.0,
            ratio: 2.0,
            attack_ms: 20.0,
            release_ms: 1000.0,
        },
        limiter: LimiterSettings {
            attack_ms: 5.0,
            release_ms: 50.0,
        },
        silence_secs: 2,
        sample_rate: 44_100,
        channels: 1,
        bitrate_kbps: 192,
    };

    /// Silence length at each end as an exact sample count at the working rate
    pub fn silence_samples(&self) -> u64 {
        u64::from(self.silence_secs) * u64::from(self.sample_rate)
    }

    /// Limiter ceiling as a linear amplitude (the limiter does not take dB)
    pub fn limiter_ceiling_linear(&self) -> f64 {
        10f64.powf(self.true_peak_dbtp / 20.0)
    }

    /// Output bitrate in bits per second
    pub fn bitrate_bps(&self) -> u64 {
        u64::from(self.bitrate_kbps) * 1000
    }
}

impl Default for MasteringProfile {
    fn default() -> Self {
        Self::ACX
    }
}
