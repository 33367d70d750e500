use serde::{Deserialize, Serialize};

use crate::processing::sample_rate;

/// Rendering latency preference forwarded to the platform context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyHint {
    Interactive,
    Balanced,
    Playback,
}

/// Strength of one processing stage (noise suppression, echo cancellation,
/// auto gain control).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingLevel {
    Off,
    Low,
    Medium,
    High,
}

impl ProcessingLevel {
    /// Gain multiplier applied by the graph's gain node when this level is
    /// used for auto gain control.
    pub fn gain_multiplier(self) -> f32 {
        match self {
            Self::Off => 1.0,
            Self::Low => 1.1,
            Self::Medium => 1.2,
            Self::High => 1.35,
        }
    }
}

/// Device and stream configuration for one capture session.
///
/// Treated as an immutable snapshot: updates build a new value via
/// [`CaptureConfig::apply`], never mutate a shared one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Specific input device id, or None for the platform default.
    pub device_id: Option<String>,

    /// Capture sample rate in Hz. Always normalized through the sample rate
    /// resolver before use.
    pub sample_rate: u32,

    /// Number of input channels (1 = mono).
    pub channel_count: u16,

    /// Frames per processing buffer.
    pub buffer_size: u32,

    pub latency_hint: LatencyHint,
    pub noise_suppression: bool,
    pub echo_cancellation: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            sample_rate: sample_rate::DEFAULT_SAMPLE_RATE,
            channel_count: 1,
            buffer_size: 2048,
            latency_hint: LatencyHint::Interactive,
            noise_suppression: true,
            echo_cancellation: true,
            auto_gain_control: true,
        }
    }
}

impl CaptureConfig {
    /// Overlay `patch` onto this config, returning the replacement snapshot.
    pub fn apply(&self, patch: CaptureConfigPatch) -> Self {
        Self {
            device_id: patch.device_id.unwrap_or_else(|| self.device_id.clone()),
            sample_rate: patch.sample_rate.unwrap_or(self.sample_rate),
            channel_count: patch.channel_count.unwrap_or(self.channel_count),
            buffer_size: patch.buffer_size.unwrap_or(self.buffer_size),
            latency_hint: patch.latency_hint.unwrap_or(self.latency_hint),
            noise_suppression: patch.noise_suppression.unwrap_or(self.noise_suppression),
            echo_cancellation: patch.echo_cancellation.unwrap_or(self.echo_cancellation),
            auto_gain_control: patch.auto_gain_control.unwrap_or(self.auto_gain_control),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if !(1..=2).contains(&self.channel_count) {
            return Err(format!("unsupported channel count: {}", self.channel_count));
        }
        if self.buffer_size == 0 {
            return Err("buffer size must be positive".into());
        }
        Ok(())
    }
}

/// Partial capture config for `update_capture_config`. `device_id` uses a
/// nested Option so a patch can explicitly clear the device selection.
#[derive(Debug, Clone, Default)]
pub struct CaptureConfigPatch {
    pub device_id: Option<Option<String>>,
    pub sample_rate: Option<u32>,
    pub channel_count: Option<u16>,
    pub buffer_size: Option<u32>,
    pub latency_hint: Option<LatencyHint>,
    pub noise_suppression: Option<bool>,
    pub echo_cancellation: Option<bool>,
    pub auto_gain_control: Option<bool>,
}

/// Signal-processing configuration pushed into the live graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub noise_suppression_level: ProcessingLevel,
    pub echo_cancellation_level: ProcessingLevel,
    pub auto_gain_control_level: ProcessingLevel,

    /// Voice activity threshold input in [0, 1]; clamped to [0.05, 0.95]
    /// at detection time.
    pub voice_activity_sensitivity: f32,

    /// Metrics sampler period.
    pub analysis_interval_ms: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            noise_suppression_level: ProcessingLevel::Medium,
            echo_cancellation_level: ProcessingLevel::Medium,
            auto_gain_control_level: ProcessingLevel::Medium,
            voice_activity_sensitivity: 0.35,
            analysis_interval_ms: 100,
        }
    }
}

impl ProcessingConfig {
    pub fn apply(&self, patch: ProcessingConfigPatch) -> Self {
        Self {
            noise_suppression_level: patch
                .noise_suppression_level
                .unwrap_or(self.noise_suppression_level),
            echo_cancellation_level: patch
                .echo_cancellation_level
                .unwrap_or(self.echo_cancellation_level),
            auto_gain_control_level: patch
                .auto_gain_control_level
                .unwrap_or(self.auto_gain_control_level),
            voice_activity_sensitivity: patch
                .voice_activity_sensitivity
                .unwrap_or(self.voice_activity_sensitivity),
            analysis_interval_ms: patch
                .analysis_interval_ms
                .unwrap_or(self.analysis_interval_ms),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.voice_activity_sensitivity)
            || !self.voice_activity_sensitivity.is_finite()
        {
            return Err(format!(
                "voice activity sensitivity out of range: {}",
                self.voice_activity_sensitivity
            ));
        }
        if self.analysis_interval_ms == 0 {
            return Err("analysis interval must be positive".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessingConfigPatch {
    pub noise_suppression_level: Option<ProcessingLevel>,
    pub echo_cancellation_level: Option<ProcessingLevel>,
    pub auto_gain_control_level: Option<ProcessingLevel>,
    pub voice_activity_sensitivity: Option<f32>,
    pub analysis_interval_ms: Option<u64>,
}

/// Parameter block posted to the encoder node over its message channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncoderParameters {
    pub noise_suppression_level: ProcessingLevel,
    pub echo_cancellation_level: ProcessingLevel,
    pub auto_gain_control_level: ProcessingLevel,
}

impl From<&ProcessingConfig> for EncoderParameters {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            noise_suppression_level: config.noise_suppression_level,
            echo_cancellation_level: config.echo_cancellation_level,
            auto_gain_control_level: config.auto_gain_control_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_multiplier_table() {
        assert_eq!(ProcessingLevel::Off.gain_multiplier(), 1.0);
        assert_eq!(ProcessingLevel::Low.gain_multiplier(), 1.1);
        assert_eq!(ProcessingLevel::Medium.gain_multiplier(), 1.2);
        assert_eq!(ProcessingLevel::High.gain_multiplier(), 1.35);
    }

    #[test]
    fn capture_patch_overlays_only_provided_fields() {
        let base = CaptureConfig::default();
        let updated = base.apply(CaptureConfigPatch {
            sample_rate: Some(48000),
            device_id: Some(Some("mic-7".into())),
            ..Default::default()
        });
        assert_eq!(updated.sample_rate, 48000);
        assert_eq!(updated.device_id.as_deref(), Some("mic-7"));
        assert_eq!(updated.channel_count, base.channel_count);
        assert_eq!(updated.buffer_size, base.buffer_size);
    }

    #[test]
    fn capture_patch_can_clear_device_id() {
        let base = CaptureConfig {
            device_id: Some("mic-1".into()),
            ..CaptureConfig::default()
        };
        let updated = base.apply(CaptureConfigPatch {
            device_id: Some(None),
            ..Default::default()
        });
        assert_eq!(updated.device_id, None);
    }

    #[test]
    fn processing_config_rejects_bad_sensitivity() {
        let config = ProcessingConfig {
            voice_activity_sensitivity: 1.5,
            ..ProcessingConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ProcessingConfig {
            analysis_interval_ms: 0,
            ..ProcessingConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
