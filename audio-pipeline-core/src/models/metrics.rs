use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-cycle audio quality metrics for the active capture session.
///
/// Recreated empty at controller construction and at each graph creation;
/// updated via [`AudioMetrics::merge`] on every sampling cycle, never
/// replaced wholesale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMetrics {
    /// Smoothed input level in [0, 1].
    pub input_level: f32,
    pub peak_level: f32,
    pub rms_level: f32,
    pub signal_to_noise_ratio: f32,

    pub latency_estimate_secs: f64,
    pub latency_estimate_ms: f64,

    /// `1 − dropped/total`, clamped to [0, 1]. Authoritatively recomputed
    /// from render telemetry when telemetry is present.
    pub buffer_health: f32,
    pub dropped_frame_count: u64,
    pub total_frame_count: u64,

    pub analysis_window_ms: f64,
    pub analysis_duration_ms: f64,
    pub cpu_utilization: f64,

    pub render_underrun_count: u64,
    pub render_overrun_count: u64,
    pub render_dropped_frame_count: u64,
    pub consecutive_underruns: u32,

    pub updated_at: DateTime<Utc>,
}

impl AudioMetrics {
    pub fn empty() -> Self {
        Self {
            input_level: 0.0,
            peak_level: 0.0,
            rms_level: 0.0,
            signal_to_noise_ratio: 0.0,
            latency_estimate_secs: 0.0,
            latency_estimate_ms: 0.0,
            buffer_health: 1.0,
            dropped_frame_count: 0,
            total_frame_count: 0,
            analysis_window_ms: 0.0,
            analysis_duration_ms: 0.0,
            cpu_utilization: 0.0,
            render_underrun_count: 0,
            render_overrun_count: 0,
            render_dropped_frame_count: 0,
            consecutive_underruns: 0,
            updated_at: Utc::now(),
        }
    }

    /// Shallow overlay of `patch` onto `self`, stamping `updated_at`.
    /// Fields absent from the patch keep their previous values.
    pub fn merge(&self, patch: &AudioMetricsPatch) -> Self {
        Self {
            input_level: patch.input_level.unwrap_or(self.input_level),
            peak_level: patch.peak_level.unwrap_or(self.peak_level),
            rms_level: patch.rms_level.unwrap_or(self.rms_level),
            signal_to_noise_ratio: patch
                .signal_to_noise_ratio
                .unwrap_or(self.signal_to_noise_ratio),
            latency_estimate_secs: patch
                .latency_estimate_secs
                .unwrap_or(self.latency_estimate_secs),
            latency_estimate_ms: patch
                .latency_estimate_secs
                .map(|s| s * 1000.0)
                .unwrap_or(self.latency_estimate_ms),
            buffer_health: patch.buffer_health.unwrap_or(self.buffer_health),
            dropped_frame_count: patch
                .dropped_frame_count
                .unwrap_or(self.dropped_frame_count),
            total_frame_count: patch.total_frame_count.unwrap_or(self.total_frame_count),
            analysis_window_ms: patch.analysis_window_ms.unwrap_or(self.analysis_window_ms),
            analysis_duration_ms: patch
                .analysis_duration_ms
                .unwrap_or(self.analysis_duration_ms),
            cpu_utilization: patch.cpu_utilization.unwrap_or(self.cpu_utilization),
            render_underrun_count: patch
                .render_underrun_count
                .unwrap_or(self.render_underrun_count),
            render_overrun_count: patch
                .render_overrun_count
                .unwrap_or(self.render_overrun_count),
            render_dropped_frame_count: patch
                .render_dropped_frame_count
                .unwrap_or(self.render_dropped_frame_count),
            consecutive_underruns: patch
                .consecutive_underruns
                .unwrap_or(self.consecutive_underruns),
            updated_at: Utc::now(),
        }
    }
}

impl Default for AudioMetrics {
    fn default() -> Self {
        Self::empty()
    }
}

/// Partial metrics produced by one sampling cycle.
#[derive(Debug, Clone, Default)]
pub struct AudioMetricsPatch {
    pub input_level: Option<f32>,
    pub peak_level: Option<f32>,
    pub rms_level: Option<f32>,
    pub signal_to_noise_ratio: Option<f32>,
    pub latency_estimate_secs: Option<f64>,
    pub buffer_health: Option<f32>,
    pub dropped_frame_count: Option<u64>,
    pub total_frame_count: Option<u64>,
    pub analysis_window_ms: Option<f64>,
    pub analysis_duration_ms: Option<f64>,
    pub cpu_utilization: Option<f64>,
    pub render_underrun_count: Option<u64>,
    pub render_overrun_count: Option<u64>,
    pub render_dropped_frame_count: Option<u64>,
    pub consecutive_underruns: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overlays_only_present_fields() {
        let base = AudioMetrics {
            rms_level: 0.4,
            render_underrun_count: 3,
            ..AudioMetrics::empty()
        };
        let merged = base.merge(&AudioMetricsPatch {
            rms_level: Some(0.6),
            peak_level: Some(0.9),
            ..Default::default()
        });
        assert_eq!(merged.rms_level, 0.6);
        assert_eq!(merged.peak_level, 0.9);
        assert_eq!(merged.render_underrun_count, 3);
        assert!(merged.updated_at >= base.updated_at);
    }

    #[test]
    fn merge_keeps_latency_pair_consistent() {
        let merged = AudioMetrics::empty().merge(&AudioMetricsPatch {
            latency_estimate_secs: Some(0.025),
            ..Default::default()
        });
        assert_eq!(merged.latency_estimate_secs, 0.025);
        assert_eq!(merged.latency_estimate_ms, 25.0);
    }

    #[test]
    fn empty_metrics_have_full_buffer_health() {
        assert_eq!(AudioMetrics::empty().buffer_health, 1.0);
    }
}
