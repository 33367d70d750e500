//! Pure signal-level math over time-domain sample windows.

/// Floor below which a window is treated as silence.
pub const LEVEL_EPSILON: f32 = 1e-6;

/// Conservative SNR reported when no sample qualifies as noise.
pub const HIGH_SNR_DB: f32 = 30.0;

/// Samples quieter than this fraction of the window RMS count as noise.
const NOISE_GATE_RATIO: f32 = 0.5;

/// Largest absolute sample value in the window.
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
}

/// Root-mean-square of the window.
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    energy.sqrt()
}

/// Signal-to-noise estimate in dB for one analysis window.
///
/// Samples under half the window RMS are classified as noise. A silent
/// window reports 0; a window with no qualifying noise samples reports the
/// conservative [`HIGH_SNR_DB`].
pub fn signal_to_noise_db(samples: &[f32]) -> f32 {
    let rms = rms_level(samples);
    if rms < LEVEL_EPSILON {
        return 0.0;
    }

    let gate = NOISE_GATE_RATIO * rms;
    let noise: Vec<f32> = samples
        .iter()
        .copied()
        .filter(|s| s.abs() < gate)
        .collect();
    if noise.is_empty() {
        return HIGH_SNR_DB;
    }

    let noise_rms = rms_level(&noise);
    let snr = 20.0 * ((rms + LEVEL_EPSILON) / (noise_rms + LEVEL_EPSILON)).log10();
    if snr.is_finite() {
        snr
    } else {
        0.0
    }
}

/// Normalized frame-drop health: `1 − dropped/total` clamped to [0, 1].
/// A session with no frames yet is healthy by definition.
pub fn buffer_health(total_frames: u64, dropped_frames: u64) -> f32 {
    if total_frames == 0 {
        return 1.0;
    }
    (1.0 - dropped_frames as f32 / total_frames as f32).clamp(0.0, 1.0)
}

/// Exponentially weighted moving average for smoothing per-cycle levels.
#[derive(Debug, Clone)]
pub struct ExponentialAverage {
    alpha: f32,
    value: Option<f32>,
}

impl ExponentialAverage {
    /// `alpha` is the weight of the newest sample, clamped to (0, 1].
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(f32::EPSILON, 1.0),
            value: None,
        }
    }

    /// Fold in a sample and return the updated average. The first sample
    /// seeds the average directly.
    pub fn update(&mut self, sample: f32) -> f32 {
        let next = match self.value {
            Some(current) => current + self.alpha * (sample - current),
            None => sample,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> f32 {
        self.value.unwrap_or(0.0)
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn peak_is_max_absolute_sample() {
        assert_eq!(peak_level(&[0.1, -0.7, 0.3]), 0.7);
        assert_eq!(peak_level(&[]), 0.0);
    }

    #[test]
    fn rms_of_constant_signal() {
        assert_relative_eq!(rms_level(&[0.5; 64]), 0.5, epsilon = 1e-6);
        assert_eq!(rms_level(&[]), 0.0);
    }

    #[test]
    fn snr_is_zero_for_silence() {
        assert_eq!(signal_to_noise_db(&[0.0; 128]), 0.0);
    }

    #[test]
    fn snr_is_high_when_no_noise_samples_qualify() {
        // Constant amplitude: every sample equals the RMS, so nothing falls
        // under the 0.5·RMS gate.
        assert_eq!(signal_to_noise_db(&[0.4; 128]), HIGH_SNR_DB);
    }

    #[test]
    fn snr_reflects_noise_floor() {
        let mut samples = vec![0.8f32; 100];
        samples.extend(std::iter::repeat(0.01).take(100));
        let snr = signal_to_noise_db(&samples);
        assert!(snr > 0.0 && snr < HIGH_SNR_DB, "snr = {snr}");
    }

    #[test]
    fn buffer_health_bounds() {
        assert_eq!(buffer_health(0, 0), 1.0);
        assert_eq!(buffer_health(0, 10), 1.0);
        assert_eq!(buffer_health(100, 0), 1.0);
        assert_relative_eq!(buffer_health(128, 32), 0.75);
        assert_eq!(buffer_health(10, 20), 0.0);
    }

    #[test]
    fn buffer_health_monotonically_decreases_in_drops() {
        let mut previous = 1.0f32;
        for dropped in 0..=100 {
            let health = buffer_health(100, dropped);
            assert!(health <= previous);
            assert!((0.0..=1.0).contains(&health));
            previous = health;
        }
    }

    #[test]
    fn exponential_average_seeds_and_converges() {
        let mut avg = ExponentialAverage::new(0.5);
        assert_eq!(avg.value(), 0.0);
        assert_eq!(avg.update(1.0), 1.0);
        assert_relative_eq!(avg.update(0.0), 0.5);
        assert_relative_eq!(avg.update(0.0), 0.25);
        avg.reset();
        assert_eq!(avg.update(0.3), 0.3);
    }
}
