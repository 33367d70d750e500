//! Capture sample rate selection.
//!
//! Pure and deterministic: invoked both before acquisition (to request a
//! rate) and after acquisition (to normalize the rate the device actually
//! granted).

/// Rates the capture pipeline accepts, ascending.
pub const SUPPORTED_SAMPLE_RATES: [u32; 6] = [8000, 16000, 22050, 24000, 44100, 48000];

/// Rates below this are never selected even if a device offers them.
pub const MIN_SAMPLE_RATE: u32 = 8000;

/// Used when no rate was requested.
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// Resolve a requested rate to a supported one.
///
/// A supported rate at or above the minimum passes through unchanged.
/// Anything else maps to the supported rate with the smallest absolute
/// difference, preferring the larger candidate on ties. `None` or zero
/// yields the default.
pub fn resolve(requested: Option<u32>) -> u32 {
    let Some(requested) = requested.filter(|rate| *rate > 0) else {
        return DEFAULT_SAMPLE_RATE;
    };

    if requested >= MIN_SAMPLE_RATE && SUPPORTED_SAMPLE_RATES.contains(&requested) {
        return requested;
    }

    SUPPORTED_SAMPLE_RATES
        .iter()
        .copied()
        .min_by(|a, b| {
            a.abs_diff(requested)
                .cmp(&b.abs_diff(requested))
                // Equal distance: order the larger candidate first.
                .then_with(|| b.cmp(a))
        })
        .unwrap_or(DEFAULT_SAMPLE_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_rate_passes_through() {
        for rate in SUPPORTED_SAMPLE_RATES {
            assert_eq!(resolve(Some(rate)), rate);
        }
    }

    #[test]
    fn absent_request_yields_default() {
        assert_eq!(resolve(None), DEFAULT_SAMPLE_RATE);
        assert_eq!(resolve(Some(0)), DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn unsupported_rate_maps_to_closest() {
        assert_eq!(resolve(Some(44000)), 44100);
        assert_eq!(resolve(Some(47000)), 48000);
        assert_eq!(resolve(Some(11025)), 8000);
        assert_eq!(resolve(Some(96000)), 48000);
        assert_eq!(resolve(Some(1)), 8000);
    }

    #[test]
    fn ties_prefer_the_larger_rate() {
        // 23025 is equidistant (975) from 22050 and 24000.
        assert_eq!(resolve(Some(23025)), 24000);
        // 12000 is equidistant (4000) from 8000 and 16000.
        assert_eq!(resolve(Some(12000)), 16000);
    }

    #[test]
    fn closest_selection_minimizes_distance_over_whole_set() {
        for requested in [3000u32, 19000, 30000, 46000, 50000] {
            let resolved = resolve(Some(requested));
            let best = SUPPORTED_SAMPLE_RATES
                .iter()
                .map(|r| r.abs_diff(requested))
                .min()
                .unwrap();
            assert_eq!(resolved.abs_diff(requested), best);
        }
    }
}
