//! Named latency budgets for detecting soft real-time violations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Static description of one performance budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceBudgetDefinition {
    pub id: &'static str,
    pub limit_ms: f64,
    pub requirement: &'static str,
    pub description: &'static str,
}

/// Budgets the capture controller records against.
pub const DEFAULT_BUDGETS: [PerformanceBudgetDefinition; 5] = [
    PerformanceBudgetDefinition {
        id: "initialization",
        limit_ms: 1000.0,
        requirement: "controller initialization completes within one second",
        description: "full initialize() call including configuration and capability checks",
    },
    PerformanceBudgetDefinition {
        id: "device-validation",
        limit_ms: 500.0,
        requirement: "device probe completes fast enough to not delay capture start",
        description: "validate_device() including the scoped test acquisition",
    },
    PerformanceBudgetDefinition {
        id: "analysis-cycle",
        limit_ms: 50.0,
        requirement: "one metrics sampling cycle stays well under the sampler interval",
        description: "analyze_audio_level() plus metric merge per sampler tick",
    },
    PerformanceBudgetDefinition {
        id: "end-to-end-latency",
        limit_ms: 250.0,
        requirement: "capture-to-render latency estimate stays interactive",
        description: "measured rendering latency per sampling cycle",
    },
    PerformanceBudgetDefinition {
        id: "track-replacement",
        limit_ms: 1500.0,
        requirement: "live device swap completes without audible gap",
        description: "full replace_capture_track() acquire-verify-swap sequence",
    },
];

/// One recorded observation against a budget.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetSample {
    pub duration_ms: f64,
    pub exceeded: bool,
    pub overage_ms: f64,
    pub timestamp: DateTime<Utc>,
}

/// Cumulative aggregation for one budget id.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetSummary {
    pub id: &'static str,
    pub limit_ms: f64,
    pub count: u64,
    pub average_ms: f64,
    pub max_ms: f64,
    pub breaches: u64,
}

#[derive(Debug, Default)]
struct BudgetStats {
    count: u64,
    total_ms: f64,
    max_ms: f64,
    breaches: u64,
    samples: Vec<BudgetSample>,
}

/// Records duration samples against named budgets and reports breaches.
///
/// Callers reject negative or non-finite durations before recording; the
/// tracker assumes valid input. Samples live in memory for the tracker's
/// lifetime (one capture session).
#[derive(Debug)]
pub struct PerformanceBudgetTracker {
    definitions: HashMap<&'static str, PerformanceBudgetDefinition>,
    stats: HashMap<&'static str, BudgetStats>,
}

impl PerformanceBudgetTracker {
    pub fn new(definitions: &[PerformanceBudgetDefinition]) -> Self {
        Self {
            definitions: definitions.iter().map(|d| (d.id, *d)).collect(),
            stats: HashMap::new(),
        }
    }

    pub fn with_default_budgets() -> Self {
        Self::new(&DEFAULT_BUDGETS)
    }

    /// Record one observation. Unknown budget ids are logged and ignored.
    pub fn record(&mut self, id: &str, duration_ms: f64) -> Option<BudgetSample> {
        let Some(definition) = self.definitions.get(id).copied() else {
            log::warn!("duration sample for unknown budget '{id}' ignored");
            return None;
        };

        let exceeded = duration_ms > definition.limit_ms;
        let sample = BudgetSample {
            duration_ms,
            exceeded,
            overage_ms: (duration_ms - definition.limit_ms).max(0.0),
            timestamp: Utc::now(),
        };

        let stats = self.stats.entry(definition.id).or_default();
        stats.count += 1;
        stats.total_ms += duration_ms;
        stats.max_ms = stats.max_ms.max(duration_ms);
        if exceeded {
            stats.breaches += 1;
            log::warn!(
                "budget '{}' exceeded: {:.2}ms over {:.2}ms limit",
                definition.id,
                duration_ms,
                definition.limit_ms
            );
        }
        stats.samples.push(sample.clone());

        Some(sample)
    }

    pub fn summary(&self, id: &str) -> Option<BudgetSummary> {
        let definition = self.definitions.get(id)?;
        let stats = self.stats.get(definition.id)?;
        Some(BudgetSummary {
            id: definition.id,
            limit_ms: definition.limit_ms,
            count: stats.count,
            average_ms: if stats.count > 0 {
                stats.total_ms / stats.count as f64
            } else {
                0.0
            },
            max_ms: stats.max_ms,
            breaches: stats.breaches,
        })
    }

    /// Summaries for every budget that has at least one sample.
    pub fn summaries(&self) -> Vec<BudgetSummary> {
        let mut all: Vec<BudgetSummary> = self
            .stats
            .keys()
            .filter_map(|id| self.summary(id))
            .collect();
        all.sort_by_key(|s| s.id);
        all
    }

    pub fn samples(&self, id: &str) -> &[BudgetSample] {
        self.stats
            .get(id)
            .map(|s| s.samples.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tracker_with_limit_50() -> PerformanceBudgetTracker {
        PerformanceBudgetTracker::new(&[PerformanceBudgetDefinition {
            id: "analysis-cycle",
            limit_ms: 50.0,
            requirement: "test",
            description: "test",
        }])
    }

    #[test]
    fn exceeded_flag_and_overage() {
        let mut tracker = tracker_with_limit_50();

        let over = tracker.record("analysis-cycle", 65.0).unwrap();
        assert!(over.exceeded);
        assert_relative_eq!(over.overage_ms, 15.0);

        let under = tracker.record("analysis-cycle", 40.0).unwrap();
        assert!(!under.exceeded);
        assert_eq!(under.overage_ms, 0.0);

        let summary = tracker.summary("analysis-cycle").unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.breaches, 1);
        assert!(summary.max_ms >= 65.0);
        assert_relative_eq!(summary.average_ms, 52.5);
    }

    #[test]
    fn exact_limit_is_not_a_breach() {
        let mut tracker = tracker_with_limit_50();
        assert!(!tracker.record("analysis-cycle", 50.0).unwrap().exceeded);
    }

    #[test]
    fn unknown_budget_is_ignored() {
        let mut tracker = tracker_with_limit_50();
        assert!(tracker.record("nonexistent", 10.0).is_none());
        assert!(tracker.summary("nonexistent").is_none());
    }

    #[test]
    fn samples_are_append_only() {
        let mut tracker = tracker_with_limit_50();
        tracker.record("analysis-cycle", 10.0);
        tracker.record("analysis-cycle", 20.0);
        let samples = tracker.samples("analysis-cycle");
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].duration_ms, 10.0);
        assert_eq!(samples[1].duration_ms, 20.0);
    }

    #[test]
    fn default_budgets_cover_controller_operations() {
        let tracker = PerformanceBudgetTracker::with_default_budgets();
        for id in [
            "initialization",
            "device-validation",
            "analysis-cycle",
            "end-to-end-latency",
            "track-replacement",
        ] {
            assert!(tracker.definitions.contains_key(id), "missing budget {id}");
        }
    }
}
