//! CPU budget accounting for the metrics sampling cycle.

use chrono::{DateTime, Utc};

/// Fraction of wall-clock time the sampling/analysis cycle may consume.
pub const DEFAULT_CPU_BUDGET_RATIO: f64 = 0.05;

/// One work/interval observation.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuUtilizationSample {
    pub work_ms: f64,
    pub interval_ms: f64,
    pub utilization: f64,
    pub exceeded: bool,
    pub timestamp: DateTime<Utc>,
}

/// Cumulative CPU utilization aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuLoadSummary {
    pub budget_ratio: f64,
    pub count: u64,
    pub average_utilization: f64,
    pub max_utilization: f64,
    pub breaches: u64,
}

/// Records work-time/interval-time ratios against a fixed CPU budget.
///
/// Like the performance budget tracker, input validity (positive, finite
/// interval) is the caller's responsibility.
#[derive(Debug)]
pub struct CpuLoadTracker {
    budget_ratio: f64,
    count: u64,
    total_utilization: f64,
    max_utilization: f64,
    breaches: u64,
}

impl CpuLoadTracker {
    pub fn new(budget_ratio: f64) -> Self {
        Self {
            budget_ratio,
            count: 0,
            total_utilization: 0.0,
            max_utilization: 0.0,
            breaches: 0,
        }
    }

    pub fn with_default_budget() -> Self {
        Self::new(DEFAULT_CPU_BUDGET_RATIO)
    }

    pub fn budget_ratio(&self) -> f64 {
        self.budget_ratio
    }

    pub fn record(&mut self, work_ms: f64, interval_ms: f64) -> CpuUtilizationSample {
        let utilization = work_ms / interval_ms;
        let exceeded = utilization > self.budget_ratio;

        self.count += 1;
        self.total_utilization += utilization;
        self.max_utilization = self.max_utilization.max(utilization);
        if exceeded {
            self.breaches += 1;
            log::warn!(
                "analysis cycle used {:.1}% of its interval (budget {:.1}%)",
                utilization * 100.0,
                self.budget_ratio * 100.0
            );
        }

        CpuUtilizationSample {
            work_ms,
            interval_ms,
            utilization,
            exceeded,
            timestamp: Utc::now(),
        }
    }

    pub fn summary(&self) -> CpuLoadSummary {
        CpuLoadSummary {
            budget_ratio: self.budget_ratio,
            count: self.count,
            average_utilization: if self.count > 0 {
                self.total_utilization / self.count as f64
            } else {
                0.0
            },
            max_utilization: self.max_utilization,
            breaches: self.breaches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn utilization_and_breach_detection() {
        let mut tracker = CpuLoadTracker::new(0.05);

        let ok = tracker.record(2.0, 100.0);
        assert_relative_eq!(ok.utilization, 0.02);
        assert!(!ok.exceeded);

        let breach = tracker.record(8.0, 100.0);
        assert_relative_eq!(breach.utilization, 0.08);
        assert!(breach.exceeded);

        let summary = tracker.summary();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.breaches, 1);
        assert_relative_eq!(summary.average_utilization, 0.05);
        assert_relative_eq!(summary.max_utilization, 0.08);
    }

    #[test]
    fn exact_budget_is_not_a_breach() {
        let mut tracker = CpuLoadTracker::new(0.05);
        assert!(!tracker.record(5.0, 100.0).exceeded);
    }

    #[test]
    fn empty_summary() {
        let summary = CpuLoadTracker::with_default_budget().summary();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average_utilization, 0.0);
        assert_eq!(summary.budget_ratio, DEFAULT_CPU_BUDGET_RATIO);
    }
}
