//! Running statistics over submitted test results.
//!
//! [`AggregateMetrics`] is updated one result at a time and never recomputed
//! from history. Execution time is a true cumulative mean. Battery impact,
//! mesh stability and recovery time use a two-term running average
//! (`(old + v) / 2`) starting from 0.0, which weights recent samples more
//! heavily than a mean would; dashboards built against these numbers expect
//! exactly that curve.
//!
//! [`mobile_report`] is the opposite: a read-only summary derived from the
//! full history on demand.

use std::collections::BTreeMap;

use meshsim_common::models::{AggregateMetrics, Platform, TestResult, TestStatus};
use meshsim_common::protocol::{
    MobileMetricsReport, PlatformSummary, RecoverySummary, StabilitySummary,
};

/// Mean of `n` samples given the mean of the first `n - 1` and the new one.
pub fn cumulative_mean(old_avg: f64, n: u64, value: f64) -> f64 {
    if n == 0 {
        return value;
    }
    (old_avg * (n - 1) as f64 + value) / n as f64
}

pub fn two_term_average(old: f64, value: f64) -> f64 {
    (old + value) / 2.0
}

/// Folds one result into the running aggregate.
pub fn record(metrics: &mut AggregateMetrics, result: &TestResult) {
    metrics.total_tests += 1;
    match result.status {
        TestStatus::Passed => metrics.passed_tests += 1,
        TestStatus::Failed => metrics.failed_tests += 1,
    }

    metrics.average_execution_time = cumulative_mean(
        metrics.average_execution_time,
        metrics.total_tests,
        result.execution_time,
    );

    if let Some(impact) = result.battery_impact {
        let slot = metrics.battery_impact.entry(result.platform).or_insert(0.0);
        *slot = two_term_average(*slot, impact);
    }
    if let Some(stability) = result.mesh_stability {
        metrics.mesh_stability = two_term_average(metrics.mesh_stability, stability);
    }
    if let Some(recovery) = result.network_recovery_time {
        metrics.network_recovery_time =
            two_term_average(metrics.network_recovery_time, recovery);
    }
}

/// Percentage rounded to two decimals.
fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let raw = part as f64 / whole as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Per-platform and per-concern summary over the whole history.
pub fn mobile_report(results: &[TestResult]) -> MobileMetricsReport {
    let mut by_platform: BTreeMap<Platform, Vec<&TestResult>> = BTreeMap::new();
    for result in results {
        by_platform.entry(result.platform).or_default().push(result);
    }

    let platforms = by_platform
        .into_iter()
        .map(|(platform, entries)| {
            let passed = entries
                .iter()
                .filter(|r| r.status == TestStatus::Passed)
                .count();
            let battery: Vec<f64> = entries.iter().filter_map(|r| r.battery_impact).collect();
            let summary = PlatformSummary {
                count: entries.len(),
                success_rate: percent(passed, entries.len()),
                average_battery_impact: mean(&battery),
            };
            (platform, summary)
        })
        .collect();

    let stability: Vec<f64> = results.iter().filter_map(|r| r.mesh_stability).collect();
    let recovery_times: Vec<f64> = results
        .iter()
        .filter_map(|r| r.network_recovery_time)
        .collect();
    let recovery_flags: Vec<bool> = results.iter().filter_map(|r| r.recovery_success).collect();
    let recovered = recovery_flags.iter().filter(|ok| **ok).count();

    MobileMetricsReport {
        platforms,
        mesh_stability: StabilitySummary {
            samples: stability.len(),
            average: mean(&stability),
        },
        network_recovery: RecoverySummary {
            samples: recovery_times.len(),
            average_recovery_time: mean(&recovery_times),
            success_rate: (!recovery_flags.is_empty())
                .then(|| percent(recovered, recovery_flags.len())),
        },
    }
}
