//! Metrics collector and broadcaster.
//!
//! Results are ingested one at a time to completion under a single lock:
//! validate, append to history, fold into the aggregate, persist the full
//! snapshot, then publish to observers. Publishing goes through a
//! `broadcast` channel, so a slow or vanished observer only ever loses its
//! own events and never holds up a submission.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};

use meshsim_common::models::{AggregateMetrics, TestResult};
use meshsim_common::protocol::{
    CollectorEvent, MetricsSnapshot, MobileMetricsReport, ResultsResponse, TestResultInput,
};

use crate::aggregate;
use crate::store::SnapshotStore;

/// Capacity of the observer channel before lagging observers drop events.
const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("{0}")]
    Validation(String),
}

#[derive(Clone)]
pub struct Collector {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<CollectorState>,
    store: Option<SnapshotStore>,
    events: broadcast::Sender<CollectorEvent>,
}

#[derive(Default)]
struct CollectorState {
    results: Vec<TestResult>,
    metrics: AggregateMetrics,
}

impl Collector {
    /// Empty collector. With `store = None` nothing is written to disk.
    pub fn new(store: Option<SnapshotStore>) -> Self {
        Self::with_state(CollectorState::default(), store)
    }

    /// Resumes from a previously persisted snapshot.
    pub fn restore(snapshot: MetricsSnapshot, store: Option<SnapshotStore>) -> Self {
        let state = CollectorState {
            results: snapshot.results,
            metrics: snapshot.metrics,
        };
        Self::with_state(state, store)
    }

    fn with_state(state: CollectorState, store: Option<SnapshotStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                store,
                events,
            }),
        }
    }

    /// Ingests one result and returns the updated aggregate.
    ///
    /// A failed snapshot write is logged; the in-memory state stays
    /// authoritative and the submission still succeeds.
    pub async fn submit_result(
        &self,
        input: TestResultInput,
    ) -> Result<AggregateMetrics, CollectorError> {
        let result = validate(input)?;

        let mut state = self.inner.state.lock().await;
        state.results.push(result.clone());
        aggregate::record(&mut state.metrics, &result);
        let metrics = state.metrics.clone();

        tracing::info!(
            test_name = %result.test_name,
            platform = %result.platform,
            status = ?result.status,
            total = metrics.total_tests,
            "test result ingested"
        );

        if let Some(store) = &self.inner.store {
            let snapshot = MetricsSnapshot {
                results: state.results.clone(),
                metrics: metrics.clone(),
                last_updated: Utc::now(),
            };
            if let Err(e) = store.save(&snapshot).await {
                tracing::warn!(
                    path = %store.path().display(),
                    error = %e,
                    "failed to persist metrics snapshot"
                );
            }
        }

        // Sent while still holding the lock so observers see events in
        // ingestion order. No receivers is not an error.
        let _ = self.inner.events.send(CollectorEvent::ResultSubmitted {
            result,
            metrics: metrics.clone(),
        });

        Ok(metrics)
    }

    pub async fn query_results(&self) -> ResultsResponse {
        let state = self.inner.state.lock().await;
        ResultsResponse {
            results: state.results.clone(),
            metrics: state.metrics.clone(),
        }
    }

    pub async fn query_mobile_metrics(&self) -> MobileMetricsReport {
        let state = self.inner.state.lock().await;
        aggregate::mobile_report(&state.results)
    }

    /// Registers an observer and returns the aggregate it starts from.
    ///
    /// Taken under the ingestion lock: every event on the returned receiver
    /// is newer than the baseline.
    pub async fn subscribe(&self) -> (AggregateMetrics, broadcast::Receiver<CollectorEvent>) {
        let state = self.inner.state.lock().await;
        let rx = self.inner.events.subscribe();
        (state.metrics.clone(), rx)
    }

    pub fn observer_count(&self) -> usize {
        self.inner.events.receiver_count()
    }
}

/// Checks required fields and builds the stored record.
fn validate(input: TestResultInput) -> Result<TestResult, CollectorError> {
    fn missing(field: &str) -> CollectorError {
        CollectorError::Validation(format!("missing required field: {field}"))
    }

    let test_name = input
        .test_name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| missing("test_name"))?;
    let platform = input.platform.ok_or_else(|| missing("platform"))?;
    let status = input.status.ok_or_else(|| missing("status"))?;
    let execution_time = input.execution_time.ok_or_else(|| missing("execution_time"))?;
    if !execution_time.is_finite() || execution_time < 0.0 {
        return Err(CollectorError::Validation(
            "execution_time must be a non-negative number".into(),
        ));
    }

    Ok(TestResult {
        test_name,
        platform,
        status,
        execution_time,
        battery_impact: input.battery_impact,
        mesh_stability: input.mesh_stability,
        network_recovery_time: input.network_recovery_time,
        recovery_success: input.recovery_success,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshsim_common::models::{Platform, TestStatus};

    fn input(platform: Platform, status: TestStatus, execution_time: f64) -> TestResultInput {
        TestResultInput {
            test_name: Some("offline_queue_flush".into()),
            platform: Some(platform),
            status: Some(status),
            execution_time: Some(execution_time),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn submit_appends_and_aggregates() {
        let collector = Collector::new(None);
        collector
            .submit_result(input(Platform::Ios, TestStatus::Passed, 100.0))
            .await
            .unwrap();
        let metrics = collector
            .submit_result(input(Platform::Android, TestStatus::Failed, 300.0))
            .await
            .unwrap();

        assert_eq!(metrics.total_tests, 2);
        assert_eq!(metrics.failed_tests, 1);
        assert_eq!(metrics.average_execution_time, 200.0);

        let all = collector.query_results().await;
        assert_eq!(all.results.len(), 2);
        assert_eq!(all.results[0].platform, Platform::Ios);
        assert_eq!(all.metrics, metrics);
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_by_name() {
        let collector = Collector::new(None);

        let mut no_status = input(Platform::Ios, TestStatus::Passed, 1.0);
        no_status.status = None;
        let err = collector.submit_result(no_status).await.unwrap_err();
        assert!(err.to_string().contains("status"));

        let mut blank_name = input(Platform::Ios, TestStatus::Passed, 1.0);
        blank_name.test_name = Some("  ".into());
        let err = collector.submit_result(blank_name).await.unwrap_err();
        assert!(err.to_string().contains("test_name"));

        let err = collector
            .submit_result(input(Platform::Ios, TestStatus::Passed, -5.0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("execution_time"));

        assert_eq!(collector.query_results().await.metrics.total_tests, 0);
    }

    #[tokio::test]
    async fn mobile_metrics_success_rate() {
        let collector = Collector::new(None);
        for status in [TestStatus::Passed, TestStatus::Passed, TestStatus::Failed] {
            collector
                .submit_result(input(Platform::Android, status, 10.0))
                .await
                .unwrap();
        }
        let report = collector.query_mobile_metrics().await;
        let android = &report.platforms[&Platform::Android];
        assert_eq!(android.count, 3);
        assert_eq!(android.success_rate, 66.67);
    }

    #[tokio::test]
    async fn subscriber_gets_baseline_then_events_in_order() {
        let collector = Collector::new(None);
        collector
            .submit_result(input(Platform::Ios, TestStatus::Passed, 10.0))
            .await
            .unwrap();

        let (baseline, mut rx) = collector.subscribe().await;
        assert_eq!(baseline.total_tests, 1);
        assert_eq!(collector.observer_count(), 1);

        for t in [20.0, 30.0] {
            collector
                .submit_result(input(Platform::Ios, TestStatus::Passed, t))
                .await
                .unwrap();
        }

        for expected_total in [2, 3] {
            match rx.recv().await.unwrap() {
                CollectorEvent::ResultSubmitted { metrics, .. } => {
                    assert_eq!(metrics.total_tests, expected_total)
                }
                _ => panic!("wrong variant"),
            }
        }
    }

    #[tokio::test]
    async fn persistence_failure_does_not_fail_submission() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file in the way").unwrap();
        let collector = Collector::new(Some(SnapshotStore::new(blocker.join("metrics.json"))));

        let metrics = collector
            .submit_result(input(Platform::Ios, TestStatus::Passed, 10.0))
            .await
            .unwrap();
        assert_eq!(metrics.total_tests, 1);
        assert_eq!(collector.query_results().await.results.len(), 1);
    }

    #[tokio::test]
    async fn snapshot_is_written_and_restorable() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("metrics.json"));
        let collector = Collector::new(Some(store.clone()));
        for t in [10.0, 20.0] {
            collector
                .submit_result(input(Platform::Android, TestStatus::Passed, t))
                .await
                .unwrap();
        }

        let snapshot = store.load().await.unwrap().unwrap();
        assert_eq!(snapshot.results.len(), 2);
        assert_eq!(snapshot.metrics.average_execution_time, 15.0);

        let restored = Collector::restore(snapshot, Some(store));
        let metrics = restored
            .submit_result(input(Platform::Android, TestStatus::Failed, 30.0))
            .await
            .unwrap();
        assert_eq!(metrics.total_tests, 3);
        assert_eq!(metrics.average_execution_time, 20.0);
    }
}
