mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use common::{harness, history, request};
use uuid::Uuid;

use demand_forecast_core::config::ForecastingConfig;
use demand_forecast_core::errors::{ForecastError, Result};
use demand_forecast_core::events::{Event, EventSender};
use demand_forecast_core::models::{ForecastResult, ForecastRun, RunStatus, SkuClassification};
use demand_forecast_core::repositories::{ForecastStore, InMemoryForecastStore, ResultFilter};
use demand_forecast_core::services::ForecastOrchestrator;
use demand_forecast_core::OrchestratorState;

#[tokio::test]
async fn mixed_batch_completes_with_results_for_good_items_only() {
    let h = harness();
    h.store
        .seed_history(h.client_id, history("SKU-GOOD-1", &[20.0; 30]))
        .await;
    h.store
        .seed_history(h.client_id, history("SKU-GOOD-2", &[12.0; 30]))
        .await;
    // three days of history cannot clear the 7-day minimum
    h.store
        .seed_history(h.client_id, history("SKU-SHORT", &[5.0, 5.0, 5.0]))
        .await;

    let run = h
        .orchestrator
        .generate_forecast(request(
            h.client_id,
            &["SKU-GOOD-1", "SKU-GOOD-2", "SKU-SHORT"],
            14,
        ))
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.error_message.is_none());
    assert!(run.recommended_method.is_some());

    let rows = h
        .store
        .query_results(&ResultFilter {
            forecast_run_id: Some(run.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|r| r.item_id != "SKU-SHORT"));
    assert!(rows.iter().any(|r| r.item_id == "SKU-GOOD-1"));
    assert!(rows.iter().any(|r| r.item_id == "SKU-GOOD-2"));

    // horizon_day runs 1..=14 per item per method
    let per_item: Vec<_> = rows
        .iter()
        .filter(|r| r.item_id == "SKU-GOOD-1" && r.method == run.recommended_method.clone().unwrap())
        .collect();
    assert_eq!(per_item.len(), 14);
    assert!(per_item.iter().any(|r| r.horizon_day == 1));
    assert!(per_item.iter().any(|r| r.horizon_day == 14));
}

#[tokio::test]
async fn all_items_failing_marks_run_failed_with_no_rows() {
    let h = harness();
    h.store
        .seed_history(h.client_id, history("SKU-A", &[1.0, 1.0]))
        .await;
    h.store
        .seed_history(h.client_id, history("SKU-B", &[2.0]))
        .await;

    let run = h
        .orchestrator
        .generate_forecast(request(h.client_id, &["SKU-A", "SKU-B", "SKU-ABSENT"], 7))
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        run.error_message.as_deref(),
        Some("No forecast results generated for any method")
    );

    let rows = h
        .store
        .query_results(&ResultFilter {
            forecast_run_id: Some(run.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(rows.is_empty());

    // the terminal state is persisted
    let stored = h.store.get_run(run.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
}

#[tokio::test]
async fn baseline_runs_alongside_routed_method() {
    let h = harness();
    // constant demand routes to the foundation model (A-X regular)
    h.store
        .seed_history(h.client_id, history("SKU-1", &[30.0; 40]))
        .await;

    let run = h
        .orchestrator
        .generate_forecast(request(h.client_id, &["SKU-1"], 7))
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.recommended_method.as_deref(), Some("foundation"));

    let rows = h
        .store
        .query_results(&ResultFilter {
            forecast_run_id: Some(run.id),
            ..Default::default()
        })
        .await
        .unwrap();
    let methods: std::collections::HashSet<_> =
        rows.iter().map(|r| r.method.as_str()).collect();
    assert!(methods.contains("foundation"));
    assert!(methods.contains("moving_average"));
}

#[tokio::test]
async fn unknown_primary_model_fails_fast_without_a_run() {
    let h = harness();
    let mut req = request(h.client_id, &["SKU-1"], 7);
    req.primary_model = "prophet".to_string();

    let err = h.orchestrator.generate_forecast(req).await.unwrap_err();
    assert_matches!(err, ForecastError::Configuration(_));
    assert!(err.to_string().contains("prophet"));
}

#[tokio::test]
async fn invalid_horizon_is_rejected() {
    let h = harness();
    let mut req = request(h.client_id, &["SKU-1"], 7);
    req.prediction_length = 0;
    assert!(matches!(
        h.orchestrator.generate_forecast(req).await,
        Err(ForecastError::Validation(_))
    ));

    let mut req = request(h.client_id, &["SKU-1"], 7);
    req.item_ids.clear();
    assert!(matches!(
        h.orchestrator.generate_forecast(req).await,
        Err(ForecastError::Validation(_))
    ));
}

#[tokio::test]
async fn backtest_cutoff_limits_training_history() {
    let h = harness();
    // 30 days of 10, then a spike the cutoff must hide
    let mut targets = vec![10.0; 30];
    targets.extend_from_slice(&[1000.0; 10]);
    h.store
        .seed_history(h.client_id, history("SKU-1", &targets))
        .await;

    let mut req = request(h.client_id, &["SKU-1"], 7);
    req.include_baseline = false;
    req.training_end_date = Some(common::start_date() + chrono::Days::new(29));

    let run = h.orchestrator.generate_forecast(req).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let rows = h
        .store
        .query_results(&ResultFilter {
            forecast_run_id: Some(run.id),
            ..Default::default()
        })
        .await
        .unwrap();
    // trained on the flat 10s only
    assert!(rows.iter().all(|r| r.point_forecast < 100.0));
    // forecasts start after the cutoff, not after the full series
    let first_date = rows.iter().map(|r| r.date).min().unwrap();
    assert_eq!(first_date, common::start_date() + chrono::Days::new(30));
}

/// Delegates everything to the in-memory store except the commit stage.
struct CommitFailStore {
    inner: Arc<InMemoryForecastStore>,
}

#[async_trait::async_trait]
impl ForecastStore for CommitFailStore {
    async fn create_run(&self, run: &ForecastRun) -> Result<()> {
        self.inner.create_run(run).await
    }

    async fn update_run(&self, run: &ForecastRun) -> Result<()> {
        self.inner.update_run(run).await
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<ForecastRun>> {
        self.inner.get_run(run_id).await
    }

    async fn insert_results(&self, rows: Vec<ForecastResult>) -> Result<()> {
        self.inner.insert_results(rows).await
    }

    async fn commit_run(&self, _run_id: Uuid) -> Result<()> {
        Err(ForecastError::Store("commit rejected".into()))
    }

    async fn delete_run(&self, run_id: Uuid) -> Result<()> {
        self.inner.delete_run(run_id).await
    }

    async fn query_results(&self, filter: &ResultFilter) -> Result<Vec<ForecastResult>> {
        self.inner.query_results(filter).await
    }

    async fn upsert_classification(&self, classification: &SkuClassification) -> Result<()> {
        self.inner.upsert_classification(classification).await
    }

    async fn get_classification(
        &self,
        client_id: Uuid,
        item_id: &str,
    ) -> Result<Option<SkuClassification>> {
        self.inner.get_classification(client_id, item_id).await
    }

    async fn set_actual_value(
        &self,
        client_id: Uuid,
        item_id: &str,
        date: NaiveDate,
        value: f64,
    ) -> Result<u64> {
        self.inner.set_actual_value(client_id, item_id, date, value).await
    }
}

#[tokio::test]
async fn commit_failure_marks_run_failed_not_completed() {
    let client_id = Uuid::new_v4();
    let inner = Arc::new(InMemoryForecastStore::new());
    inner
        .seed_history(client_id, history("SKU-1", &[10.0; 30]))
        .await;
    let store = Arc::new(CommitFailStore {
        inner: inner.clone(),
    });
    let state = Arc::new(OrchestratorState::with_pipeline(
        ForecastingConfig::default(),
        Arc::new(common::MeanPipeline),
    ));
    let (sender, mut events) = EventSender::channel(64);
    let orchestrator = ForecastOrchestrator::new(inner.clone(), store, state, sender);

    let err = orchestrator
        .generate_forecast(request(client_id, &["SKU-1"], 5))
        .await
        .unwrap_err();
    assert_matches!(err, ForecastError::Store(_));

    let mut failed_run_id = None;
    while let Ok(event) = events.try_recv() {
        if let Event::ForecastRunFailed { run_id, error, .. } = event {
            assert!(error.contains("commit rejected"));
            failed_run_id = Some(run_id);
        }
    }
    let run_id = failed_run_id.expect("failure event emitted");

    // the persisted status never reads Completed for a run whose rows
    // were not committed
    let stored = inner.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
    assert!(stored.error_message.is_some());
    let rows = inner
        .query_results(&ResultFilter {
            forecast_run_id: Some(run_id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn run_audit_records_skips() {
    let h = harness();
    h.store
        .seed_history(h.client_id, history("SKU-OK", &[8.0; 30]))
        .await;
    h.store
        .seed_history(h.client_id, history("SKU-SHORT", &[8.0; 3]))
        .await;

    let run = h
        .orchestrator
        .generate_forecast(request(h.client_id, &["SKU-OK", "SKU-SHORT"], 7))
        .await
        .unwrap();

    let audit = run.audit.expect("audit payload present");
    let methods = audit.get("methods").unwrap().as_object().unwrap();
    assert!(!methods.is_empty());
    for (_, method_audit) in methods {
        let skipped = method_audit.get("skipped").unwrap().as_array().unwrap();
        assert!(skipped
            .iter()
            .any(|s| s.get("item_id").unwrap() == "SKU-SHORT"));
    }
    // top-level error signal stays coarse
    assert!(run.error_message.is_none());
}
