use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::{ForecastError, Result};
use crate::events::{Event, EventSender};
use crate::ml::DEFAULT_QUANTILE_LEVELS;
use crate::models::{
    ContextSeries, ForecastResult, ForecastRun, Prediction, SalesRecord, SkuClassification,
};
use crate::repositories::{ForecastStore, HistoryReader};
use crate::OrchestratorState;

use super::validator::{DataValidator, ValidationOptions};

/// One forecast request: which items, how far ahead, which model the
/// caller prefers when classification cannot route.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ForecastRequest {
    pub client_id: Uuid,
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub item_ids: Vec<String>,
    #[validate(range(min = 1, max = 365))]
    pub prediction_length: u32,
    pub primary_model: String,
    /// Also run the statistical baseline for comparison.
    pub include_baseline: bool,
    /// Inclusive history cutoff, used for backtesting.
    pub training_end_date: Option<NaiveDate>,
}

/// Per-method execution bookkeeping, serialized into the run's audit
/// payload.
#[derive(Debug, Default, Serialize)]
struct MethodAudit {
    attempted: usize,
    forecast_items: Vec<String>,
    skipped: Vec<SkipRecord>,
    result_rows: usize,
}

#[derive(Debug, Serialize)]
struct SkipRecord {
    item_id: String,
    reason: String,
}

/// Runs the whole forecast workflow for a batch of items: classify,
/// route, predict, persist, with per-item failure isolation and a single
/// terminal state transition per run.
pub struct ForecastOrchestrator {
    reader: Arc<dyn HistoryReader>,
    store: Arc<dyn ForecastStore>,
    state: Arc<OrchestratorState>,
    events: EventSender,
    validator: DataValidator,
}

impl ForecastOrchestrator {
    pub fn new(
        reader: Arc<dyn HistoryReader>,
        store: Arc<dyn ForecastStore>,
        state: Arc<OrchestratorState>,
        events: EventSender,
    ) -> Self {
        Self {
            reader,
            store,
            state,
            events,
            validator: DataValidator::new(),
        }
    }

    /// Execute one forecast run.
    ///
    /// Returns the terminal run: `Completed` when at least one method
    /// produced results for at least one item, `Failed` (with
    /// `error_message`) when nothing usable came out. Unexpected store or
    /// configuration failures mark the run failed and propagate as `Err`.
    #[instrument(skip(self, request), fields(client_id = %request.client_id, items = request.item_ids.len()))]
    pub async fn generate_forecast(&self, request: ForecastRequest) -> Result<ForecastRun> {
        request
            .validate()
            .map_err(|e| ForecastError::Validation(e.to_string()))?;
        self.state.factory().ensure_registered(&request.primary_model)?;

        let mut run = ForecastRun::new(
            request.client_id,
            request.user_id,
            request.primary_model.clone(),
            request.prediction_length,
            request.item_ids.clone(),
        );
        self.store.create_run(&run).await?;
        info!(run_id = %run.id, "forecast run created");

        match self.execute_run(&request, &mut run).await {
            Ok(result_rows) => {
                // commit before persisting Completed: a run whose rows
                // never became visible must not read Completed
                if run.status == crate::models::RunStatus::Completed {
                    if let Err(err) = self.store.commit_run(run.id).await {
                        error!(run_id = %run.id, error = %err, "result commit failed");
                        run.abort(err.to_string());
                        if let Err(update_err) = self.store.update_run(&run).await {
                            error!(run_id = %run.id, error = %update_err, "failed to record run failure");
                        }
                        self.emit(Event::ForecastRunFailed {
                            run_id: run.id,
                            client_id: run.client_id,
                            error: err.to_string(),
                        })
                        .await;
                        return Err(err);
                    }
                }
                if let Err(err) = self.store.update_run(&run).await {
                    error!(run_id = %run.id, error = %err, "failed to persist terminal status");
                    self.emit(Event::ForecastRunFailed {
                        run_id: run.id,
                        client_id: run.client_id,
                        error: err.to_string(),
                    })
                    .await;
                    return Err(err);
                }
                if run.status == crate::models::RunStatus::Completed {
                    self.emit(Event::ForecastRunCompleted {
                        run_id: run.id,
                        client_id: run.client_id,
                        recommended_method: run
                            .recommended_method
                            .clone()
                            .unwrap_or_default(),
                        result_rows,
                    })
                    .await;
                } else {
                    self.emit(Event::ForecastRunFailed {
                        run_id: run.id,
                        client_id: run.client_id,
                        error: run.error_message.clone().unwrap_or_default(),
                    })
                    .await;
                }
                Ok(run)
            }
            Err(err) => {
                // the one path where a hard failure surfaces to the caller
                error!(run_id = %run.id, error = %err, "forecast run aborted");
                run.fail(err.to_string());
                if let Err(update_err) = self.store.update_run(&run).await {
                    error!(run_id = %run.id, error = %update_err, "failed to record run failure");
                }
                self.emit(Event::ForecastRunFailed {
                    run_id: run.id,
                    client_id: run.client_id,
                    error: err.to_string(),
                })
                .await;
                Err(err)
            }
        }
    }

    async fn execute_run(
        &self,
        request: &ForecastRequest,
        run: &mut ForecastRun,
    ) -> Result<usize> {
        // classification pass over the full available history
        let classifications = self.classify_items(request).await?;

        let routed_method = self.route_method(&classifications, &request.primary_model);
        let mut methods = vec![routed_method.clone()];
        let baseline = self.state.config().baseline_model.clone();
        if request.include_baseline && !methods.contains(&baseline) {
            methods.push(baseline);
        }
        info!(run_id = %run.id, methods = ?methods, "routing selected");

        let mut audits: HashMap<String, MethodAudit> = HashMap::new();
        let mut total_rows = 0usize;

        for method in &methods {
            let audit = self.run_method(request, run, method).await?;
            total_rows += audit.result_rows;
            audits.insert(method.clone(), audit);
        }

        run.audit = Some(json!({
            "classified_items": classifications.len(),
            "routed_method": routed_method,
            "methods": audits,
        }));

        if total_rows > 0 {
            run.complete(routed_method);
        } else {
            run.fail("No forecast results generated for any method");
        }
        Ok(total_rows)
    }

    /// Classify every requested item that has enough usable history,
    /// upserting each classification. Items that cannot be classified are
    /// logged and skipped; they may still be forecast later.
    async fn classify_items(
        &self,
        request: &ForecastRequest,
    ) -> Result<Vec<SkuClassification>> {
        let rows = self
            .reader
            .fetch_historical_data(
                request.client_id,
                &request.item_ids,
                None,
                request.training_end_date,
            )
            .await?;
        let by_item = group_by_item(rows);

        let opts = self.validation_options();
        let mut batch: Vec<(String, ContextSeries, f64)> = Vec::new();
        for item_id in &request.item_ids {
            let Some(records) = by_item.get(item_id) else {
                warn!(item_id = %item_id, "no history, skipping classification");
                continue;
            };
            let outcome = self.validator.validate_and_clean(records, item_id, &opts);
            match outcome.cleaned {
                Some(cleaned) if outcome.is_valid => {
                    let revenue = cleaned.revenue();
                    batch.push((item_id.clone(), cleaned, revenue));
                }
                _ => {
                    warn!(
                        item_id = %item_id,
                        reason = outcome.error.as_deref().unwrap_or("unknown"),
                        "skipping classification"
                    );
                }
            }
        }

        let classifications = self
            .state
            .classifier()
            .classify_batch(request.client_id, &batch);
        for classification in &classifications {
            self.store.upsert_classification(classification).await?;
            self.emit(Event::SkuClassified {
                client_id: classification.client_id,
                item_id: classification.item_id.clone(),
                abc_class: classification.abc_class.to_string(),
                xyz_class: classification.xyz_class.to_string(),
                recommended_method: classification.recommended_method.clone(),
            })
            .await;
        }
        Ok(classifications)
    }

    /// Most frequent recommended method wins; ties break on the smaller
    /// method id so reruns stay deterministic. Falls back to the caller's
    /// primary model when nothing was classified, or when the winning
    /// method has no registered model (e.g. an embedder without a
    /// foundation pipeline attached).
    fn route_method(
        &self,
        classifications: &[SkuClassification],
        primary_model: &str,
    ) -> String {
        let mut votes: HashMap<&str, usize> = HashMap::new();
        for classification in classifications {
            *votes
                .entry(classification.recommended_method.as_str())
                .or_default() += 1;
        }
        let winner = votes
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(method, _)| method.to_string());
        match winner {
            Some(method) if self.state.factory().contains(&method) => method,
            Some(method) => {
                warn!(
                    method = %method,
                    primary_model,
                    "routed model not registered, falling back to primary"
                );
                primary_model.to_string()
            }
            None => primary_model.to_string(),
        }
    }

    /// Forecast every item under one method. Item-scoped failures are
    /// recorded in the audit and skipped; anything else propagates.
    async fn run_method(
        &self,
        request: &ForecastRequest,
        run: &ForecastRun,
        method: &str,
    ) -> Result<MethodAudit> {
        let model = self.state.model(method)?;
        model.initialize().await?;

        let rows = self
            .reader
            .fetch_historical_data(
                request.client_id,
                &request.item_ids,
                None,
                request.training_end_date,
            )
            .await?;
        let by_item = group_by_item(rows);
        let opts = self.validation_options();

        let mut audit = MethodAudit::default();
        for item_id in &request.item_ids {
            audit.attempted += 1;
            let records = by_item.get(item_id).cloned().unwrap_or_default();
            let outcome = self.validator.validate_and_clean(&records, item_id, &opts);
            let context = match (outcome.is_valid, outcome.cleaned) {
                (true, Some(context)) => context,
                _ => {
                    let reason = outcome
                        .error
                        .unwrap_or_else(|| "validation failed".to_string());
                    warn!(item_id = %item_id, method, reason = %reason, "item skipped");
                    audit.skipped.push(SkipRecord {
                        item_id: item_id.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let predictions = match model
                .predict(&context, request.prediction_length, &DEFAULT_QUANTILE_LEVELS)
                .await
            {
                Ok(predictions) => predictions,
                Err(err) if err.is_item_scoped() => {
                    warn!(item_id = %item_id, method, error = %err, "item skipped");
                    audit.skipped.push(SkipRecord {
                        item_id: item_id.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
                Err(err) => return Err(err),
            };

            let check = self.validator.validate_predictions(
                &predictions,
                item_id,
                request.prediction_length as usize,
            );
            if !check.is_valid {
                let reason = check.error.unwrap_or_else(|| "bad prediction shape".into());
                warn!(item_id = %item_id, method, reason = %reason, "prediction rejected");
                audit.skipped.push(SkipRecord {
                    item_id: item_id.clone(),
                    reason,
                });
                continue;
            }

            let rows = to_result_rows(run, method, &predictions);
            audit.result_rows += rows.len();
            audit.forecast_items.push(item_id.clone());
            self.store.insert_results(rows).await?;
        }

        info!(
            run_id = %run.id,
            method,
            forecast = audit.forecast_items.len(),
            skipped = audit.skipped.len(),
            "method finished"
        );
        Ok(audit)
    }

    fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            min_history_days: self.state.config().min_history_days,
            fill_missing_dates: true,
            fillna_strategy: super::validator::FillnaStrategy::Zero,
        }
    }

    async fn emit(&self, event: Event) {
        if let Err(err) = self.events.send(event).await {
            warn!(error = %err, "event dropped");
        }
    }
}

fn group_by_item(rows: Vec<SalesRecord>) -> HashMap<String, Vec<SalesRecord>> {
    let mut by_item: HashMap<String, Vec<SalesRecord>> = HashMap::new();
    for row in rows {
        by_item.entry(row.item_id.clone()).or_default().push(row);
    }
    by_item
}

fn to_result_rows(
    run: &ForecastRun,
    method: &str,
    predictions: &[Prediction],
) -> Vec<ForecastResult> {
    predictions
        .iter()
        .enumerate()
        .map(|(i, prediction)| ForecastResult {
            forecast_run_id: run.id,
            client_id: run.client_id,
            item_id: prediction.item_id.clone(),
            method: method.to_string(),
            date: prediction.date,
            horizon_day: i as u32 + 1,
            point_forecast: prediction.point_forecast,
            p10: prediction.quantile("p10"),
            p50: prediction.quantile("p50"),
            p90: prediction.quantile("p90"),
            actual_value: None,
        })
        .collect()
}
