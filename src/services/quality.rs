use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::ForecastResult;
use crate::repositories::{ForecastStore, ResultFilter};

/// Which persisted forecasts to score.
#[derive(Debug, Clone)]
pub struct QualityScope {
    pub client_id: Uuid,
    pub item_id: String,
    pub method: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub forecast_run_id: Option<Uuid>,
}

/// Standard backtest accuracy metrics over backfilled rows.
///
/// `bias` is signed (forecast minus actual) so persistent over- or
/// under-forecasting stays visible. `sample_size` counts the rows that
/// entered the MAPE, i.e. rows whose actual is nonzero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub mape: f64,
    pub mae: f64,
    pub rmse: f64,
    pub bias: f64,
    pub sample_size: usize,
}

/// Scores persisted forecasts against later-backfilled actuals, the
/// comparison that decides whether routing picked the right method.
pub struct QualityCalculator {
    store: Arc<dyn ForecastStore>,
}

impl QualityCalculator {
    pub fn new(store: Arc<dyn ForecastStore>) -> Self {
        Self { store }
    }

    /// Metrics for one (item, method) in a window. Rows without a
    /// backfilled actual never participate; an empty window yields zero
    /// metrics, not an error.
    #[instrument(skip(self), fields(item_id = %scope.item_id, method = %scope.method))]
    pub async fn calculate_quality_metrics(&self, scope: &QualityScope) -> Result<QualityMetrics> {
        let filter = ResultFilter {
            client_id: Some(scope.client_id),
            item_id: Some(scope.item_id.clone()),
            method: Some(scope.method.clone()),
            forecast_run_id: scope.forecast_run_id,
            start_date: scope.start_date,
            end_date: scope.end_date,
            with_actuals_only: true,
        };
        let rows = self.store.query_results(&filter).await?;
        Ok(compute_metrics(&rows))
    }

    /// Per-method metric table for one item over a window.
    pub async fn compare_methods(
        &self,
        client_id: Uuid,
        item_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<HashMap<String, QualityMetrics>> {
        let filter = ResultFilter {
            client_id: Some(client_id),
            item_id: Some(item_id.to_string()),
            start_date,
            end_date,
            with_actuals_only: true,
            ..Default::default()
        };
        let rows = self.store.query_results(&filter).await?;

        let mut by_method: HashMap<String, Vec<ForecastResult>> = HashMap::new();
        for row in rows {
            by_method.entry(row.method.clone()).or_default().push(row);
        }
        Ok(by_method
            .into_iter()
            .map(|(method, rows)| (method, compute_metrics(&rows)))
            .collect())
    }
}

fn compute_metrics(rows: &[ForecastResult]) -> QualityMetrics {
    let scored: Vec<(f64, f64)> = rows
        .iter()
        .filter_map(|row| row.actual_value.map(|actual| (row.point_forecast, actual)))
        .collect();
    if scored.is_empty() {
        return QualityMetrics::default();
    }

    let n = scored.len() as f64;
    let mae = scored.iter().map(|(f, a)| (f - a).abs()).sum::<f64>() / n;
    let rmse = (scored.iter().map(|(f, a)| (f - a) * (f - a)).sum::<f64>() / n).sqrt();
    let bias = scored.iter().map(|(f, a)| f - a).sum::<f64>() / n;

    // zero actuals cannot enter a percentage error
    let mape_rows: Vec<&(f64, f64)> = scored.iter().filter(|(_, a)| *a != 0.0).collect();
    let mape = if mape_rows.is_empty() {
        0.0
    } else {
        mape_rows
            .iter()
            .map(|(f, a)| ((f - a) / a).abs())
            .sum::<f64>()
            / mape_rows.len() as f64
            * 100.0
    };

    QualityMetrics {
        mape,
        mae,
        rmse,
        bias,
        sample_size: mape_rows.len(),
    }
}
