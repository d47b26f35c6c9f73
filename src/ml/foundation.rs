use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::errors::{ForecastError, Result};
use crate::models::{ContextSeries, Prediction};

use super::{check_predict_inputs, ForecastModel, ModelInfo};

pub const MODEL_ID: &str = "foundation";

/// Context rows in the shape the external pipeline expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSeries {
    pub item_id: String,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    pub covariates: HashMap<String, Vec<f64>>,
}

/// One forecasted day as returned by the pipeline, with whatever column
/// names the pipeline uses. `FoundationModel` normalizes these into the
/// common prediction schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRow {
    pub date: NaiveDate,
    /// Column name -> value, e.g. "mean", "median", "0.1", "0.9".
    pub columns: HashMap<String, f64>,
}

/// Seam to an external pretrained time-series pipeline (a foundation
/// transformer served out of process or loaded from local weights).
/// Loading is expensive; `load` is called at most once per process per
/// model id, guarded by the wrapping model.
#[async_trait]
pub trait ForecastPipeline: Send + Sync {
    async fn load(&self) -> Result<()>;

    async fn forecast(
        &self,
        series: PipelineSeries,
        prediction_length: u32,
        quantile_levels: &[f64],
    ) -> Result<Vec<PipelineRow>>;

    fn name(&self) -> &str;
}

/// Foundation ML model: wraps a pretrained forecasting pipeline behind
/// the common model contract.
pub struct FoundationModel {
    pipeline: Arc<dyn ForecastPipeline>,
    min_history: usize,
    loaded: OnceCell<()>,
}

impl FoundationModel {
    pub fn new(pipeline: Arc<dyn ForecastPipeline>) -> Self {
        Self {
            pipeline,
            min_history: 5,
            loaded: OnceCell::new(),
        }
    }

    fn to_pipeline_series(context: &ContextSeries) -> PipelineSeries {
        let mut covariates: HashMap<String, Vec<f64>> = HashMap::new();
        let keys: Vec<String> = context
            .points()
            .iter()
            .filter_map(|p| p.covariates.as_ref())
            .flat_map(|c| c.keys().cloned())
            .collect();
        for key in keys {
            if !covariates.contains_key(&key) {
                let column = context
                    .points()
                    .iter()
                    .map(|p| {
                        p.covariates
                            .as_ref()
                            .and_then(|c| c.get(&key))
                            .copied()
                            .unwrap_or(0.0)
                    })
                    .collect();
                covariates.insert(key, column);
            }
        }
        PipelineSeries {
            item_id: context.item_id().to_string(),
            dates: context.points().iter().map(|p| p.date).collect(),
            values: context.targets(),
            covariates,
        }
    }

    /// Map the pipeline's output columns into the common schema. The
    /// point forecast prefers an explicit mean, then the median column,
    /// then the p50 quantile.
    fn normalize_row(item_id: &str, row: PipelineRow, quantile_levels: &[f64]) -> Result<Prediction> {
        let mut quantiles = BTreeMap::new();
        for &level in quantile_levels {
            let key = super::quantile_key(level);
            let value = row
                .columns
                .get(&key)
                .or_else(|| row.columns.get(&format!("{level}")))
                .or_else(|| row.columns.get(&format!("{level:.1}")))
                .copied();
            if let Some(v) = value {
                quantiles.insert(key, v.max(0.0));
            }
        }

        let point = row
            .columns
            .get("mean")
            .or_else(|| row.columns.get("median"))
            .copied()
            .or_else(|| quantiles.get("p50").copied());

        let Some(point) = point else {
            return Err(ForecastError::ModelExecution(format!(
                "pipeline returned no usable point forecast column for item {item_id} \
                 (columns: {:?})",
                row.columns.keys().collect::<Vec<_>>()
            )));
        };

        Ok(Prediction {
            item_id: item_id.to_string(),
            date: row.date,
            point_forecast: point.max(0.0),
            quantiles: if quantiles.is_empty() {
                None
            } else {
                Some(quantiles)
            },
        })
    }
}

#[async_trait]
impl ForecastModel for FoundationModel {
    /// Loads pipeline weights once; concurrent first calls collapse into
    /// a single load via the cell.
    async fn initialize(&self) -> Result<()> {
        self.loaded
            .get_or_try_init(|| async {
                debug!(pipeline = self.pipeline.name(), "loading forecast pipeline");
                self.pipeline.load().await
            })
            .await?;
        Ok(())
    }

    #[instrument(skip(self, context, quantile_levels), fields(item_id = context.item_id()))]
    async fn predict(
        &self,
        context: &ContextSeries,
        prediction_length: u32,
        quantile_levels: &[f64],
    ) -> Result<Vec<Prediction>> {
        check_predict_inputs(context, prediction_length, self.min_history)?;
        self.initialize().await?;

        let series = Self::to_pipeline_series(context);
        let rows = self
            .pipeline
            .forecast(series, prediction_length, quantile_levels)
            .await
            .map_err(|e| match e {
                err @ ForecastError::ModelExecution(_) => err,
                other => ForecastError::ModelExecution(format!(
                    "pipeline {} failed for item {}: {other}",
                    self.pipeline.name(),
                    context.item_id()
                )),
            })?;

        rows.into_iter()
            .map(|row| Self::normalize_row(context.item_id(), row, quantile_levels))
            .collect()
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            id: MODEL_ID.to_string(),
            name: "Foundation".to_string(),
            description: format!("Pretrained pipeline: {}", self.pipeline.name()),
            min_history: self.min_history,
            supports_quantiles: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::test_support::series;
    use crate::ml::DEFAULT_QUANTILE_LEVELS;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubPipeline {
        loads: AtomicUsize,
        fail: bool,
    }

    impl StubPipeline {
        fn new(fail: bool) -> Self {
            Self {
                loads: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl ForecastPipeline for StubPipeline {
        async fn load(&self) -> Result<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn forecast(
            &self,
            series: PipelineSeries,
            prediction_length: u32,
            _quantile_levels: &[f64],
        ) -> Result<Vec<PipelineRow>> {
            if self.fail {
                return Err(ForecastError::Internal("cuda out of memory".into()));
            }
            let last = *series.dates.last().unwrap();
            Ok((1..=prediction_length)
                .map(|day| {
                    let mut columns = HashMap::new();
                    columns.insert("median".to_string(), 12.0);
                    columns.insert("0.1".to_string(), 6.0);
                    columns.insert("0.9".to_string(), 20.0);
                    PipelineRow {
                        date: last + chrono::Days::new(day as u64),
                        columns,
                    }
                })
                .collect())
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    #[tokio::test]
    async fn initialize_is_single_flight() {
        let pipeline = Arc::new(StubPipeline::new(false));
        let model = FoundationModel::new(pipeline.clone());
        model.initialize().await.unwrap();
        model.initialize().await.unwrap();
        assert_eq!(pipeline.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn normalizes_pipeline_columns() {
        let model = FoundationModel::new(Arc::new(StubPipeline::new(false)));
        let ctx = series("SKU-1", &[10.0; 8]);
        let preds = model
            .predict(&ctx, 4, &DEFAULT_QUANTILE_LEVELS)
            .await
            .unwrap();
        assert_eq!(preds.len(), 4);
        assert_eq!(preds[0].point_forecast, 12.0);
        assert_eq!(preds[0].quantile("p10"), Some(6.0));
        assert_eq!(preds[0].quantile("p90"), Some(20.0));
    }

    #[tokio::test]
    async fn pipeline_failure_becomes_model_execution_error() {
        let model = FoundationModel::new(Arc::new(StubPipeline::new(true)));
        let ctx = series("SKU-1", &[10.0; 8]);
        let err = model
            .predict(&ctx, 4, &DEFAULT_QUANTILE_LEVELS)
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::ModelExecution(_)));
    }
}
