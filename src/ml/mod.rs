/*!
 * Forecast model strategy family.
 *
 * Every model implements the same `ForecastModel` contract so the
 * orchestrator can run statistical baselines and the foundation ML model
 * through one code path. Models are created by id through the
 * [`factory::ModelFactory`] and cached per process.
 */

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{ForecastError, Result};
use crate::models::{quantile_key, ContextSeries, Prediction};

pub mod croston;
pub mod factory;
pub mod foundation;
pub mod min_max;
pub mod moving_average;
pub mod sba;

pub use croston::CrostonModel;
pub use factory::ModelFactory;
pub use foundation::{ForecastPipeline, FoundationModel, PipelineRow, PipelineSeries};
pub use min_max::MinMaxModel;
pub use moving_average::MovingAverageModel;
pub use sba::SbaModel;

/// Default quantile levels requested from every model.
pub const DEFAULT_QUANTILE_LEVELS: [f64; 3] = [0.1, 0.5, 0.9];

/// Hard cap on the forecast horizon, in days.
pub const MAX_PREDICTION_LENGTH: u32 = 365;

/// Static description of a model, used by the factory's capability check
/// and surfaced in run audit payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub min_history: usize,
    pub supports_quantiles: bool,
}

/// Common contract for all forecasting strategies.
#[async_trait]
pub trait ForecastModel: Send + Sync {
    /// Idempotent; lazily loads any heavy resource. Safe to call more
    /// than once, only the first call does work.
    async fn initialize(&self) -> Result<()>;

    /// Produce `prediction_length` daily predictions following the end of
    /// the context series.
    async fn predict(
        &self,
        context: &ContextSeries,
        prediction_length: u32,
        quantile_levels: &[f64],
    ) -> Result<Vec<Prediction>>;

    fn model_info(&self) -> ModelInfo;

    /// Minimum number of cleaned history days this model needs.
    fn min_history(&self) -> usize {
        self.model_info().min_history
    }
}

/// Input guard run by every model before forecasting.
pub fn check_predict_inputs(
    context: &ContextSeries,
    prediction_length: u32,
    min_history: usize,
) -> Result<()> {
    if context.is_empty() {
        return Err(ForecastError::Validation(format!(
            "empty context series for item {}",
            context.item_id()
        )));
    }
    if context.len() < min_history {
        return Err(ForecastError::Validation(format!(
            "item {} has {} history days, model requires at least {}",
            context.item_id(),
            context.len(),
            min_history
        )));
    }
    if prediction_length == 0 || prediction_length > MAX_PREDICTION_LENGTH {
        return Err(ForecastError::Validation(format!(
            "prediction_length {} outside 1..={}",
            prediction_length, MAX_PREDICTION_LENGTH
        )));
    }
    Ok(())
}

/// Inverse standard normal CDF, Abramowitz & Stegun 26.2.23.
///
/// Good to ~4.5e-4 absolute error, which is plenty for approximating
/// forecast quantile bands.
pub fn quantile_normal(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    // the approximation is a hair off at the median; the band must sit
    // exactly on the mean there
    if p == 0.5 {
        return 0.0;
    }

    let t = if p < 0.5 {
        (-2.0 * p.ln()).sqrt()
    } else {
        (-2.0 * (1.0 - p).ln()).sqrt()
    };

    let c0 = 2.515517;
    let c1 = 0.802853;
    let c2 = 0.010328;
    let d1 = 1.432788;
    let d2 = 0.189269;
    let d3 = 0.001308;

    let result = t - (c0 + c1 * t + c2 * t * t) / (1.0 + d1 * t + d2 * t * t + d3 * t * t * t);

    if p < 0.5 {
        -result
    } else {
        result
    }
}

/// Build the quantile map for a constant normal approximation around
/// `mean` with spread `std`. Quantiles below the median are floored at 0,
/// since demand cannot be negative.
pub fn normal_quantiles(mean: f64, std: f64, levels: &[f64]) -> BTreeMap<String, f64> {
    levels
        .iter()
        .map(|&level| {
            let z = quantile_normal(level);
            let value = (mean + z * std).max(0.0);
            (quantile_key(level), value)
        })
        .collect()
}

/// Predictions for a flat forecast: the same point value and quantile
/// band on every day of the horizon. Shared by the statistical baselines.
pub(crate) fn constant_horizon(
    context: &ContextSeries,
    prediction_length: u32,
    point: f64,
    std: f64,
    quantile_levels: &[f64],
) -> Vec<Prediction> {
    let last = context
        .last_date()
        .expect("input guard rejects empty context");
    let quantiles = normal_quantiles(point, std, quantile_levels);
    (1..=prediction_length)
        .map(|day| Prediction {
            item_id: context.item_id().to_string(),
            date: last + chrono::Days::new(day as u64),
            point_forecast: point,
            quantiles: Some(quantiles.clone()),
        })
        .collect()
}
