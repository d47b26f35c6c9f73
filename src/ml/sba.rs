use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{mean, std_dev, ContextSeries, Prediction};

use super::{check_predict_inputs, constant_horizon, ForecastModel, ModelInfo};

pub const MODEL_ID: &str = "sba";

/// Syntetos-Boylan Approximation for lumpy demand.
///
/// With average demand interval `p = periods / nonzero periods` and mean
/// nonzero demand size `z`, the per-day forecast is `(1 - p/2) * (z / p)`,
/// floored at 0. A series with no demand at all forecasts 0, never NaN.
#[derive(Debug, Clone)]
pub struct SbaModel {
    min_history: usize,
}

impl SbaModel {
    pub fn new() -> Self {
        Self { min_history: 7 }
    }

    fn sba_rate(targets: &[f64]) -> (f64, Vec<f64>) {
        let nonzero: Vec<f64> = targets.iter().copied().filter(|&v| v > 0.0).collect();
        if nonzero.is_empty() {
            return (0.0, nonzero);
        }
        let p = targets.len() as f64 / nonzero.len() as f64;
        if p <= 0.0 || !p.is_finite() {
            return (0.0, nonzero);
        }
        let z = mean(&nonzero);
        let rate = ((1.0 - p / 2.0) * (z / p)).max(0.0);
        (rate, nonzero)
    }
}

impl Default for SbaModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ForecastModel for SbaModel {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn predict(
        &self,
        context: &ContextSeries,
        prediction_length: u32,
        quantile_levels: &[f64],
    ) -> Result<Vec<Prediction>> {
        check_predict_inputs(context, prediction_length, self.min_history)?;

        let targets = context.targets();
        let (rate, nonzero) = Self::sba_rate(&targets);
        // spread comes from the nonzero demand sizes only
        let std = if nonzero.len() > 1 {
            std_dev(&nonzero)
        } else {
            0.0
        };

        Ok(constant_horizon(
            context,
            prediction_length,
            rate,
            std,
            quantile_levels,
        ))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            id: MODEL_ID.to_string(),
            name: "Syntetos-Boylan Approximation".to_string(),
            description: "Bias-corrected Croston variant for lumpy demand".to_string(),
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

    #[tokio::test]
    async fn zero_demand_series_forecasts_zero() {
        let ctx = series("SKU-0", &[0.0; 14]);
        let model = SbaModel::new();
        let preds = model
            .predict(&ctx, 7, &DEFAULT_QUANTILE_LEVELS)
            .await
            .unwrap();
        assert_eq!(preds.len(), 7);
        for p in &preds {
            assert_eq!(p.point_forecast, 0.0);
            assert!(p.point_forecast.is_finite());
        }
    }

    #[tokio::test]
    async fn matches_closed_form() {
        // 10 periods, demand of 6 on every other day: p = 2, z = 6
        // forecast = (1 - 2/2 * 0.5) ... = (1 - p/2)*(z/p) = 0 * 3 = 0
        let ctx = series("SKU-1", &[6.0, 0.0, 6.0, 0.0, 6.0, 0.0, 6.0, 0.0, 6.0, 0.0]);
        let model = SbaModel::new();
        let preds = model
            .predict(&ctx, 1, &DEFAULT_QUANTILE_LEVELS)
            .await
            .unwrap();
        // p = 10/5 = 2 -> bias factor (1 - 1) = 0, floored at 0
        assert_eq!(preds[0].point_forecast, 0.0);
    }

    #[tokio::test]
    async fn sparse_demand_positive_rate() {
        // 12 periods, 8 nonzero: p = 1.5, z = 4 -> (1-0.75)*(4/1.5) = 0.6667
        let ctx = series(
            "SKU-2",
            &[4.0, 4.0, 0.0, 4.0, 4.0, 0.0, 4.0, 4.0, 0.0, 4.0, 4.0, 0.0],
        );
        let model = SbaModel::new();
        let preds = model
            .predict(&ctx, 1, &DEFAULT_QUANTILE_LEVELS)
            .await
            .unwrap();
        let expected = (1.0 - 1.5 / 2.0) * (4.0 / 1.5);
        assert!((preds[0].point_forecast - expected).abs() < 1e-9);
    }
}
