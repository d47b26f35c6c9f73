use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{mean, std_dev, ContextSeries, Prediction};

use super::{check_predict_inputs, constant_horizon, ForecastModel, ModelInfo};

pub const MODEL_ID: &str = "moving_average";

/// Moving-average baseline: forecasts the mean of the last `window`
/// observations, constant across the horizon. The default statistical
/// comparison point for every run.
#[derive(Debug, Clone)]
pub struct MovingAverageModel {
    window: usize,
    min_history: usize,
}

impl MovingAverageModel {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            min_history: 7,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for MovingAverageModel {
    fn default() -> Self {
        Self::new(7)
    }
}

#[async_trait]
impl ForecastModel for MovingAverageModel {
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
        let tail_start = targets.len().saturating_sub(self.window);
        let tail = &targets[tail_start..];
        let point = mean(tail);
        let std = std_dev(tail);

        Ok(constant_horizon(
            context,
            prediction_length,
            point,
            std,
            quantile_levels,
        ))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            id: MODEL_ID.to_string(),
            name: "Moving Average".to_string(),
            description: format!("Mean of the last {} days, flat over the horizon", self.window),
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
    async fn forecasts_window_mean() {
        // 10 days, last 7 are 14.0
        let mut targets = vec![100.0, 100.0, 100.0];
        targets.extend(std::iter::repeat(14.0).take(7));
        let ctx = series("SKU-1", &targets);

        let model = MovingAverageModel::default();
        let preds = model
            .predict(&ctx, 5, &DEFAULT_QUANTILE_LEVELS)
            .await
            .unwrap();

        assert_eq!(preds.len(), 5);
        for p in &preds {
            assert!((p.point_forecast - 14.0).abs() < 1e-9);
            // constant window -> zero std -> all quantiles collapse
            assert_eq!(p.quantile("p10"), Some(14.0));
            assert_eq!(p.quantile("p90"), Some(14.0));
        }
    }

    #[tokio::test]
    async fn forecast_dates_follow_context() {
        let ctx = series("SKU-1", &[3.0; 10]);
        let model = MovingAverageModel::default();
        let preds = model
            .predict(&ctx, 3, &DEFAULT_QUANTILE_LEVELS)
            .await
            .unwrap();
        let last = ctx.last_date().unwrap();
        assert_eq!(preds[0].date, last + chrono::Days::new(1));
        assert_eq!(preds[2].date, last + chrono::Days::new(3));
    }

    #[tokio::test]
    async fn rejects_insufficient_history() {
        let ctx = series("SKU-1", &[1.0; 4]);
        let model = MovingAverageModel::default();
        assert!(model
            .predict(&ctx, 5, &DEFAULT_QUANTILE_LEVELS)
            .await
            .is_err());
    }
}
