use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{std_dev, ContextSeries, Prediction};

use super::{check_predict_inputs, constant_horizon, ForecastModel, ModelInfo};

pub const MODEL_ID: &str = "croston";

/// Classic Croston's method for intermittent demand.
///
/// Exponentially smooths the nonzero demand sizes and the inter-demand
/// intervals separately, then forecasts the ratio of the two smoothed
/// levels. The routing table sends intermittent (but not lumpy) items
/// here.
#[derive(Debug, Clone)]
pub struct CrostonModel {
    alpha: f64,
    min_history: usize,
}

impl CrostonModel {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.01, 0.99),
            min_history: 7,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Split the series into nonzero demand sizes and the gaps between
    /// them (in days, first demand has no preceding gap).
    fn extract_demands(values: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let mut demands = Vec::new();
        let mut intervals = Vec::new();
        let mut last_idx: Option<usize> = None;

        for (i, &v) in values.iter().enumerate() {
            if v > 0.0 {
                demands.push(v);
                if let Some(last) = last_idx {
                    intervals.push((i - last) as f64);
                }
                last_idx = Some(i);
            }
        }
        (demands, intervals)
    }

    /// Single exponential smoothing, returning the final level.
    fn smooth(values: &[f64], alpha: f64, default: f64) -> f64 {
        let mut iter = values.iter();
        let Some(&first) = iter.next() else {
            return default;
        };
        let mut level = first;
        for &v in iter {
            level = alpha * v + (1.0 - alpha) * level;
        }
        level
    }

    fn rate(&self, targets: &[f64]) -> (f64, Vec<f64>) {
        let (demands, intervals) = Self::extract_demands(targets);
        if demands.is_empty() {
            return (0.0, demands);
        }
        let demand_level = Self::smooth(&demands, self.alpha, 0.0);
        let interval_level = Self::smooth(&intervals, self.alpha, 1.0).max(1.0);
        ((demand_level / interval_level).max(0.0), demands)
    }
}

impl Default for CrostonModel {
    fn default() -> Self {
        Self::new(0.1)
    }
}

#[async_trait]
impl ForecastModel for CrostonModel {
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
        let (rate, demands) = self.rate(&targets);
        let std = if demands.len() > 1 {
            std_dev(&demands)
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
            name: "Croston".to_string(),
            description: format!(
                "Smoothed demand-size over smoothed interval, alpha={}",
                self.alpha
            ),
            min_history: self.min_history,
            supports_quantiles: true,
        }
    }
}
