use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{mean, std_dev, ContextSeries, Prediction};

use super::{check_predict_inputs, constant_horizon, ForecastModel, ModelInfo};

pub const MODEL_ID: &str = "min_max";

/// Full-history mean baseline for low-value, high-variability items
/// where simplicity beats accuracy (the C-Z cell of the routing table).
#[derive(Debug, Clone)]
pub struct MinMaxModel {
    min_history: usize,
}

impl MinMaxModel {
    pub fn new() -> Self {
        Self { min_history: 5 }
    }
}

impl Default for MinMaxModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ForecastModel for MinMaxModel {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn predict(
        &self,
        context: &ContextSeries,
        prediction_length: u32,
        quantile_levels: &[f64],
    ) -> Result<Vec<Prediction>> {
        check_predict_inputs(context, prediction_length, self.min_history.max(1))?;

        let targets = context.targets();
        let point = mean(&targets);
        let std = std_dev(&targets);

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
            name: "Min/Max".to_string(),
            description: "Full-history mean with a normal-approximation band".to_string(),
            min_history: self.min_history.max(1),
            supports_quantiles: true,
        }
    }
}
