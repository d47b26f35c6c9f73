use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One forecasted day for one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub item_id: String,
    pub date: NaiveDate,
    pub point_forecast: f64,
    /// Quantile forecasts keyed `"p10"`, `"p50"`, `"p90"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantiles: Option<BTreeMap<String, f64>>,
}

impl Prediction {
    pub fn quantile(&self, key: &str) -> Option<f64> {
        self.quantiles.as_ref().and_then(|q| q.get(key)).copied()
    }
}

/// Render a quantile level as the persisted column key, e.g. 0.1 -> "p10".
pub fn quantile_key(level: f64) -> String {
    format!("p{}", (level * 100.0).round() as u32)
}
