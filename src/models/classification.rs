use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Value-based segmentation by cumulative revenue share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum AbcClass {
    A,
    B,
    C,
}

/// Variability-based segmentation by coefficient of variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum XyzClass {
    X,
    Y,
    Z,
}

/// Demand pattern derived from ADI and CV².
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DemandPattern {
    Regular,
    Intermittent,
    Lumpy,
}

/// Classification of one SKU for one client.
///
/// Upserted on the (client_id, item_id) key; each forecast run that
/// classifies the item supersedes the previous row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuClassification {
    pub client_id: Uuid,
    pub item_id: String,
    pub abc_class: AbcClass,
    pub xyz_class: XyzClass,
    pub demand_pattern: DemandPattern,
    /// std/mean of the cleaned series; infinite when mean is zero.
    pub coefficient_of_variation: f64,
    /// total days / nonzero-demand days; infinite when demand never occurs.
    pub average_demand_interval: f64,
    /// This item's share of the batch revenue, in percent.
    pub revenue_contribution: f64,
    /// 0..=1, higher means easier to forecast.
    pub forecastability_score: f64,
    pub recommended_method: String,
    /// Expected MAPE band (min, max) in percent for the recommended method.
    pub expected_mape_range: (f64, f64),
    pub warnings: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub classified_at: DateTime<Utc>,
}
