use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One raw row of daily sales history, as supplied by a history reader.
///
/// Dates arrive as strings because upstream connectors deliver them that
/// way; the data validator owns parsing and rejection of unparseable
/// values. Raw targets may be negative (returns booked as sales, data
/// defects) and may be NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesRecord {
    pub item_id: String,
    pub date: String,
    pub target: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub covariates: Option<HashMap<String, f64>>,
}

impl SalesRecord {
    pub fn new(item_id: impl Into<String>, date: impl Into<String>, target: f64) -> Self {
        Self {
            item_id: item_id.into(),
            date: date.into(),
            target,
            covariates: None,
        }
    }

    pub fn with_covariate(mut self, key: impl Into<String>, value: f64) -> Self {
        self.covariates
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

/// One day of cleaned demand for one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub item_id: String,
    pub date: NaiveDate,
    pub target: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub covariates: Option<HashMap<String, f64>>,
}

/// A cleaned, date-ordered daily demand series for one item.
///
/// Produced only by the data validator; downstream code may assume the
/// series is sorted, free of duplicate dates and NaN targets, and that
/// every target is >= 0. When the validator ran with date filling the
/// series is also gap-free over its span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSeries {
    item_id: String,
    points: Vec<TimeSeriesPoint>,
}

impl ContextSeries {
    pub(crate) fn new(item_id: String, points: Vec<TimeSeriesPoint>) -> Self {
        Self { item_id, points }
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Target values in date order.
    pub fn targets(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.target).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Number of days with nonzero demand.
    pub fn nonzero_days(&self) -> usize {
        self.points.iter().filter(|p| p.target > 0.0).count()
    }

    /// Total demand over the whole series.
    pub fn total_demand(&self) -> f64 {
        self.points.iter().map(|p| p.target).sum()
    }

    /// Revenue proxy: demand times the `unit_price` covariate where
    /// present, demand alone otherwise.
    pub fn revenue(&self) -> f64 {
        self.points
            .iter()
            .map(|p| {
                let price = p
                    .covariates
                    .as_ref()
                    .and_then(|c| c.get("unit_price"))
                    .copied()
                    .unwrap_or(1.0);
                p.target * price
            })
            .sum()
    }
}

/// Mean of a slice; NaN when empty.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; NaN when empty.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
