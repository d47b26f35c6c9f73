use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::Result;
use crate::repositories::{ForecastStore, ResultFilter};

/// Current stock situation of one item, supplied by the inventory
/// system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockPosition {
    pub item_id: String,
    pub on_hand: f64,
    pub lead_time_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StockoutRisk {
    Low,
    Medium,
    High,
    Critical,
}

/// Inventory health derived from a committed forecast run: how long the
/// current stock lasts against forecast demand and whether to reorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryHealth {
    pub item_id: String,
    pub avg_daily_demand: f64,
    /// on-hand stock divided by average forecast daily demand; infinite
    /// when no demand is forecast.
    pub days_of_inventory_remaining: f64,
    pub stockout_risk: StockoutRisk,
    pub reorder_recommended: bool,
    pub reorder_quantity: f64,
}

/// Derives days-of-inventory-remaining, stockout risk and reorder
/// recommendations for the dashboard and ordering workflow.
pub struct InventoryHealthService {
    store: Arc<dyn ForecastStore>,
}

impl InventoryHealthService {
    pub fn new(store: Arc<dyn ForecastStore>) -> Self {
        Self { store }
    }

    /// Assess each position against the forecast rows of one run and
    /// method. `cover_days` is the buffer beyond lead time a reorder
    /// should cover.
    #[instrument(skip(self, positions), fields(run_id = %forecast_run_id, positions = positions.len()))]
    pub async fn assess(
        &self,
        client_id: Uuid,
        forecast_run_id: Uuid,
        method: &str,
        positions: &[StockPosition],
        cover_days: u32,
    ) -> Result<Vec<InventoryHealth>> {
        let mut out = Vec::with_capacity(positions.len());
        for position in positions {
            let filter = ResultFilter {
                client_id: Some(client_id),
                item_id: Some(position.item_id.clone()),
                method: Some(method.to_string()),
                forecast_run_id: Some(forecast_run_id),
                ..Default::default()
            };
            let rows = self.store.query_results(&filter).await?;
            out.push(Self::assess_position(position, &rows, cover_days));
        }
        Ok(out)
    }

    fn assess_position(
        position: &StockPosition,
        rows: &[crate::models::ForecastResult],
        cover_days: u32,
    ) -> InventoryHealth {
        let avg_daily_demand = if rows.is_empty() {
            0.0
        } else {
            rows.iter().map(|r| r.point_forecast).sum::<f64>() / rows.len() as f64
        };

        let days_remaining = if avg_daily_demand > 0.0 {
            position.on_hand / avg_daily_demand
        } else {
            f64::INFINITY
        };

        let lead = position.lead_time_days as f64;
        let stockout_risk = if avg_daily_demand <= 0.0 {
            StockoutRisk::Low
        } else if days_remaining < lead {
            StockoutRisk::Critical
        } else if days_remaining < lead * 1.5 {
            StockoutRisk::High
        } else if days_remaining < lead * 2.5 {
            StockoutRisk::Medium
        } else {
            StockoutRisk::Low
        };

        let horizon = lead + cover_days as f64;
        let reorder_quantity = (avg_daily_demand * horizon - position.on_hand).max(0.0);
        let reorder_recommended = reorder_quantity > 0.0;

        InventoryHealth {
            item_id: position.item_id.clone(),
            avg_daily_demand,
            days_of_inventory_remaining: days_remaining,
            stockout_risk,
            reorder_recommended,
            reorder_quantity,
        }
    }
}
