#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use demand_forecast_core::config::ForecastingConfig;
use demand_forecast_core::errors::Result;
use demand_forecast_core::events::{Event, EventSender};
use demand_forecast_core::ml::{ForecastPipeline, PipelineRow, PipelineSeries};
use demand_forecast_core::models::SalesRecord;
use demand_forecast_core::repositories::InMemoryForecastStore;
use demand_forecast_core::services::{ForecastOrchestrator, ForecastRequest};
use demand_forecast_core::OrchestratorState;

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

/// Daily records for an item beginning 2025-01-01.
pub fn history(item_id: &str, targets: &[f64]) -> Vec<SalesRecord> {
    targets
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let date = start_date() + chrono::Days::new(i as u64);
            SalesRecord::new(item_id, date.format("%Y-%m-%d").to_string(), t)
        })
        .collect()
}

/// Deterministic stand-in for the pretrained pipeline: forecasts the
/// mean of the context values with a fixed +-20% band.
pub struct MeanPipeline;

#[async_trait]
impl ForecastPipeline for MeanPipeline {
    async fn load(&self) -> Result<()> {
        Ok(())
    }

    async fn forecast(
        &self,
        series: PipelineSeries,
        prediction_length: u32,
        _quantile_levels: &[f64],
    ) -> Result<Vec<PipelineRow>> {
        let mean = series.values.iter().sum::<f64>() / series.values.len().max(1) as f64;
        let last = *series.dates.last().unwrap();
        Ok((1..=prediction_length)
            .map(|day| {
                let mut columns = HashMap::new();
                columns.insert("mean".to_string(), mean);
                columns.insert("0.1".to_string(), (mean * 0.8).max(0.0));
                columns.insert("0.5".to_string(), mean);
                columns.insert("0.9".to_string(), mean * 1.2);
                PipelineRow {
                    date: last + chrono::Days::new(day as u64),
                    columns,
                }
            })
            .collect())
    }

    fn name(&self) -> &str {
        "mean-pipeline"
    }
}

pub struct TestHarness {
    pub client_id: Uuid,
    pub store: Arc<InMemoryForecastStore>,
    pub orchestrator: ForecastOrchestrator,
    pub events: tokio::sync::mpsc::Receiver<Event>,
}

pub fn harness() -> TestHarness {
    let client_id = Uuid::new_v4();
    let store = Arc::new(InMemoryForecastStore::new());
    let state = Arc::new(OrchestratorState::with_pipeline(
        ForecastingConfig::default(),
        Arc::new(MeanPipeline),
    ));
    let (sender, events) = EventSender::channel(64);
    let orchestrator = ForecastOrchestrator::new(store.clone(), store.clone(), state, sender);
    TestHarness {
        client_id,
        store,
        orchestrator,
        events,
    }
}

pub fn request(client_id: Uuid, item_ids: &[&str], prediction_length: u32) -> ForecastRequest {
    ForecastRequest {
        client_id,
        user_id: None,
        item_ids: item_ids.iter().map(|s| s.to_string()).collect(),
        prediction_length,
        primary_model: "moving_average".to_string(),
        include_baseline: true,
        training_end_date: None,
    }
}
