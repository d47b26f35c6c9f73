//! Demand Forecasting Core
//!
//! The forecasting and SKU-classification subsystem of a multi-tenant
//! retail inventory backend: validates daily sales series, classifies
//! SKUs (ABC-XYZ, demand pattern), routes each batch to an appropriate
//! forecasting method, executes the models, and scores persisted
//! forecasts against backfilled actuals.
//!
//! The surrounding system (HTTP API, auth, SQL persistence, ETL) talks
//! to this crate through [`repositories::HistoryReader`] and
//! [`repositories::ForecastStore`], and drives it via
//! [`services::ForecastOrchestrator::generate_forecast`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod events;
pub mod ml;
pub mod models;
pub mod repositories;
pub mod services;

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::ForecastingConfig;
use crate::errors::Result;
use crate::ml::{ForecastModel, ForecastPipeline, ModelFactory};
use crate::services::SkuClassifier;

pub use crate::errors::ForecastError;

/// Process-scoped state shared by all orchestration calls: the model
/// registry, the per-process model instance cache, and the classifier.
/// Created once at startup and handed to the orchestrator; never a
/// module-level global.
pub struct OrchestratorState {
    config: ForecastingConfig,
    factory: ModelFactory,
    classifier: SkuClassifier,
    models: DashMap<String, Arc<dyn ForecastModel>>,
}

impl OrchestratorState {
    /// State with the statistical baselines only.
    pub fn new(config: ForecastingConfig) -> Self {
        let factory = ModelFactory::new(&config);
        Self::from_factory(config, factory)
    }

    /// State with the foundation model backed by the given pipeline.
    pub fn with_pipeline(config: ForecastingConfig, pipeline: Arc<dyn ForecastPipeline>) -> Self {
        let factory = ModelFactory::new(&config).with_pipeline(pipeline);
        Self::from_factory(config, factory)
    }

    fn from_factory(config: ForecastingConfig, factory: ModelFactory) -> Self {
        let classifier = SkuClassifier::new(config.clone());
        Self {
            config,
            factory,
            classifier,
            models: DashMap::new(),
        }
    }

    pub fn config(&self) -> &ForecastingConfig {
        &self.config
    }

    pub fn factory(&self) -> &ModelFactory {
        &self.factory
    }

    /// Register additional models before sharing the state.
    pub fn factory_mut(&mut self) -> &mut ModelFactory {
        &mut self.factory
    }

    pub fn classifier(&self) -> &SkuClassifier {
        &self.classifier
    }

    /// Cached model instance for the id, created on first use. Heavy
    /// models keep their own single-flight initialization, so sharing
    /// one instance per process is what makes lazy loading happen once.
    pub fn model(&self, id: &str) -> Result<Arc<dyn ForecastModel>> {
        if let Some(model) = self.models.get(id) {
            return Ok(model.clone());
        }
        let created = self.factory.create_model(id)?;
        let model = self.models.entry(id.to_string()).or_insert(created).clone();
        Ok(model)
    }
}

/// Install a tracing subscriber honoring `RUST_LOG`, for binaries and
/// integration tests embedding the core.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_cache_returns_same_instance() {
        let state = OrchestratorState::new(ForecastingConfig::default());
        let first = state.model("sba").unwrap();
        let second = state.model("sba").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn unknown_model_is_configuration_error() {
        let state = OrchestratorState::new(ForecastingConfig::default());
        assert!(matches!(
            state.model("nope"),
            Err(ForecastError::Configuration(_))
        ));
    }
}
