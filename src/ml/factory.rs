use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::ForecastingConfig;
use crate::errors::{ForecastError, Result};

use super::{
    croston, foundation, min_max, moving_average, sba, CrostonModel, ForecastModel,
    ForecastPipeline, FoundationModel, MinMaxModel, MovingAverageModel, SbaModel,
};

type ModelConstructor = Arc<dyn Fn() -> Arc<dyn ForecastModel> + Send + Sync>;

/// Maps model ids to constructors. Built once at startup and owned by the
/// process-scoped orchestrator state; model instances themselves are
/// cached separately so constructors stay cheap.
pub struct ModelFactory {
    constructors: HashMap<String, ModelConstructor>,
}

impl ModelFactory {
    /// Factory with the statistical baselines registered. The foundation
    /// model is only available once a pipeline is attached with
    /// [`ModelFactory::with_pipeline`].
    pub fn new(config: &ForecastingConfig) -> Self {
        let mut factory = Self {
            constructors: HashMap::new(),
        };

        let window = config.moving_average_window;
        factory
            .register_model(moving_average::MODEL_ID, move || {
                Arc::new(MovingAverageModel::new(window))
            })
            .expect("builtin registration");

        factory
            .register_model(min_max::MODEL_ID, || Arc::new(MinMaxModel::new()))
            .expect("builtin registration");

        factory
            .register_model(sba::MODEL_ID, || Arc::new(SbaModel::new()))
            .expect("builtin registration");

        let alpha = config.croston_alpha;
        factory
            .register_model(croston::MODEL_ID, move || {
                Arc::new(CrostonModel::new(alpha))
            })
            .expect("builtin registration");

        factory
    }

    /// Attach the external pretrained pipeline, enabling the foundation
    /// model id.
    pub fn with_pipeline(mut self, pipeline: Arc<dyn ForecastPipeline>) -> Self {
        self.register_model(foundation::MODEL_ID, move || {
            Arc::new(FoundationModel::new(pipeline.clone()))
        })
        .expect("builtin registration");
        self
    }

    /// Register a model constructor under an id.
    ///
    /// The constructed model is probed once so misregistrations (id
    /// mismatch, unusable min-history) fail here rather than mid-run.
    pub fn register_model<F>(&mut self, id: &str, constructor: F) -> Result<()>
    where
        F: Fn() -> Arc<dyn ForecastModel> + Send + Sync + 'static,
    {
        if id.trim().is_empty() {
            return Err(ForecastError::Configuration(
                "model id must not be empty".into(),
            ));
        }

        let probe = constructor();
        let info = probe.model_info();
        if info.id != id {
            return Err(ForecastError::Configuration(format!(
                "model registered as '{}' reports id '{}'",
                id, info.id
            )));
        }
        if info.min_history == 0 {
            return Err(ForecastError::Configuration(format!(
                "model '{}' reports min_history of 0",
                id
            )));
        }

        debug!(model_id = id, "registered forecast model");
        self.constructors.insert(id.to_string(), Arc::new(constructor));
        Ok(())
    }

    /// Create a fresh instance of the model with the given id.
    pub fn create_model(&self, id: &str) -> Result<Arc<dyn ForecastModel>> {
        match self.constructors.get(id) {
            Some(constructor) => Ok(constructor()),
            None => {
                let mut available = self.list_models();
                available.sort();
                Err(ForecastError::Configuration(format!(
                    "unknown model id '{}', available: [{}]",
                    id,
                    available.join(", ")
                )))
            }
        }
    }

    /// Fail fast with the same descriptive error as `create_model` when
    /// the id is not registered.
    pub fn ensure_registered(&self, id: &str) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            self.create_model(id).map(|_| ())
        }
    }

    pub fn list_models(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }
}
