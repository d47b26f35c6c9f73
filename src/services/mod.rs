// Forecasting core services

pub mod classifier;
pub mod inventory_health;
pub mod orchestrator;
pub mod quality;
pub mod validator;

pub use classifier::SkuClassifier;
pub use inventory_health::{InventoryHealth, InventoryHealthService, StockPosition, StockoutRisk};
pub use orchestrator::{ForecastOrchestrator, ForecastRequest};
pub use quality::{QualityCalculator, QualityMetrics, QualityScope};
pub use validator::{
    DataValidator, FillnaStrategy, PredictionCheck, ValidationOptions, ValidationOutcome,
    ValidationReport,
};
