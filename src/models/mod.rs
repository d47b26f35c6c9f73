//! Domain data types shared across the forecasting core.

pub mod classification;
pub mod forecast_run;
pub mod prediction;
pub mod time_series;

pub use classification::{AbcClass, DemandPattern, SkuClassification, XyzClass};
pub use forecast_run::{ForecastResult, ForecastRun, RunStatus};
pub use prediction::{quantile_key, Prediction};
pub use time_series::{mean, std_dev, ContextSeries, SalesRecord, TimeSeriesPoint};
