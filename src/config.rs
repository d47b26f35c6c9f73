use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

const DEFAULT_MIN_HISTORY_DAYS: usize = 7;
const DEFAULT_PREDICTION_LENGTH: u32 = 30;
const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 7;
const DEFAULT_CROSTON_ALPHA: f64 = 0.1;
const DEFAULT_BASELINE_MODEL: &str = "moving_average";
const DEFAULT_FOUNDATION_MODEL: &str = "foundation";
const CONFIG_DIR: &str = "config";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Tunables for the forecasting core.
///
/// Loaded from `config/forecasting.toml` when present, overridable via
/// `FORECAST__`-prefixed environment variables
/// (e.g. `FORECAST__CROSTON_ALPHA=0.15`).
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ForecastingConfig {
    /// Minimum cleaned history (days) before an item is forecastable.
    #[serde(default = "default_min_history_days")]
    #[validate(range(min = 1, max = 365))]
    pub min_history_days: usize,

    /// Horizon used when the caller does not specify one.
    #[serde(default = "default_prediction_length")]
    #[validate(range(min = 1, max = 365))]
    pub default_prediction_length: u32,

    /// Window for the moving-average baseline.
    #[serde(default = "default_moving_average_window")]
    #[validate(range(min = 1, max = 90))]
    pub moving_average_window: usize,

    /// Smoothing constant for Croston's method.
    #[serde(default = "default_croston_alpha")]
    #[validate(range(min = 0.01, max = 0.99))]
    pub croston_alpha: f64,

    /// Statistical baseline run alongside the routed method.
    #[serde(default = "default_baseline_model")]
    pub baseline_model: String,

    /// Model id the classifier routes high-value regular items to.
    #[serde(default = "default_foundation_model")]
    pub foundation_model: String,

    /// ADI at or below which demand counts as regular.
    #[serde(default = "default_adi_regular_threshold")]
    pub adi_regular_threshold: f64,

    /// CV² above which intermittent demand counts as lumpy.
    #[serde(default = "default_lumpy_cv2_threshold")]
    pub lumpy_cv2_threshold: f64,
}

impl Default for ForecastingConfig {
    fn default() -> Self {
        Self {
            min_history_days: DEFAULT_MIN_HISTORY_DAYS,
            default_prediction_length: DEFAULT_PREDICTION_LENGTH,
            moving_average_window: DEFAULT_MOVING_AVERAGE_WINDOW,
            croston_alpha: DEFAULT_CROSTON_ALPHA,
            baseline_model: DEFAULT_BASELINE_MODEL.to_string(),
            foundation_model: DEFAULT_FOUNDATION_MODEL.to_string(),
            adi_regular_threshold: 1.32,
            lumpy_cv2_threshold: 0.49,
        }
    }
}

impl ForecastingConfig {
    /// Layered load: defaults, then the optional config file under
    /// `config/`, then environment overrides; validated before use.
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_from(Path::new(CONFIG_DIR))
    }

    /// Same layering, reading the config file from an explicit directory.
    pub fn load_from(dir: &Path) -> Result<Self, ConfigLoadError> {
        let mut builder = Config::builder();

        let file = dir.join("forecasting.toml");
        if file.exists() {
            info!(path = %file.display(), "loading forecasting config file");
            builder = builder.add_source(File::from(file));
        }

        builder = builder.add_source(
            Environment::with_prefix("FORECAST")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: Self = builder
            .build()?
            .try_deserialize::<PartialConfig>()?
            .into();
        loaded.validate()?;
        Ok(loaded)
    }
}

/// All-optional mirror so a config file may set any subset of keys.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    min_history_days: Option<usize>,
    default_prediction_length: Option<u32>,
    moving_average_window: Option<usize>,
    croston_alpha: Option<f64>,
    baseline_model: Option<String>,
    foundation_model: Option<String>,
    adi_regular_threshold: Option<f64>,
    lumpy_cv2_threshold: Option<f64>,
}

impl From<PartialConfig> for ForecastingConfig {
    fn from(partial: PartialConfig) -> Self {
        let defaults = ForecastingConfig::default();
        Self {
            min_history_days: partial.min_history_days.unwrap_or(defaults.min_history_days),
            default_prediction_length: partial
                .default_prediction_length
                .unwrap_or(defaults.default_prediction_length),
            moving_average_window: partial
                .moving_average_window
                .unwrap_or(defaults.moving_average_window),
            croston_alpha: partial.croston_alpha.unwrap_or(defaults.croston_alpha),
            baseline_model: partial.baseline_model.unwrap_or(defaults.baseline_model),
            foundation_model: partial
                .foundation_model
                .unwrap_or(defaults.foundation_model),
            adi_regular_threshold: partial
                .adi_regular_threshold
                .unwrap_or(defaults.adi_regular_threshold),
            lumpy_cv2_threshold: partial
                .lumpy_cv2_threshold
                .unwrap_or(defaults.lumpy_cv2_threshold),
        }
    }
}

fn default_min_history_days() -> usize {
    DEFAULT_MIN_HISTORY_DAYS
}
fn default_prediction_length() -> u32 {
    DEFAULT_PREDICTION_LENGTH
}
fn default_moving_average_window() -> usize {
    DEFAULT_MOVING_AVERAGE_WINDOW
}
fn default_croston_alpha() -> f64 {
    DEFAULT_CROSTON_ALPHA
}
fn default_baseline_model() -> String {
    DEFAULT_BASELINE_MODEL.to_string()
}
fn default_foundation_model() -> String {
    DEFAULT_FOUNDATION_MODEL.to_string()
}
fn default_adi_regular_threshold() -> f64 {
    1.32
}
fn default_lumpy_cv2_threshold() -> f64 {
    0.49
}
