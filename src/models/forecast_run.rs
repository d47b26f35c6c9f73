use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Lifecycle of a forecast run: `Pending` until the orchestrator commits
/// exactly one terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Completed,
    Failed,
}

/// One orchestration call: which items were requested, which model was
/// asked for, and how the run ended. Owns its `ForecastResult` rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRun {
    pub id: Uuid,
    pub client_id: Uuid,
    pub user_id: Option<Uuid>,
    pub primary_model: String,
    pub prediction_length: u32,
    pub item_ids: Vec<String>,
    pub status: RunStatus,
    pub recommended_method: Option<String>,
    pub error_message: Option<String>,
    /// Per-method attempt/skip counts and skip reasons; diagnostics live
    /// here rather than in `error_message`.
    pub audit: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ForecastRun {
    pub fn new(
        client_id: Uuid,
        user_id: Option<Uuid>,
        primary_model: impl Into<String>,
        prediction_length: u32,
        item_ids: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            user_id,
            primary_model: primary_model.into(),
            prediction_length,
            item_ids,
            status: RunStatus::Pending,
            recommended_method: None,
            error_message: None,
            audit: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != RunStatus::Pending
    }

    pub(crate) fn complete(&mut self, recommended_method: String) {
        debug_assert!(!self.is_terminal());
        self.status = RunStatus::Completed;
        self.recommended_method = Some(recommended_method);
        self.completed_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        debug_assert!(!self.is_terminal());
        self.status = RunStatus::Failed;
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
    }

    /// Overrides an in-memory `Completed` that could not be persisted or
    /// committed; the stored status must never read `Completed` for a run
    /// whose results are not queryable.
    pub(crate) fn abort(&mut self, message: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
    }
}

/// One forecasted day for one item under one method, owned by a run.
///
/// Immutable once written except for `actual_value`, which a backfill
/// step sets exactly once when the real demand for that day is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    pub forecast_run_id: Uuid,
    pub client_id: Uuid,
    pub item_id: String,
    pub method: String,
    pub date: NaiveDate,
    /// 1-based day offset into the horizon.
    pub horizon_day: u32,
    pub point_forecast: f64,
    pub p10: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub actual_value: Option<f64>,
}
