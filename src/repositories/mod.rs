//! Storage seams the forecasting core consumes. Real implementations
//! (SQL, warehouse exports) live with the surrounding system; the core
//! only depends on these traits. An in-memory implementation is provided
//! for tests and embedding.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{ForecastResult, ForecastRun, SalesRecord, SkuClassification};

pub mod memory;

pub use memory::InMemoryForecastStore;

/// Read access to per-item daily sales history.
#[async_trait]
pub trait HistoryReader: Send + Sync {
    /// Fetch history rows for the given items, optionally bounded by an
    /// inclusive date range. `end` is the backtesting cutoff. Items with
    /// no rows simply do not appear in the result; that is a valid
    /// "no history" answer, not an error.
    async fn fetch_historical_data(
        &self,
        client_id: Uuid,
        item_ids: &[String],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<SalesRecord>>;
}

/// Filter for reading persisted forecast rows.
#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    pub client_id: Option<Uuid>,
    pub item_id: Option<String>,
    pub method: Option<String>,
    pub forecast_run_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Only rows whose actual value has been backfilled.
    pub with_actuals_only: bool,
}

/// Write/read access to runs, results and classifications.
///
/// Result rows written for a pending run stay invisible to readers until
/// `commit_run`; pollers treat a pending run as "results not yet
/// queryable".
#[async_trait]
pub trait ForecastStore: Send + Sync {
    async fn create_run(&self, run: &ForecastRun) -> Result<()>;

    async fn update_run(&self, run: &ForecastRun) -> Result<()>;

    async fn get_run(&self, run_id: Uuid) -> Result<Option<ForecastRun>>;

    /// Buffer result rows for a pending run.
    async fn insert_results(&self, rows: Vec<ForecastResult>) -> Result<()>;

    /// Make all buffered rows of the run visible to readers.
    async fn commit_run(&self, run_id: Uuid) -> Result<()>;

    /// Delete the run and every result row it owns.
    async fn delete_run(&self, run_id: Uuid) -> Result<()>;

    async fn query_results(&self, filter: &ResultFilter) -> Result<Vec<ForecastResult>>;

    /// Insert or replace the classification for its (client, item) key.
    async fn upsert_classification(&self, classification: &SkuClassification) -> Result<()>;

    async fn get_classification(
        &self,
        client_id: Uuid,
        item_id: &str,
    ) -> Result<Option<SkuClassification>>;

    /// Backfill the observed demand for one (item, date) across all
    /// methods, touching only rows whose actual is still unset. Returns
    /// the number of rows updated; a repeat call is a no-op.
    async fn set_actual_value(
        &self,
        client_id: Uuid,
        item_id: &str,
        date: NaiveDate,
        value: f64,
    ) -> Result<u64>;
}
