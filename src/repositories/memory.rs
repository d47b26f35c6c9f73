use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{ForecastError, Result};
use crate::models::{ForecastResult, ForecastRun, SalesRecord, SkuClassification};

use super::{ForecastStore, HistoryReader, ResultFilter};

/// In-memory store: reference implementation of the storage seams, used
/// by tests and by embedders that do not need durable persistence.
///
/// Rows inserted for a run are buffered and only become readable after
/// `commit_run`, matching the visibility rule real implementations must
/// follow.
#[derive(Default)]
pub struct InMemoryForecastStore {
    runs: DashMap<Uuid, ForecastRun>,
    committed: RwLock<Vec<ForecastResult>>,
    pending: DashMap<Uuid, Vec<ForecastResult>>,
    classifications: DashMap<(Uuid, String), SkuClassification>,
    history: RwLock<HashMap<(Uuid, String), Vec<SalesRecord>>>,
}

impl InMemoryForecastStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed sales history so this store can double as a `HistoryReader`.
    pub async fn seed_history(&self, client_id: Uuid, records: Vec<SalesRecord>) {
        let mut history = self.history.write().await;
        for record in records {
            history
                .entry((client_id, record.item_id.clone()))
                .or_default()
                .push(record);
        }
    }

    pub async fn committed_row_count(&self) -> usize {
        self.committed.read().await.len()
    }

    fn matches(filter: &ResultFilter, row: &ForecastResult) -> bool {
        if let Some(client_id) = filter.client_id {
            if row.client_id != client_id {
                return false;
            }
        }
        if let Some(item_id) = &filter.item_id {
            if &row.item_id != item_id {
                return false;
            }
        }
        if let Some(method) = &filter.method {
            if &row.method != method {
                return false;
            }
        }
        if let Some(run_id) = filter.forecast_run_id {
            if row.forecast_run_id != run_id {
                return false;
            }
        }
        if let Some(start) = filter.start_date {
            if row.date < start {
                return false;
            }
        }
        if let Some(end) = filter.end_date {
            if row.date > end {
                return false;
            }
        }
        if filter.with_actuals_only && row.actual_value.is_none() {
            return false;
        }
        true
    }
}

#[async_trait]
impl HistoryReader for InMemoryForecastStore {
    async fn fetch_historical_data(
        &self,
        client_id: Uuid,
        item_ids: &[String],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<SalesRecord>> {
        let history = self.history.read().await;
        let mut out = Vec::new();
        for item_id in item_ids {
            let Some(records) = history.get(&(client_id, item_id.clone())) else {
                continue;
            };
            for record in records {
                // date bounds apply to parseable dates; unparseable rows
                // pass through for the validator to reject
                let in_range = match NaiveDate::parse_from_str(&record.date, "%Y-%m-%d") {
                    Ok(date) => {
                        start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
                    }
                    Err(_) => true,
                };
                if in_range {
                    out.push(record.clone());
                }
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl ForecastStore for InMemoryForecastStore {
    async fn create_run(&self, run: &ForecastRun) -> Result<()> {
        if self.runs.contains_key(&run.id) {
            return Err(ForecastError::Store(format!(
                "run {} already exists",
                run.id
            )));
        }
        self.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn update_run(&self, run: &ForecastRun) -> Result<()> {
        if !self.runs.contains_key(&run.id) {
            return Err(ForecastError::Store(format!("run {} not found", run.id)));
        }
        // a failed run never exposes its buffered rows
        if run.status == crate::models::RunStatus::Failed {
            self.pending.remove(&run.id);
        }
        self.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<ForecastRun>> {
        Ok(self.runs.get(&run_id).map(|r| r.clone()))
    }

    async fn insert_results(&self, rows: Vec<ForecastResult>) -> Result<()> {
        for row in rows {
            self.pending.entry(row.forecast_run_id).or_default().push(row);
        }
        Ok(())
    }

    async fn commit_run(&self, run_id: Uuid) -> Result<()> {
        if let Some((_, rows)) = self.pending.remove(&run_id) {
            self.committed.write().await.extend(rows);
        }
        Ok(())
    }

    async fn delete_run(&self, run_id: Uuid) -> Result<()> {
        self.runs.remove(&run_id);
        self.pending.remove(&run_id);
        self.committed
            .write()
            .await
            .retain(|row| row.forecast_run_id != run_id);
        Ok(())
    }

    async fn query_results(&self, filter: &ResultFilter) -> Result<Vec<ForecastResult>> {
        let committed = self.committed.read().await;
        Ok(committed
            .iter()
            .filter(|row| Self::matches(filter, row))
            .cloned()
            .collect())
    }

    async fn upsert_classification(&self, classification: &SkuClassification) -> Result<()> {
        self.classifications.insert(
            (classification.client_id, classification.item_id.clone()),
            classification.clone(),
        );
        Ok(())
    }

    async fn get_classification(
        &self,
        client_id: Uuid,
        item_id: &str,
    ) -> Result<Option<SkuClassification>> {
        Ok(self
            .classifications
            .get(&(client_id, item_id.to_string()))
            .map(|c| c.clone()))
    }

    async fn set_actual_value(
        &self,
        client_id: Uuid,
        item_id: &str,
        date: NaiveDate,
        value: f64,
    ) -> Result<u64> {
        let mut committed = self.committed.write().await;
        let mut touched = 0u64;
        for row in committed.iter_mut() {
            if row.client_id == client_id
                && row.item_id == item_id
                && row.date == date
                && row.actual_value.is_none()
            {
                row.actual_value = Some(value);
                touched += 1;
            }
        }
        Ok(touched)
    }
}
