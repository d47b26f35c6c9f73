use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::models::{ContextSeries, Prediction, SalesRecord, TimeSeriesPoint};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TARGET_COLUMN: &str = "target";
/// Target-column NaN fraction above which the series is rejected even
/// when a fill strategy repairs the values.
const MAX_TARGET_NAN_FRACTION: f64 = 0.5;

/// How NaN values are repaired during cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillnaStrategy {
    /// Replace NaN with 0.
    Zero,
    /// Carry the last seen value forward, 0 before the first.
    ForwardFill,
    /// Replace NaN with a supplied constant.
    Value(f64),
    /// Any NaN fails validation.
    Error,
}

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub min_history_days: usize,
    pub fill_missing_dates: bool,
    pub fillna_strategy: FillnaStrategy,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            min_history_days: 7,
            fill_missing_dates: true,
            fillna_strategy: FillnaStrategy::Zero,
        }
    }
}

/// What the cleaning pass found and did, column by column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub item_id: String,
    pub rows_in: usize,
    pub rows_out: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub duplicates_removed: usize,
    /// Calendar days absent between the min and max date.
    pub missing_dates: usize,
    /// Rows inserted to close those gaps (0 when filling is off).
    pub filled_dates: usize,
    pub nan_counts: BTreeMap<String, usize>,
    pub filled_counts: BTreeMap<String, usize>,
    pub negatives_clamped: usize,
    pub warnings: Vec<String>,
}

/// Result of `validate_and_clean`. `cleaned` is present whenever the
/// rows could be parsed into a series at all, even if validation failed,
/// so callers can inspect what the repair produced; only act on it when
/// `is_valid`.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub report: ValidationReport,
    pub cleaned: Option<ContextSeries>,
    pub error: Option<String>,
}

/// Summary check of a model's output shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionCheck {
    pub is_valid: bool,
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Normalizes raw sales rows into a gap-free, NaN-free daily series any
/// model can consume.
#[derive(Debug, Clone, Default)]
pub struct DataValidator;

impl DataValidator {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, records), fields(item_id = item_id, rows = records.len()))]
    pub fn validate_and_clean(
        &self,
        records: &[SalesRecord],
        item_id: &str,
        opts: &ValidationOptions,
    ) -> ValidationOutcome {
        let mut report = ValidationReport {
            item_id: item_id.to_string(),
            rows_in: records.len(),
            ..Default::default()
        };
        let mut errors: Vec<String> = Vec::new();

        if records.is_empty() {
            return ValidationOutcome {
                is_valid: false,
                report,
                cleaned: None,
                error: Some(format!("no history rows for item {item_id}")),
            };
        }

        // 1. dates must parse
        let mut unparseable = 0usize;
        let mut rows: Vec<(NaiveDate, &SalesRecord)> = Vec::with_capacity(records.len());
        for record in records {
            match NaiveDate::parse_from_str(&record.date, DATE_FORMAT) {
                Ok(date) => rows.push((date, record)),
                Err(_) => unparseable += 1,
            }
        }
        if unparseable > 0 {
            return ValidationOutcome {
                is_valid: false,
                report,
                cleaned: None,
                error: Some(format!(
                    "{unparseable} unparseable dates for item {item_id}"
                )),
            };
        }

        // 2. sort, collapse duplicate dates keeping the first occurrence
        rows.sort_by_key(|(date, _)| *date);
        let mut seen: HashSet<NaiveDate> = HashSet::with_capacity(rows.len());
        let before = rows.len();
        rows.retain(|(date, _)| seen.insert(*date));
        report.duplicates_removed = before - rows.len();

        // 3. gaps
        let first = rows.first().map(|(d, _)| *d).unwrap();
        let last = rows.last().map(|(d, _)| *d).unwrap();
        report.date_range = Some((first, last));
        let expected = (last - first).num_days() as usize + 1;
        report.missing_dates = expected - rows.len();

        let mut points: Vec<TimeSeriesPoint> = Vec::with_capacity(expected);
        if opts.fill_missing_dates {
            let mut iter = rows.iter().peekable();
            let mut date = first;
            while date <= last {
                match iter.peek() {
                    Some((d, record)) if *d == date => {
                        points.push(TimeSeriesPoint {
                            item_id: item_id.to_string(),
                            date,
                            target: record.target,
                            covariates: record.covariates.clone(),
                        });
                        iter.next();
                    }
                    _ => {
                        // gap day: zero demand, covariates left null
                        points.push(TimeSeriesPoint {
                            item_id: item_id.to_string(),
                            date,
                            target: 0.0,
                            covariates: None,
                        });
                        report.filled_dates += 1;
                    }
                }
                date = date + chrono::Days::new(1);
            }
        } else {
            let mut inconsistent = false;
            for pair in rows.windows(2) {
                let step = (pair[1].0 - pair[0].0).num_days();
                if step > 2 {
                    inconsistent = true;
                    break;
                }
            }
            if inconsistent {
                errors.push(format!(
                    "inconsistent date spacing for item {item_id} (gaps wider than 2 days)"
                ));
            }
            points = rows
                .iter()
                .map(|(date, record)| TimeSeriesPoint {
                    item_id: item_id.to_string(),
                    date: *date,
                    target: record.target,
                    covariates: record.covariates.clone(),
                })
                .collect();
        }

        // 4. NaN repair, column by column
        let target_nans = points.iter().filter(|p| p.target.is_nan()).count();
        if target_nans > 0 {
            report.nan_counts.insert(TARGET_COLUMN.to_string(), target_nans);
            let fraction = target_nans as f64 / points.len() as f64;
            if fraction > MAX_TARGET_NAN_FRACTION {
                errors.push(format!(
                    "target column is {:.0}% NaN for item {item_id}",
                    fraction * 100.0
                ));
            }
            match opts.fillna_strategy {
                FillnaStrategy::Error => {
                    errors.push(format!(
                        "{target_nans} NaN target values for item {item_id}"
                    ));
                }
                strategy => {
                    Self::fill_column(&mut points, None, strategy);
                    report
                        .filled_counts
                        .insert(TARGET_COLUMN.to_string(), target_nans);
                }
            }
        }

        for key in Self::covariate_keys(&points) {
            let nans = points
                .iter()
                .filter(|p| Self::covariate(p, &key).map_or(true, f64::is_nan))
                .count();
            if nans == 0 {
                continue;
            }
            report.nan_counts.insert(key.clone(), nans);
            match opts.fillna_strategy {
                FillnaStrategy::Error => {
                    errors.push(format!(
                        "{nans} NaN values in covariate '{key}' for item {item_id}"
                    ));
                }
                strategy => {
                    Self::fill_column(&mut points, Some(&key), strategy);
                    report.filled_counts.insert(key.clone(), nans);
                }
            }
        }

        // 5. enough history left?
        if points.len() < opts.min_history_days {
            errors.push(format!(
                "insufficient history for item {item_id}: {} days, need {}",
                points.len(),
                opts.min_history_days
            ));
        }

        // 6. negative demand is a data defect, clamp and warn
        for point in &mut points {
            if point.target < 0.0 {
                point.target = 0.0;
                report.negatives_clamped += 1;
            }
        }
        if report.negatives_clamped > 0 {
            report.warnings.push(format!(
                "clamped {} negative target values to 0",
                report.negatives_clamped
            ));
        }

        report.rows_out = points.len();
        let is_valid = errors.is_empty();
        if !is_valid {
            warn!(item_id, errors = ?errors, "series failed validation");
        }
        ValidationOutcome {
            is_valid,
            cleaned: Some(ContextSeries::new(item_id.to_string(), points)),
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
            report,
        }
    }

    /// Check a model's output: exact row count, finite point forecasts,
    /// negative forecasts flagged but tolerated.
    #[instrument(skip(self, predictions), fields(item_id = item_id))]
    pub fn validate_predictions(
        &self,
        predictions: &[Prediction],
        item_id: &str,
        expected_count: usize,
    ) -> PredictionCheck {
        let mut warnings = Vec::new();
        let mut error = None;

        if predictions.len() != expected_count {
            error = Some(format!(
                "expected {expected_count} predictions for item {item_id}, got {}",
                predictions.len()
            ));
        } else if let Some(bad) = predictions.iter().find(|p| !p.point_forecast.is_finite()) {
            error = Some(format!(
                "non-finite point forecast for item {item_id} on {}",
                bad.date
            ));
        }

        let negatives = predictions
            .iter()
            .filter(|p| p.point_forecast < 0.0)
            .count();
        if negatives > 0 {
            warnings.push(format!("{negatives} negative point forecasts"));
        }

        let values: Vec<f64> = predictions.iter().map(|p| p.point_forecast).collect();
        let (mean, min, max) = if values.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                values.iter().sum::<f64>() / values.len() as f64,
                values.iter().copied().fold(f64::INFINITY, f64::min),
                values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        PredictionCheck {
            is_valid: error.is_none(),
            error,
            warnings,
            count: predictions.len(),
            mean,
            min,
            max,
        }
    }

    fn covariate_keys(points: &[TimeSeriesPoint]) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for point in points {
            if let Some(covariates) = &point.covariates {
                for key in covariates.keys() {
                    if seen.insert(key.clone()) {
                        keys.push(key.clone());
                    }
                }
            }
        }
        keys.sort();
        keys
    }

    fn covariate(point: &TimeSeriesPoint, key: &str) -> Option<f64> {
        point.covariates.as_ref().and_then(|c| c.get(key)).copied()
    }

    /// Repair NaN (or absent covariate) cells in one column.
    fn fill_column(points: &mut [TimeSeriesPoint], covariate: Option<&str>, strategy: FillnaStrategy) {
        let mut carried: Option<f64> = None;
        for point in points.iter_mut() {
            let current = match covariate {
                None => Some(point.target),
                Some(key) => Self::covariate(point, key),
            };
            let needs_fill = current.map_or(true, f64::is_nan);
            let replacement = if needs_fill {
                match strategy {
                    FillnaStrategy::Zero => 0.0,
                    FillnaStrategy::ForwardFill => carried.unwrap_or(0.0),
                    FillnaStrategy::Value(v) => v,
                    FillnaStrategy::Error => unreachable!("Error strategy never fills"),
                }
            } else {
                let v = current.unwrap();
                carried = Some(v);
                continue;
            };
            match covariate {
                None => point.target = replacement,
                Some(key) => {
                    point
                        .covariates
                        .get_or_insert_with(HashMap::new)
                        .insert(key.to_string(), replacement);
                }
            }
            if matches!(strategy, FillnaStrategy::ForwardFill) {
                carried = Some(replacement);
            }
        }
    }
}
