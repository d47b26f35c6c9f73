use std::collections::HashMap;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::config::ForecastingConfig;
use crate::ml::{croston, min_max, moving_average, sba};
use crate::models::{
    mean, std_dev, AbcClass, ContextSeries, DemandPattern, SkuClassification, XyzClass,
};

/// Cumulative revenue share thresholds for the batch ABC walk.
const ABC_BATCH_A_CUTOFF: f64 = 80.0;
const ABC_BATCH_B_CUTOFF: f64 = 95.0;
/// Per-item revenue share thresholds for single-item ABC.
const ABC_SHARE_A_CUTOFF: f64 = 80.0;
const ABC_SHARE_B_CUTOFF: f64 = 15.0;

const XYZ_X_CUTOFF: f64 = 0.5;
const XYZ_Y_CUTOFF: f64 = 1.0;

const SHORT_HISTORY_DAYS: usize = 30;

/// Computes ABC-XYZ classes, demand pattern, forecastability and the
/// recommended forecasting method for a SKU. Pure over the cleaned
/// history plus revenue context; persistence belongs to the caller.
#[derive(Debug, Clone)]
pub struct SkuClassifier {
    config: ForecastingConfig,
}

impl SkuClassifier {
    pub fn new(config: ForecastingConfig) -> Self {
        Self { config }
    }

    /// std/mean of the series; infinite when the mean is zero or the
    /// series is empty.
    pub fn coefficient_of_variation(targets: &[f64]) -> f64 {
        if targets.is_empty() {
            return f64::INFINITY;
        }
        let m = mean(targets);
        if m == 0.0 {
            return f64::INFINITY;
        }
        std_dev(targets) / m
    }

    /// total days / nonzero-demand days; infinite with no demand at all.
    pub fn average_demand_interval(targets: &[f64]) -> f64 {
        let nonzero = targets.iter().filter(|&&t| t > 0.0).count();
        if nonzero == 0 {
            return f64::INFINITY;
        }
        targets.len() as f64 / nonzero as f64
    }

    pub fn demand_pattern(&self, cv: f64, adi: f64) -> DemandPattern {
        if adi <= self.config.adi_regular_threshold {
            DemandPattern::Regular
        } else if cv * cv > self.config.lumpy_cv2_threshold {
            DemandPattern::Lumpy
        } else {
            DemandPattern::Intermittent
        }
    }

    /// Single-item ABC from this item's revenue share of the total.
    pub fn classify_abc_share(revenue: f64, total_revenue: f64) -> (AbcClass, f64) {
        let share = if total_revenue > 0.0 {
            (revenue / total_revenue) * 100.0
        } else {
            0.0
        };
        let class = if share >= ABC_SHARE_A_CUTOFF {
            AbcClass::A
        } else if share >= ABC_SHARE_B_CUTOFF {
            AbcClass::B
        } else {
            AbcClass::C
        };
        (class, share)
    }

    /// Batch ABC: walk items by revenue descending, assigning A while the
    /// cumulative share before the item is under 80%, B under 95%, C
    /// after. Returns class and revenue share per item id.
    pub fn classify_abc_batch(revenues: &[(String, f64)]) -> HashMap<String, (AbcClass, f64)> {
        let total: f64 = revenues.iter().map(|(_, r)| r.max(0.0)).sum();
        let mut sorted: Vec<(&String, f64)> =
            revenues.iter().map(|(id, r)| (id, r.max(0.0))).collect();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut out = HashMap::with_capacity(sorted.len());
        let mut cumulative = 0.0;
        for (id, revenue) in sorted {
            let share = if total > 0.0 {
                revenue / total * 100.0
            } else {
                0.0
            };
            let class = if cumulative < ABC_BATCH_A_CUTOFF {
                AbcClass::A
            } else if cumulative < ABC_BATCH_B_CUTOFF {
                AbcClass::B
            } else {
                AbcClass::C
            };
            cumulative += share;
            out.insert(id.clone(), (class, share));
        }
        out
    }

    pub fn classify_xyz(cv: f64) -> XyzClass {
        // NaN and infinity both land in Z
        if cv < XYZ_X_CUTOFF {
            XyzClass::X
        } else if cv < XYZ_Y_CUTOFF {
            XyzClass::Y
        } else {
            XyzClass::Z
        }
    }

    pub fn forecastability_score(
        abc: AbcClass,
        xyz: XyzClass,
        pattern: DemandPattern,
    ) -> f64 {
        let base: f64 = match abc {
            AbcClass::A => 0.9,
            AbcClass::B => 0.7,
            AbcClass::C => 0.5,
        };
        let xyz_adj = match xyz {
            XyzClass::X => 0.1,
            XyzClass::Y => -0.2,
            XyzClass::Z => -0.4,
        };
        let pattern_adj = match pattern {
            DemandPattern::Regular => 0.0,
            DemandPattern::Intermittent => -0.2,
            DemandPattern::Lumpy => -0.3,
        };
        (base + xyz_adj + pattern_adj).clamp(0.0, 1.0)
    }

    /// Method routing. Lumpy and intermittent demand override the
    /// ABC-XYZ table; A-Z items go to the foundation model but flagged.
    fn recommend_method(
        &self,
        abc: AbcClass,
        xyz: XyzClass,
        pattern: DemandPattern,
    ) -> (String, bool) {
        match pattern {
            DemandPattern::Lumpy => return (sba::MODEL_ID.to_string(), false),
            DemandPattern::Intermittent => return (croston::MODEL_ID.to_string(), false),
            DemandPattern::Regular => {}
        }
        let foundation = self.config.foundation_model.clone();
        match (abc, xyz) {
            (AbcClass::A, XyzClass::X)
            | (AbcClass::B, XyzClass::X)
            | (AbcClass::C, XyzClass::X)
            | (AbcClass::A, XyzClass::Y)
            | (AbcClass::B, XyzClass::Y) => (foundation, false),
            (AbcClass::C, XyzClass::Y) => (moving_average::MODEL_ID.to_string(), false),
            (AbcClass::A, XyzClass::Z) => (foundation, true),
            (AbcClass::B, XyzClass::Z) => (moving_average::MODEL_ID.to_string(), false),
            (AbcClass::C, XyzClass::Z) => (min_max::MODEL_ID.to_string(), false),
        }
    }

    /// Expected MAPE band per ABC-XYZ cell, widened for intermittent and
    /// lumpy demand where percentage errors inflate.
    fn expected_mape_range(
        abc: AbcClass,
        xyz: XyzClass,
        pattern: DemandPattern,
    ) -> (f64, f64) {
        let (min, max) = match (abc, xyz) {
            (AbcClass::A, XyzClass::X) => (10.0, 20.0),
            (AbcClass::B, XyzClass::X) => (12.0, 22.0),
            (AbcClass::C, XyzClass::X) => (15.0, 25.0),
            (AbcClass::A, XyzClass::Y) => (20.0, 35.0),
            (AbcClass::B, XyzClass::Y) => (25.0, 40.0),
            (AbcClass::C, XyzClass::Y) => (30.0, 45.0),
            (AbcClass::A, XyzClass::Z) => (40.0, 70.0),
            (AbcClass::B, XyzClass::Z) => (45.0, 80.0),
            (AbcClass::C, XyzClass::Z) => (50.0, 100.0),
        };
        match pattern {
            DemandPattern::Regular => (min, max),
            DemandPattern::Intermittent => (min + 10.0, max + 20.0),
            DemandPattern::Lumpy => (min + 20.0, max + 30.0),
        }
    }

    /// Classify one SKU with per-item ABC thresholds. Batch callers that
    /// already hold the whole revenue vector should prefer
    /// [`SkuClassifier::classify_batch`].
    #[instrument(skip(self, history), fields(item_id = item_id))]
    pub fn classify_sku(
        &self,
        client_id: Uuid,
        item_id: &str,
        history: &ContextSeries,
        revenue: f64,
        total_revenue: f64,
    ) -> SkuClassification {
        let (abc, share) = Self::classify_abc_share(revenue, total_revenue);
        self.classify_with_abc(client_id, item_id, history, abc, share)
    }

    /// Classify a whole batch, with ABC assigned by the cumulative
    /// revenue-share walk over all items.
    pub fn classify_batch(
        &self,
        client_id: Uuid,
        items: &[(String, ContextSeries, f64)],
    ) -> Vec<SkuClassification> {
        let revenues: Vec<(String, f64)> = items
            .iter()
            .map(|(id, _, revenue)| (id.clone(), *revenue))
            .collect();
        let abc_map = Self::classify_abc_batch(&revenues);

        items
            .iter()
            .map(|(id, history, _)| {
                let (abc, share) = abc_map.get(id).copied().unwrap_or((AbcClass::C, 0.0));
                self.classify_with_abc(client_id, id, history, abc, share)
            })
            .collect()
    }

    fn classify_with_abc(
        &self,
        client_id: Uuid,
        item_id: &str,
        history: &ContextSeries,
        abc: AbcClass,
        revenue_share: f64,
    ) -> SkuClassification {
        let targets = history.targets();
        let cv = Self::coefficient_of_variation(&targets);
        let adi = Self::average_demand_interval(&targets);
        let pattern = self.demand_pattern(cv, adi);
        let xyz = Self::classify_xyz(cv);
        let score = Self::forecastability_score(abc, xyz, pattern);
        let (method, flagged) = self.recommend_method(abc, xyz, pattern);
        let mape_range = Self::expected_mape_range(abc, xyz, pattern);

        let zero_days = targets.len() - history.nonzero_days();
        let mut warnings = Vec::new();
        if cv >= 1.0 {
            warnings.push(format!("high demand variability (cv={cv:.2})"));
        }
        if adi > self.config.adi_regular_threshold {
            warnings.push(format!("intermittent demand (adi={adi:.2})"));
        }
        if targets.len() < SHORT_HISTORY_DAYS {
            warnings.push(format!(
                "short history ({} days, classification may be unstable)",
                targets.len()
            ));
        }
        if !targets.is_empty() && zero_days * 2 > targets.len() {
            warnings.push(format!(
                "{zero_days} of {} days have zero demand",
                targets.len()
            ));
        }
        if flagged {
            warnings.push(
                "high-value high-variability item routed to the foundation model".to_string(),
            );
        }

        let mut metadata = HashMap::new();
        metadata.insert("history_days".to_string(), serde_json::json!(targets.len()));
        metadata.insert("zero_days".to_string(), serde_json::json!(zero_days));
        metadata.insert("routing_flagged".to_string(), serde_json::json!(flagged));

        SkuClassification {
            client_id,
            item_id: item_id.to_string(),
            abc_class: abc,
            xyz_class: xyz,
            demand_pattern: pattern,
            coefficient_of_variation: cv,
            average_demand_interval: adi,
            revenue_contribution: revenue_share,
            forecastability_score: score,
            recommended_method: method,
            expected_mape_range: mape_range,
            warnings,
            metadata,
            classified_at: Utc::now(),
        }
    }
}
