//! Model constants consumed by the profitability model and the scenario
//! engine. Every value can be overridden from a JSON file or a named preset;
//! deployments share formulas but not constants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ── Profitability ──────────────────────────────────────────────────

/// Cost charged per review, keyed by integer star score.
/// Scores absent from the table (including non-integer scores) cost 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewCostTable(BTreeMap<u8, f64>);

impl ReviewCostTable {
    pub fn new(costs: impl IntoIterator<Item = (u8, f64)>) -> Self {
        Self(costs.into_iter().collect())
    }

    pub fn cost_for(&self, score: f64) -> f64 {
        if score.fract() != 0.0 || !(0.0..=f64::from(u8::MAX)).contains(&score) {
            return 0.0;
        }
        self.0.get(&(score as u8)).copied().unwrap_or(0.0)
    }
}

impl Default for ReviewCostTable {
    fn default() -> Self {
        Self::new([(1, 100.0), (2, 50.0), (3, 40.0), (4, 0.0), (5, 0.0)])
    }
}

/// Commission + subscription revenue model with a review-cost penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfitabilityModel {
    /// Share of sales kept as commission.
    pub commission_rate: f64,
    /// Flat subscription charged per month on the platform.
    pub subscription_per_month: f64,
    pub review_costs: ReviewCostTable,
}

impl Default for ProfitabilityModel {
    fn default() -> Self {
        Self {
            commission_rate: 0.10,
            subscription_per_month: 80.0,
            review_costs: ReviewCostTable::default(),
        }
    }
}

// ── Infrastructure cost ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum InfraCostModel {
    /// `alpha * sqrt(sellers) + beta * sqrt(items)`. Canonical.
    SquareRoot { alpha: f64, beta: f64 },
    /// `base + per_seller * sellers + per_item * items`.
    /// A flat charge is `per_seller = per_item = 0`.
    Linear {
        base: f64,
        per_seller: f64,
        per_item: f64,
    },
}

impl InfraCostModel {
    pub const OLIST_ALPHA: f64 = 3157.27;
    pub const OLIST_BETA: f64 = 978.23;

    pub fn olist_sqrt() -> Self {
        Self::SquareRoot {
            alpha: Self::OLIST_ALPHA,
            beta: Self::OLIST_BETA,
        }
    }

    pub fn linear_opex() -> Self {
        Self::Linear {
            base: 200_000.0,
            per_seller: 50.0,
            per_item: 1.35,
        }
    }
}

impl Default for InfraCostModel {
    fn default() -> Self {
        Self::olist_sqrt()
    }
}

// ── Cutoff search ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Largest seller count for which every cutoff is evaluated.
    pub exhaustive_limit: usize,
    /// Stride between sampled cutoffs above `exhaustive_limit`.
    pub sample_step: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            exhaustive_limit: 50_000,
            sample_step: 10,
        }
    }
}

// ── Top level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    pub profitability: ProfitabilityModel,
    pub infrastructure: InfraCostModel,
    pub search: SearchConfig,
}

impl ImpactConfig {
    pub const PRESETS: &'static [&'static str] = &["olist_sqrt", "linear_opex"];

    /// Load from a JSON file. Keys absent from the file keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: ImpactConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// A named constant set. Presets differ only in infrastructure cost.
    pub fn preset(name: &str) -> Option<Self> {
        let infrastructure = match name {
            "olist_sqrt" => InfraCostModel::olist_sqrt(),
            "linear_opex" => InfraCostModel::linear_opex(),
            _ => return None,
        };
        Some(Self {
            infrastructure,
            ..Self::default()
        })
    }
}
