//! Scenario engine: "remove the k least profitable sellers".
//!
//! Sellers are ranked once, worst-first by gross profit with seller_id as the
//! tie-break. Suffix sums over that ranking make every scenario O(1):
//! keeping `ranked[k..]` reads one entry of each suffix array.
//!
//! Infrastructure cost is evaluated on the kept population's totals, never
//! accumulated per seller, because the canonical model is not linear.

use crate::{
    config::{InfraCostModel, SearchConfig},
    profitability::SellerMetrics,
    types::SellerId,
};
use serde::{Deserialize, Serialize};

impl InfraCostModel {
    pub fn cost(&self, n_sellers: u64, n_items: u64) -> f64 {
        match *self {
            Self::SquareRoot { alpha, beta } => {
                alpha * (n_sellers as f64).sqrt() + beta * (n_items as f64).sqrt()
            }
            Self::Linear {
                base,
                per_seller,
                per_item,
            } => base + per_seller * n_sellers as f64 + per_item * n_items as f64,
        }
    }
}

/// Totals of the kept population for one cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub k: usize,
    pub n_sellers: u64,
    pub n_items: u64,
    pub revenue: f64,
    pub review_cost: f64,
    pub gross_profit_total: f64,
    pub it_cost: f64,
    pub net_profit: f64,
}

/// Revenue-to-net-profit waterfall of the kept population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PnlBreakdown {
    pub subscription_revenue: f64,
    pub commission_revenue: f64,
    pub revenue: f64,
    pub review_cost: f64,
    pub gross_profit: f64,
    pub it_cost: f64,
    pub net_profit: f64,
}

/// A scenario set against the no-removal baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub removed: usize,
    pub kept: usize,
    pub scenario: ScenarioResult,
    pub baseline_net_profit: f64,
    pub net_profit_delta: f64,
}

/// Cumulative totals after keeping the `kept` best sellers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub kept: usize,
    pub cum_items: u64,
    pub cum_revenue: f64,
    pub cum_review_cost: f64,
    pub cum_gross_profit: f64,
    pub cum_it_cost: f64,
    pub cum_net_profit: f64,
}

/// Best cutoff among the cutoffs actually evaluated.
///
/// When `exhaustive` is false only every `sample_step`-th cutoff (plus both
/// ends) was evaluated, and a better unsampled cutoff may exist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimalCutoff {
    pub k: usize,
    pub net_profit: f64,
    pub scenario: ScenarioResult,
    pub candidates_evaluated: usize,
    pub exhaustive: bool,
}

/// Per-seller figures the engine needs, in ranking order.
#[derive(Debug, Clone, PartialEq)]
struct RankedSeller {
    seller_id: SellerId,
    gross_profit: f64,
}

/// Running totals of `ranked[i..]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Totals {
    items: u64,
    revenue: f64,
    review_cost: f64,
    commission: f64,
    subscription: f64,
}

#[derive(Debug, Clone)]
pub struct ScenarioEngine {
    ranked: Vec<RankedSeller>,
    /// `suffix[i]` holds the totals of `ranked[i..]`; length N + 1.
    suffix: Vec<Totals>,
    infra: InfraCostModel,
}

impl ScenarioEngine {
    pub fn new(sellers: &[SellerMetrics], infra: InfraCostModel) -> Self {
        let mut order: Vec<&SellerMetrics> = sellers.iter().collect();
        order.sort_by(|a, b| {
            a.gross_profit
                .total_cmp(&b.gross_profit)
                .then_with(|| a.kpis.seller_id.cmp(&b.kpis.seller_id))
        });

        let mut suffix = vec![Totals::default(); order.len() + 1];
        for (i, s) in order.iter().enumerate().rev() {
            let next = suffix[i + 1];
            suffix[i] = Totals {
                items: next.items + s.kpis.quantity,
                revenue: next.revenue + s.revenues,
                review_cost: next.review_cost + s.kpis.cost_of_reviews,
                commission: next.commission + s.commission_revenue,
                subscription: next.subscription + s.subscription_revenue,
            };
        }

        let ranked = order
            .into_iter()
            .map(|s| RankedSeller {
                seller_id: s.kpis.seller_id.clone(),
                gross_profit: s.gross_profit,
            })
            .collect();

        Self {
            ranked,
            suffix,
            infra,
        }
    }

    /// Number of sellers in the table.
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn infra(&self) -> &InfraCostModel {
        &self.infra
    }

    /// Seller ids worst-first; the first `k` are the ones `evaluate(k)` drops.
    pub fn removal_order(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.ranked
            .iter()
            .map(|s| (s.seller_id.as_str(), s.gross_profit))
    }

    fn clamp(&self, k: usize) -> usize {
        if k > self.len() {
            log::debug!("cutoff {k} clamped to {}", self.len());
        }
        k.min(self.len())
    }

    fn result_at(&self, k: usize) -> ScenarioResult {
        let t = &self.suffix[k];
        let n_sellers = (self.len() - k) as u64;
        let gross_profit_total = t.revenue - t.review_cost;
        let it_cost = self.infra.cost(n_sellers, t.items);
        ScenarioResult {
            k,
            n_sellers,
            n_items: t.items,
            revenue: t.revenue,
            review_cost: t.review_cost,
            gross_profit_total,
            it_cost,
            net_profit: gross_profit_total - it_cost,
        }
    }

    /// Totals after dropping the `k` worst sellers. `k` is clamped to [0, N].
    pub fn evaluate(&self, k: usize) -> ScenarioResult {
        self.result_at(self.clamp(k))
    }

    pub fn baseline(&self) -> ScenarioResult {
        self.result_at(0)
    }

    pub fn breakdown(&self, k: usize) -> PnlBreakdown {
        let k = self.clamp(k);
        let r = self.result_at(k);
        let t = &self.suffix[k];
        PnlBreakdown {
            subscription_revenue: t.subscription,
            commission_revenue: t.commission,
            revenue: r.revenue,
            review_cost: r.review_cost,
            gross_profit: r.gross_profit_total,
            it_cost: r.it_cost,
            net_profit: r.net_profit,
        }
    }

    pub fn compare(&self, k: usize) -> ScenarioComparison {
        let scenario = self.evaluate(k);
        let baseline = self.baseline();
        ScenarioComparison {
            removed: scenario.k,
            kept: scenario.n_sellers as usize,
            scenario,
            baseline_net_profit: baseline.net_profit,
            net_profit_delta: scenario.net_profit - baseline.net_profit,
        }
    }

    /// Cumulative curve, best seller first, one point per kept count 1..=N.
    /// The point keeping `j` sellers equals `evaluate(N - j)`.
    pub fn curve(&self) -> Vec<CurvePoint> {
        let n = self.len();
        (1..=n)
            .map(|kept| {
                let r = self.result_at(n - kept);
                CurvePoint {
                    kept,
                    cum_items: r.n_items,
                    cum_revenue: r.revenue,
                    cum_review_cost: r.review_cost,
                    cum_gross_profit: r.gross_profit_total,
                    cum_it_cost: r.it_cost,
                    cum_net_profit: r.net_profit,
                }
            })
            .collect()
    }

    /// Cutoffs the optimal search evaluates, ascending.
    pub fn candidates(&self, search: &SearchConfig) -> Vec<usize> {
        let n = self.len();
        if n <= search.exhaustive_limit {
            return (0..=n).collect();
        }
        let step = search.sample_step.max(1);
        let mut ks: Vec<usize> = (0..=n).step_by(step).collect();
        if ks.last() != Some(&n) {
            ks.push(n);
        }
        ks
    }

    /// Empirical maximum of net profit over the candidate cutoffs.
    /// Ties resolve to the smallest k.
    pub fn optimal(&self, search: &SearchConfig) -> OptimalCutoff {
        let candidates = self.candidates(search);
        let exhaustive = candidates.len() == self.len() + 1;

        let mut best = self.result_at(0);
        for &k in &candidates {
            let r = self.result_at(k);
            if r.net_profit > best.net_profit {
                best = r;
            }
        }

        if exhaustive {
            log::info!(
                "optimal cutoff k={} net_profit={:.0} ({} cutoffs, exhaustive)",
                best.k,
                best.net_profit,
                candidates.len()
            );
        } else {
            log::info!(
                "optimal cutoff k={} net_profit={:.0} ({} sampled cutoffs, step {}; not exhaustive)",
                best.k,
                best.net_profit,
                candidates.len(),
                search.sample_step.max(1)
            );
        }

        OptimalCutoff {
            k: best.k,
            net_profit: best.net_profit,
            scenario: best,
            candidates_evaluated: candidates.len(),
            exhaustive,
        }
    }
}
