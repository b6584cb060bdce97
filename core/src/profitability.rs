//! Profitability model: revenue and gross profit per seller.
//!
//! revenues     = commission_rate * sales + subscription_per_month * months
//! gross_profit = revenues - cost_of_reviews
//!
//! Infrastructure cost is not a per-seller quantity; it is applied by the
//! scenario engine on population totals.

use crate::{
    config::ProfitabilityModel,
    pipeline::{AggregationReport, SellerKpis},
};
use serde::{Deserialize, Serialize};

/// The central per-seller aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerMetrics {
    #[serde(flatten)]
    pub kpis: SellerKpis,
    pub commission_revenue: f64,
    pub subscription_revenue: f64,
    pub revenues: f64,
    pub gross_profit: f64,
}

impl SellerMetrics {
    pub fn seller_id(&self) -> &str {
        &self.kpis.seller_id
    }
}

/// One aggregation pass: the seller rows plus what the pipeline discarded.
/// Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SellerTable {
    pub sellers: Vec<SellerMetrics>,
    pub report: AggregationReport,
}

impl SellerTable {
    pub fn len(&self) -> usize {
        self.sellers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sellers.is_empty()
    }

    pub fn get(&self, seller_id: &str) -> Option<&SellerMetrics> {
        self.sellers
            .binary_search_by(|s| s.kpis.seller_id.as_str().cmp(seller_id))
            .ok()
            .map(|i| &self.sellers[i])
    }

    pub fn total_gross_profit(&self) -> f64 {
        self.sellers.iter().map(|s| s.gross_profit).sum()
    }
}

impl ProfitabilityModel {
    pub fn price(&self, kpis: SellerKpis) -> SellerMetrics {
        let commission_revenue = self.commission_rate * kpis.sales;
        let subscription_revenue = self.subscription_per_month * f64::from(kpis.months_on_olist);
        let revenues = commission_revenue + subscription_revenue;
        let gross_profit = revenues - kpis.cost_of_reviews;
        SellerMetrics {
            kpis,
            commission_revenue,
            subscription_revenue,
            revenues,
            gross_profit,
        }
    }

    /// Attach revenue and gross profit to every row. Row order is kept.
    pub fn apply(&self, kpis: Vec<SellerKpis>, report: AggregationReport) -> SellerTable {
        let sellers: Vec<SellerMetrics> = kpis.into_iter().map(|k| self.price(k)).collect();
        let losing = sellers.iter().filter(|s| s.gross_profit < 0.0).count();
        log::info!(
            "priced {} sellers ({} with negative gross profit)",
            sellers.len(),
            losing
        );
        SellerTable { sellers, report }
    }
}
