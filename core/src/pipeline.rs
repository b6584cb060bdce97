//! Seller aggregation pipeline: raw records to one KPI row per seller.
//!
//! STAGES (each a pure function over the raw tables):
//!   1. delivery_timing: delivered orders only; carrier delay and wait time
//!   2. active_dates: approved orders only; first/last sale, months
//!   3. volume: all line items; distinct orders and item count
//!   4. sales: all line items; sum of price
//!   5. review_outcomes: (order, seller) pairs joined to every review
//!
//! The stage results are then inner-joined on seller_id, starting from the
//! seller profiles, in the order above. A seller missing from any stage is
//! dropped from the output; nothing is zero-filled.

use crate::{
    config::{ProfitabilityModel, ReviewCostTable},
    error::ImpactResult,
    profitability::SellerTable,
    raw::{RawDataset, RawReview, RawTables, SellerProfile},
    timestamp,
    types::SellerId,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Aggregated KPIs for one seller, before any money is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerKpis {
    pub seller_id: SellerId,
    pub seller_city: String,
    pub seller_state: String,
    /// Mean late handoff to the carrier, in days. Early handoffs count as 0.
    /// `None` when every delivered row had an unparsable timestamp.
    pub delay_to_carrier: Option<f64>,
    /// Mean purchase-to-delivery time, in days. Signed.
    pub wait_time: Option<f64>,
    pub date_first_sale: NaiveDateTime,
    pub date_last_sale: NaiveDateTime,
    pub months_on_olist: u32,
    pub n_orders: u64,
    pub quantity: u64,
    pub quantity_per_order: f64,
    pub sales: f64,
    pub share_of_one_stars: f64,
    pub share_of_five_stars: f64,
    pub review_score: f64,
    pub cost_of_reviews: f64,
}

// ── Report ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputRows {
    pub sellers: usize,
    pub order_items: usize,
    pub orders: usize,
    pub reviews: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinStep {
    pub stage: String,
    pub sellers: usize,
}

/// What the pipeline saw and what it discarded. Data-quality problems land
/// here instead of aborting the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub input_rows: InputRows,
    /// Non-empty timestamp values that failed to parse, by field name.
    pub coerced_timestamps: BTreeMap<String, usize>,
    /// Joined (order, seller, review) rows dropped for a missing score.
    pub reviews_without_score: usize,
    /// Profile rows ignored because their seller_id was already seen.
    pub duplicate_profiles: usize,
    /// Population after each inner join, in join order.
    pub join_population: Vec<JoinStep>,
}

impl AggregationReport {
    fn parse_timestamp(&mut self, field: &'static str, raw: Option<&str>) -> Option<NaiveDateTime> {
        let parsed = timestamp::parse_lenient(raw);
        if parsed.is_none() && raw.is_some_and(|s| !s.trim().is_empty()) {
            *self.coerced_timestamps.entry(field.to_string()).or_default() += 1;
        }
        parsed
    }

    fn record_join(&mut self, stage: &str, sellers: usize) {
        log::debug!("after {stage} join: {sellers} sellers");
        self.join_population.push(JoinStep {
            stage: stage.to_string(),
            sellers,
        });
    }

    /// Population after the last join; the size of the final table.
    pub fn final_population(&self) -> usize {
        self.join_population.last().map(|s| s.sellers).unwrap_or(0)
    }
}

// ── Stage outputs ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeliveryTiming {
    pub delay_to_carrier: Option<f64>,
    pub wait_time: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveDates {
    pub date_first_sale: NaiveDateTime,
    pub date_last_sale: NaiveDateTime,
    pub months_on_olist: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume {
    pub n_orders: u64,
    pub quantity: u64,
}

impl Volume {
    pub fn quantity_per_order(&self) -> f64 {
        if self.n_orders == 0 {
            0.0
        } else {
            self.quantity as f64 / self.n_orders as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewOutcome {
    pub share_of_one_stars: f64,
    pub share_of_five_stars: f64,
    pub review_score: f64,
    pub cost_of_reviews: f64,
}

// ── Helpers ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct OrderTimes {
    purchase: Option<NaiveDateTime>,
    handoff: Option<NaiveDateTime>,
    delivery: Option<NaiveDateTime>,
}

/// Distinct (order_id, seller_id) pairs, sorted for stable iteration.
fn order_seller_pairs(tables: RawTables<'_>) -> BTreeSet<(&str, &str)> {
    tables
        .order_items
        .iter()
        .map(|i| (i.order_id.as_str(), i.seller_id.as_str()))
        .collect()
}

fn inner_join<L, R>(
    left: BTreeMap<SellerId, L>,
    mut right: BTreeMap<SellerId, R>,
) -> BTreeMap<SellerId, (L, R)> {
    left.into_iter()
        .filter_map(|(id, l)| {
            let r = right.remove(&id)?;
            Some((id, (l, r)))
        })
        .collect()
}

// ── Stages ─────────────────────────────────────────────────────────

/// Seller profiles keyed by seller_id. The first occurrence of an id wins.
pub fn seller_profiles(
    tables: RawTables<'_>,
    report: &mut AggregationReport,
) -> BTreeMap<SellerId, SellerProfile> {
    let mut profiles = BTreeMap::new();
    for profile in tables.sellers {
        match profiles.get(&profile.seller_id) {
            None => {
                profiles.insert(profile.seller_id.clone(), profile.clone());
            }
            Some(existing) => {
                report.duplicate_profiles += 1;
                if existing != profile {
                    log::warn!(
                        "seller {} has conflicting profiles; keeping {}/{}",
                        profile.seller_id,
                        existing.seller_city,
                        existing.seller_state
                    );
                }
            }
        }
    }
    profiles
}

/// Carrier delay and wait time per seller, over delivered orders only.
///
/// Every line item joined to a delivered order is one observation.
/// A seller with no delivered line item gets no entry at all.
/// Each timestamp is parsed once, so the report counts values, not joined rows.
pub fn delivery_timing(
    tables: RawTables<'_>,
    report: &mut AggregationReport,
) -> BTreeMap<SellerId, DeliveryTiming> {
    let mut delivered: HashMap<&str, Vec<OrderTimes>> = HashMap::new();
    for order in tables.orders.iter().filter(|o| o.status.is_delivered()) {
        let times = OrderTimes {
            purchase: report.parse_timestamp("purchase_timestamp", order.purchase_timestamp.as_deref()),
            handoff: report.parse_timestamp(
                "carrier_handoff_timestamp",
                order.carrier_handoff_timestamp.as_deref(),
            ),
            delivery: report.parse_timestamp(
                "customer_delivery_timestamp",
                order.customer_delivery_timestamp.as_deref(),
            ),
        };
        delivered.entry(order.order_id.as_str()).or_default().push(times);
    }

    let mut acc: BTreeMap<SellerId, (Mean, Mean)> = BTreeMap::new();
    for item in tables.order_items {
        let Some(orders) = delivered.get(item.order_id.as_str()) else {
            continue;
        };
        let shipping_limit =
            report.parse_timestamp("shipping_limit_date", item.shipping_limit_date.as_deref());

        let (delay, wait) = acc.entry(item.seller_id.clone()).or_default();
        for order in orders {
            if let (Some(handoff), Some(limit)) = (order.handoff, shipping_limit) {
                delay.push(timestamp::days_between(handoff, limit).max(0.0));
            }
            if let (Some(delivery), Some(purchase)) = (order.delivery, order.purchase) {
                wait.push(timestamp::days_between(delivery, purchase));
            }
        }
    }

    acc.into_iter()
        .map(|(seller, (delay, wait))| {
            (
                seller,
                DeliveryTiming {
                    delay_to_carrier: delay.value(),
                    wait_time: wait.value(),
                },
            )
        })
        .collect()
}

/// First and last approved sale per seller. Orders without a parseable
/// approval timestamp are ignored here and only here.
pub fn active_dates(
    tables: RawTables<'_>,
    report: &mut AggregationReport,
) -> BTreeMap<SellerId, ActiveDates> {
    let mut approvals: HashMap<&str, Vec<NaiveDateTime>> = HashMap::new();
    for order in tables.orders {
        if let Some(at) = report.parse_timestamp("approved_timestamp", order.approved_timestamp.as_deref()) {
            approvals.entry(order.order_id.as_str()).or_default().push(at);
        }
    }

    let mut bounds: BTreeMap<SellerId, (NaiveDateTime, NaiveDateTime)> = BTreeMap::new();
    for (order_id, seller_id) in order_seller_pairs(tables) {
        let Some(times) = approvals.get(order_id) else {
            continue;
        };
        for &at in times {
            bounds
                .entry(seller_id.to_string())
                .and_modify(|(first, last)| {
                    *first = (*first).min(at);
                    *last = (*last).max(at);
                })
                .or_insert((at, at));
        }
    }

    bounds
        .into_iter()
        .map(|(seller, (first, last))| {
            (
                seller,
                ActiveDates {
                    date_first_sale: first,
                    date_last_sale: last,
                    months_on_olist: timestamp::months_between(first, last),
                },
            )
        })
        .collect()
}

/// Distinct orders and line-item count per seller. No status filter.
pub fn volume(tables: RawTables<'_>) -> BTreeMap<SellerId, Volume> {
    let mut acc: BTreeMap<&str, (HashSet<&str>, u64)> = BTreeMap::new();
    for item in tables.order_items {
        let (orders, quantity) = acc.entry(item.seller_id.as_str()).or_default();
        orders.insert(item.order_id.as_str());
        *quantity += 1;
    }
    acc.into_iter()
        .map(|(seller, (orders, quantity))| {
            (
                seller.to_string(),
                Volume {
                    n_orders: orders.len() as u64,
                    quantity,
                },
            )
        })
        .collect()
}

/// Sum of line-item price per seller. Missing prices add nothing.
pub fn sales(tables: RawTables<'_>) -> BTreeMap<SellerId, f64> {
    let mut acc: BTreeMap<SellerId, f64> = BTreeMap::new();
    for item in tables.order_items {
        *acc.entry(item.seller_id.clone()).or_default() += item.price.unwrap_or(0.0);
    }
    acc
}

/// Star shares, mean score and review cost per seller.
///
/// Each distinct (order, seller) pair is joined to every review of the order,
/// so an order reviewed twice counts twice. Rows without a score are dropped.
pub fn review_outcomes(
    tables: RawTables<'_>,
    costs: &ReviewCostTable,
    report: &mut AggregationReport,
) -> BTreeMap<SellerId, ReviewOutcome> {
    let mut reviews: HashMap<&str, Vec<&RawReview>> = HashMap::new();
    for review in tables.reviews {
        reviews.entry(review.order_id.as_str()).or_default().push(review);
    }

    #[derive(Default)]
    struct Acc {
        rows: u64,
        ones: u64,
        fives: u64,
        score_sum: f64,
        cost: f64,
    }

    let mut acc: BTreeMap<SellerId, Acc> = BTreeMap::new();
    for (order_id, seller_id) in order_seller_pairs(tables) {
        let Some(order_reviews) = reviews.get(order_id) else {
            continue;
        };
        for review in order_reviews {
            let Some(score) = review.score.filter(|s| s.is_finite()) else {
                report.reviews_without_score += 1;
                continue;
            };
            let a = acc.entry(seller_id.to_string()).or_default();
            a.rows += 1;
            a.ones += u64::from(score == 1.0);
            a.fives += u64::from(score == 5.0);
            a.score_sum += score;
            a.cost += costs.cost_for(score);
        }
    }

    acc.into_iter()
        .map(|(seller, a)| {
            let n = a.rows as f64;
            (
                seller,
                ReviewOutcome {
                    share_of_one_stars: a.ones as f64 / n,
                    share_of_five_stars: a.fives as f64 / n,
                    review_score: a.score_sum / n,
                    cost_of_reviews: a.cost,
                },
            )
        })
        .collect()
}

// ── Pipeline ───────────────────────────────────────────────────────

/// Run every stage and inner-join the results on seller_id.
/// Output rows are ordered by seller_id.
pub fn aggregate_kpis(
    raw: &RawDataset,
    costs: &ReviewCostTable,
) -> ImpactResult<(Vec<SellerKpis>, AggregationReport)> {
    let tables = raw.tables()?;
    let mut report = AggregationReport {
        input_rows: InputRows {
            sellers: tables.sellers.len(),
            order_items: tables.order_items.len(),
            orders: tables.orders.len(),
            reviews: tables.reviews.len(),
        },
        ..AggregationReport::default()
    };

    let profiles = seller_profiles(tables, &mut report);
    let timing = delivery_timing(tables, &mut report);
    let dates = active_dates(tables, &mut report);
    let volume = volume(tables);
    let sales = sales(tables);
    let reviews = review_outcomes(tables, costs, &mut report);

    report.record_join("profiles", profiles.len());
    let joined = inner_join(profiles, timing);
    report.record_join("delivery_timing", joined.len());
    let joined = inner_join(joined, dates);
    report.record_join("active_dates", joined.len());
    let joined = inner_join(joined, volume);
    report.record_join("volume", joined.len());
    let joined = inner_join(joined, sales);
    report.record_join("sales", joined.len());
    let joined = inner_join(joined, reviews);
    report.record_join("review_outcomes", joined.len());

    let rows: Vec<SellerKpis> = joined
        .into_values()
        .map(|(((((profile, timing), dates), volume), sales), reviews)| SellerKpis {
            seller_id: profile.seller_id,
            seller_city: profile.seller_city,
            seller_state: profile.seller_state,
            delay_to_carrier: timing.delay_to_carrier,
            wait_time: timing.wait_time,
            date_first_sale: dates.date_first_sale,
            date_last_sale: dates.date_last_sale,
            months_on_olist: dates.months_on_olist,
            n_orders: volume.n_orders,
            quantity: volume.quantity,
            quantity_per_order: volume.quantity_per_order(),
            sales,
            share_of_one_stars: reviews.share_of_one_stars,
            share_of_five_stars: reviews.share_of_five_stars,
            review_score: reviews.review_score,
            cost_of_reviews: reviews.cost_of_reviews,
        })
        .collect();

    if !report.coerced_timestamps.is_empty() {
        log::warn!("coerced unparsable timestamps to missing: {:?}", report.coerced_timestamps);
    }
    if report.reviews_without_score > 0 {
        log::debug!("dropped {} review rows without a score", report.reviews_without_score);
    }
    log::info!(
        "aggregated {} sellers from {} profiles, {} line items, {} orders, {} reviews",
        rows.len(),
        report.input_rows.sellers,
        report.input_rows.order_items,
        report.input_rows.orders,
        report.input_rows.reviews
    );

    Ok((rows, report))
}

/// Aggregate the raw store and attach revenue and gross profit.
pub fn aggregate(raw: &RawDataset, model: &ProfitabilityModel) -> ImpactResult<SellerTable> {
    let (kpis, report) = aggregate_kpis(raw, &model.review_costs)?;
    Ok(model.apply(kpis, report))
}
