//! Synthetic marketplace dataset, a seeded stand-in for the raw store.
//!
//! Produces the same four record sets as the public exports, including the
//! awkward parts the pipeline has to survive: undelivered orders with empty
//! timestamps, orders without approval, malformed timestamp text, orders
//! split across sellers, orders reviewed twice and reviews without a score.
//! Same seed and shape ⇒ byte-identical dataset.

use crate::{
    error::ImpactResult,
    raw::{OrderStatus, RawDataSource, RawDataset, RawOrder, RawOrderLineItem, RawReview, SellerProfile},
    rng::{DatasetRng, Stream},
};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const PURCHASE_WINDOW_DAYS: i64 = 600;
const SHIPPING_LIMIT_DAYS: i64 = 6;

const CITIES: &[(&str, &str)] = &[
    ("sao paulo", "SP"),
    ("campinas", "SP"),
    ("rio de janeiro", "RJ"),
    ("belo horizonte", "MG"),
    ("curitiba", "PR"),
    ("porto alegre", "RS"),
    ("salvador", "BA"),
    ("goiania", "GO"),
];

const STATUSES: &[(&str, f64)] = &[
    ("delivered", 0.95),
    ("shipped", 0.02),
    ("canceled", 0.015),
    ("unavailable", 0.01),
    ("invoiced", 0.005),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetShape {
    pub sellers: usize,
    pub orders: usize,
    pub missing_approval_rate: f64,
    pub malformed_timestamp_rate: f64,
    pub multi_seller_rate: f64,
    pub unreviewed_rate: f64,
    pub second_review_rate: f64,
    pub missing_score_rate: f64,
}

impl Default for DatasetShape {
    fn default() -> Self {
        Self {
            sellers: 300,
            orders: 10_000,
            missing_approval_rate: 0.002,
            malformed_timestamp_rate: 0.001,
            multi_seller_rate: 0.02,
            unreviewed_rate: 0.01,
            second_review_rate: 0.005,
            missing_score_rate: 0.002,
        }
    }
}

/// Hidden traits that make sellers differ in profitability.
struct SellerTraits {
    lateness: f64,
    price_floor: f64,
    popularity: f64,
}

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub seed: u64,
    pub shape: DatasetShape,
}

impl SyntheticSource {
    pub fn new(seed: u64, shape: DatasetShape) -> Self {
        Self { seed, shape }
    }

    pub fn generate(&self) -> RawDataset {
        let shape = &self.shape;
        let mut seller_rng = DatasetRng::new(self.seed, Stream::Sellers);
        let mut order_rng = DatasetRng::new(self.seed, Stream::Orders);
        let mut item_rng = DatasetRng::new(self.seed, Stream::Items);
        let mut review_rng = DatasetRng::new(self.seed, Stream::Reviews);
        let mut corrupt_rng = DatasetRng::new(self.seed, Stream::Corruption);

        let mut sellers = Vec::with_capacity(shape.sellers);
        let mut traits = Vec::with_capacity(shape.sellers);
        for _ in 0..shape.sellers {
            let (city, state) = CITIES[seller_rng.next_u64_below(CITIES.len() as u64) as usize];
            sellers.push(SellerProfile {
                seller_id: seller_rng.hex_id(),
                seller_city: city.to_string(),
                seller_state: state.to_string(),
            });
            traits.push(SellerTraits {
                lateness: seller_rng.next_f64().powi(3),
                price_floor: 10.0 + seller_rng.next_f64() * 90.0,
                popularity: seller_rng.pareto(1.0, 1.2),
            });
        }
        let popularity: Vec<f64> = traits.iter().map(|t| t.popularity).collect();

        let epoch = NaiveDate::from_ymd_opt(2017, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        let status_weights: Vec<f64> = STATUSES.iter().map(|(_, w)| *w).collect();

        let mut orders = Vec::with_capacity(shape.orders);
        let mut items = Vec::new();
        let mut reviews = Vec::new();

        for _ in 0..shape.orders {
            if sellers.is_empty() {
                break;
            }
            let order_id = order_rng.hex_id();
            let status = OrderStatus::parse(STATUSES[order_rng.weighted(&status_weights)].0);
            let purchase = epoch + TimeDelta::seconds(order_rng.between(0, PURCHASE_WINDOW_DAYS * 86_400));

            let lead = order_rng.weighted(&popularity);
            let lateness = traits[lead].lateness;

            let approved = (!order_rng.chance(shape.missing_approval_rate))
                .then(|| purchase + TimeDelta::minutes(order_rng.between(5, 2 * 24 * 60)));
            let shipping_limit = purchase + TimeDelta::days(SHIPPING_LIMIT_DAYS);

            let handoff_hours = order_rng.between(12, 72 + (lateness * 240.0) as i64);
            let handoff = match status {
                OrderStatus::Delivered | OrderStatus::Shipped => {
                    Some(purchase + TimeDelta::hours(handoff_hours))
                }
                _ => None,
            };
            let delivery = match (&status, handoff) {
                (OrderStatus::Delivered, Some(h)) => {
                    Some(h + TimeDelta::hours(order_rng.between(48, 20 * 24)))
                }
                _ => None,
            };

            orders.push(RawOrder {
                order_id: order_id.clone(),
                status: status.clone(),
                purchase_timestamp: Some(fmt(purchase)),
                approved_timestamp: approved.map(fmt),
                carrier_handoff_timestamp: handoff.map(fmt),
                customer_delivery_timestamp: delivery.map(fmt),
            });
            if let Some(order) = orders.last_mut() {
                corrupt(&mut corrupt_rng, shape.malformed_timestamp_rate, &mut order.carrier_handoff_timestamp);
                corrupt(&mut corrupt_rng, shape.malformed_timestamp_rate, &mut order.approved_timestamp);
            }

            let n_items = 1 + item_rng.weighted(&[0.85, 0.10, 0.05]);
            let mut seller_idx = lead;
            for _ in 0..n_items {
                if item_rng.chance(shape.multi_seller_rate) {
                    seller_idx = item_rng.weighted(&popularity);
                }
                let price = item_rng.pareto(traits[seller_idx].price_floor, 2.2);
                let mut shipping_limit_date = Some(fmt(shipping_limit));
                corrupt(&mut corrupt_rng, shape.malformed_timestamp_rate, &mut shipping_limit_date);
                items.push(RawOrderLineItem {
                    order_id: order_id.clone(),
                    seller_id: sellers[seller_idx].seller_id.clone(),
                    shipping_limit_date,
                    price: Some((price * 100.0).round() / 100.0),
                });
            }

            if review_rng.chance(shape.unreviewed_rate) {
                continue;
            }
            let n_reviews = if review_rng.chance(shape.second_review_rate) { 2 } else { 1 };
            for _ in 0..n_reviews {
                let score = if review_rng.chance(shape.missing_score_rate) {
                    None
                } else {
                    Some(draw_score(&mut review_rng, &status, handoff, shipping_limit, lateness))
                };
                reviews.push(RawReview {
                    order_id: order_id.clone(),
                    score,
                });
            }
        }

        log::debug!(
            "synthetic dataset seed={}: {} sellers, {} orders, {} items, {} reviews",
            self.seed,
            sellers.len(),
            orders.len(),
            items.len(),
            reviews.len()
        );

        RawDataset {
            sellers: Some(sellers),
            order_items: Some(items),
            orders: Some(orders),
            reviews: Some(reviews),
        }
    }
}

impl RawDataSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn load(&self) -> ImpactResult<RawDataset> {
        Ok(self.generate())
    }
}

fn fmt(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn corrupt(rng: &mut DatasetRng, rate: f64, field: &mut Option<String>) {
    if field.is_some() && rng.chance(rate) {
        let garbage = if rng.chance(0.5) { "not-a-date" } else { "2018-02-30 25:61:00" };
        *field = Some(garbage.to_string());
    }
}

/// Late and undelivered orders skew towards one star.
fn draw_score(
    rng: &mut DatasetRng,
    status: &OrderStatus,
    handoff: Option<NaiveDateTime>,
    shipping_limit: NaiveDateTime,
    lateness: f64,
) -> f64 {
    let late = handoff.is_some_and(|h| h > shipping_limit);
    let weights: [f64; 5] = if !status.is_delivered() {
        [0.70, 0.10, 0.10, 0.05, 0.05]
    } else if late {
        [0.35, 0.12, 0.18, 0.15, 0.20]
    } else {
        let bad = 0.06 + 0.2 * lateness;
        [bad, 0.03, 0.08, 0.20, 0.63 - bad]
    };
    (rng.weighted(&weights) + 1) as f64
}
