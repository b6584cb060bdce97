//! Raw record sets delivered by the Raw Data Store.
//!
//! RULE: The pipeline reads raw data only through `RawDataSource`.
//! Adapters (CSV, SQLite, synthetic, in-memory) differ in where the
//! records come from, never in what they contain.

use crate::{
    error::{ImpactError, ImpactResult},
    types::{OrderId, SellerId, ORDERS_TABLE, ORDER_ITEMS_TABLE, REVIEWS_TABLE, SELLERS_TABLE},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an order. Only `Delivered` feeds timing metrics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Approved,
    Invoiced,
    Processing,
    Shipped,
    Delivered,
    Canceled,
    Unavailable,
    Other(String),
}

impl OrderStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "approved" => Self::Approved,
            "invoiced" => Self::Invoiced,
            "processing" => Self::Processing,
            "shipped" => Self::Shipped,
            "delivered" => Self::Delivered,
            "canceled" | "cancelled" => Self::Canceled,
            "unavailable" => Self::Unavailable,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Approved => "approved",
            Self::Invoiced => "invoiced",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Canceled => "canceled",
            Self::Unavailable => "unavailable",
            Self::Other(s) => s,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerProfile {
    pub seller_id: SellerId,
    pub seller_city: String,
    pub seller_state: String,
}

/// One line item of an order. An order with three items has three rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOrderLineItem {
    pub order_id: OrderId,
    pub seller_id: SellerId,
    pub shipping_limit_date: Option<String>,
    /// `None` when the store held no parseable amount.
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOrder {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub purchase_timestamp: Option<String>,
    pub approved_timestamp: Option<String>,
    pub carrier_handoff_timestamp: Option<String>,
    pub customer_delivery_timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReview {
    pub order_id: OrderId,
    pub score: Option<f64>,
}

/// The four record sets. `None` means the set is absent altogether,
/// which is a structural error; an empty `Vec` is a legal, empty input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDataset {
    pub sellers: Option<Vec<SellerProfile>>,
    pub order_items: Option<Vec<RawOrderLineItem>>,
    pub orders: Option<Vec<RawOrder>>,
    pub reviews: Option<Vec<RawReview>>,
}

/// Borrowed view of a dataset whose four record sets are all present.
#[derive(Debug, Clone, Copy)]
pub struct RawTables<'a> {
    pub sellers: &'a [SellerProfile],
    pub order_items: &'a [RawOrderLineItem],
    pub orders: &'a [RawOrder],
    pub reviews: &'a [RawReview],
}

impl RawDataset {
    /// A dataset with all four record sets present and empty.
    pub fn empty() -> Self {
        Self {
            sellers: Some(Vec::new()),
            order_items: Some(Vec::new()),
            orders: Some(Vec::new()),
            reviews: Some(Vec::new()),
        }
    }

    /// Check that every record set is present.
    /// Reports the first missing set in pipeline order.
    pub fn tables(&self) -> ImpactResult<RawTables<'_>> {
        Ok(RawTables {
            sellers: self
                .sellers
                .as_deref()
                .ok_or(ImpactError::MissingInput { table: SELLERS_TABLE })?,
            order_items: self
                .order_items
                .as_deref()
                .ok_or(ImpactError::MissingInput { table: ORDER_ITEMS_TABLE })?,
            orders: self
                .orders
                .as_deref()
                .ok_or(ImpactError::MissingInput { table: ORDERS_TABLE })?,
            reviews: self
                .reviews
                .as_deref()
                .ok_or(ImpactError::MissingInput { table: REVIEWS_TABLE })?,
        })
    }
}

/// The contract every raw data adapter fulfills.
pub trait RawDataSource {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Read the four record sets. Called once per refresh.
    fn load(&self) -> ImpactResult<RawDataset>;
}

impl RawDataSource for RawDataset {
    fn name(&self) -> &'static str {
        "in_memory"
    }

    fn load(&self) -> ImpactResult<RawDataset> {
        Ok(self.clone())
    }
}

impl<T: RawDataSource + ?Sized> RawDataSource for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn load(&self) -> ImpactResult<RawDataset> {
        (**self).load()
    }
}
