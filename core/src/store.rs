//! SQLite raw store.
//!
//! RULE: Only store.rs talks to the database.
//! The pipeline receives plain records; it never executes SQL.
//!
//! Reads are lenient about storage classes: a score stored as text or a
//! timestamp stored as a number is coerced, and anything unusable becomes
//! missing. Absent tables and columns are structural errors.

use crate::{
    error::{ImpactError, ImpactResult},
    raw::{OrderStatus, RawDataSource, RawDataset, RawOrder, RawOrderLineItem, RawReview, SellerProfile},
    types::{ORDERS_TABLE, ORDER_ITEMS_TABLE, REVIEWS_TABLE, SELLERS_TABLE},
};
use rusqlite::{params, types::Value, Connection, OpenFlags};
use std::path::Path;

pub struct RawStore {
    conn: Connection,
}

impl RawStore {
    /// Open (or create) the raw database at `path`.
    pub fn open(path: impl AsRef<Path>) -> ImpactResult<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Open an existing database without write access.
    pub fn open_read_only(path: impl AsRef<Path>) -> ImpactResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ImpactResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Create the four raw tables if they do not exist.
    pub fn migrate(&self) -> ImpactResult<()> {
        self.conn
            .execute_batch(include_str!("../migrations/001_raw_tables.sql"))?;
        Ok(())
    }

    // ── Schema checks ──────────────────────────────────────────

    fn require_columns(&self, table: &'static str, columns: &[&str]) -> ImpactResult<()> {
        let mut stmt = self.conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
        let present = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        if present.is_empty() {
            return Err(ImpactError::MissingInput { table });
        }
        for column in columns {
            if !present.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                return Err(ImpactError::MissingField {
                    table,
                    field: column.to_string(),
                });
            }
        }
        Ok(())
    }

    // ── Record sets ────────────────────────────────────────────

    pub fn sellers(&self) -> ImpactResult<Vec<SellerProfile>> {
        self.require_columns(SELLERS_TABLE, &["seller_id", "seller_city", "seller_state"])?;
        let mut stmt = self
            .conn
            .prepare("SELECT seller_id, seller_city, seller_state FROM sellers")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SellerProfile {
                    seller_id: text(row.get(0)?).unwrap_or_default(),
                    seller_city: text(row.get(1)?).unwrap_or_default(),
                    seller_state: text(row.get(2)?).unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn order_items(&self) -> ImpactResult<Vec<RawOrderLineItem>> {
        self.require_columns(
            ORDER_ITEMS_TABLE,
            &["order_id", "seller_id", "shipping_limit_date", "price"],
        )?;
        let mut stmt = self.conn.prepare(
            "SELECT order_id, seller_id, shipping_limit_date, price FROM order_items",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RawOrderLineItem {
                    order_id: text(row.get(0)?).unwrap_or_default(),
                    seller_id: text(row.get(1)?).unwrap_or_default(),
                    shipping_limit_date: text(row.get(2)?),
                    price: number(row.get(3)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn orders(&self) -> ImpactResult<Vec<RawOrder>> {
        self.require_columns(
            ORDERS_TABLE,
            &[
                "order_id",
                "order_status",
                "order_purchase_timestamp",
                "order_approved_at",
                "order_delivered_carrier_date",
                "order_delivered_customer_date",
            ],
        )?;
        let mut stmt = self.conn.prepare(
            "SELECT order_id, order_status, order_purchase_timestamp, order_approved_at,
                    order_delivered_carrier_date, order_delivered_customer_date
             FROM orders",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RawOrder {
                    order_id: text(row.get(0)?).unwrap_or_default(),
                    status: OrderStatus::parse(&text(row.get(1)?).unwrap_or_default()),
                    purchase_timestamp: text(row.get(2)?),
                    approved_timestamp: text(row.get(3)?),
                    carrier_handoff_timestamp: text(row.get(4)?),
                    customer_delivery_timestamp: text(row.get(5)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn reviews(&self) -> ImpactResult<Vec<RawReview>> {
        self.require_columns(REVIEWS_TABLE, &["order_id", "review_score"])?;
        let mut stmt = self
            .conn
            .prepare("SELECT order_id, review_score FROM order_reviews")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RawReview {
                    order_id: text(row.get(0)?).unwrap_or_default(),
                    score: number(row.get(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Bulk insert ────────────────────────────────────────────

    /// Insert every present record set in a single transaction.
    pub fn insert_dataset(&mut self, raw: &RawDataset) -> ImpactResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sellers (seller_id, seller_city, seller_state) VALUES (?1, ?2, ?3)",
            )?;
            for s in raw.sellers.iter().flatten() {
                stmt.execute(params![s.seller_id, s.seller_city, s.seller_state])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO order_items (order_id, seller_id, shipping_limit_date, price)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for i in raw.order_items.iter().flatten() {
                stmt.execute(params![i.order_id, i.seller_id, i.shipping_limit_date, i.price])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO orders (order_id, order_status, order_purchase_timestamp,
                                     order_approved_at, order_delivered_carrier_date,
                                     order_delivered_customer_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for o in raw.orders.iter().flatten() {
                stmt.execute(params![
                    o.order_id,
                    o.status.as_str(),
                    o.purchase_timestamp,
                    o.approved_timestamp,
                    o.carrier_handoff_timestamp,
                    o.customer_delivery_timestamp,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO order_reviews (order_id, review_score) VALUES (?1, ?2)",
            )?;
            for r in raw.reviews.iter().flatten() {
                stmt.execute(params![r.order_id, r.score])?;
            }
        }
        tx.commit()?;
        log::debug!("raw dataset inserted");
        Ok(())
    }
}

impl RawDataSource for RawStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn load(&self) -> ImpactResult<RawDataset> {
        Ok(RawDataset {
            sellers: Some(self.sellers()?),
            order_items: Some(self.order_items()?),
            orders: Some(self.orders()?),
            reviews: Some(self.reviews()?),
        })
    }
}

fn text(value: Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Null | Value::Blob(_) => None,
    }
}

fn number(value: Value) -> Option<f64> {
    let n = match value {
        Value::Integer(i) => Some(i as f64),
        Value::Real(f) => Some(f),
        Value::Text(s) => s.trim().parse().ok(),
        Value::Null | Value::Blob(_) => None,
    };
    n.filter(|f| f.is_finite())
}
