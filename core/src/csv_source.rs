//! CSV raw source for the public marketplace exports.
//!
//! One file per record set. Columns are located by header name, so extra
//! columns and column order do not matter. A missing file or a missing
//! required column is a structural error; an unreadable row is skipped.

use crate::{
    error::{ImpactError, ImpactResult},
    raw::{OrderStatus, RawDataSource, RawDataset, RawOrder, RawOrderLineItem, RawReview, SellerProfile},
    types::{ORDERS_TABLE, ORDER_ITEMS_TABLE, REVIEWS_TABLE, SELLERS_TABLE},
};
use csv::StringRecord;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const SELLERS_FILE: &str = "olist_sellers_dataset.csv";
pub const ORDER_ITEMS_FILE: &str = "olist_order_items_dataset.csv";
pub const ORDERS_FILE: &str = "olist_orders_dataset.csv";
pub const REVIEWS_FILE: &str = "olist_order_reviews_dataset.csv";

/// A directory holding the four export files.
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    dir: PathBuf,
}

impl CsvDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn open(&self, table: &'static str, file: &str) -> ImpactResult<File> {
        let path = self.dir.join(file);
        if !path.is_file() {
            log::warn!("{table}: {} not found", path.display());
            return Err(ImpactError::MissingInput { table });
        }
        Ok(File::open(path)?)
    }
}

impl RawDataSource for CsvDirectory {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn load(&self) -> ImpactResult<RawDataset> {
        Ok(RawDataset {
            sellers: Some(read_sellers(self.open(SELLERS_TABLE, SELLERS_FILE)?)?),
            order_items: Some(read_order_items(self.open(ORDER_ITEMS_TABLE, ORDER_ITEMS_FILE)?)?),
            orders: Some(read_orders(self.open(ORDERS_TABLE, ORDERS_FILE)?)?),
            reviews: Some(read_reviews(self.open(REVIEWS_TABLE, REVIEWS_FILE)?)?),
        })
    }
}

// ── Column lookup ──────────────────────────────────────────────────

struct Columns {
    table: &'static str,
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(table: &'static str, headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase(), i))
            .collect();
        Self { table, index }
    }

    fn require(&self, name: &str) -> ImpactResult<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| ImpactError::MissingField {
                table: self.table,
                field: name.to_string(),
            })
    }
}

fn field(rec: &StringRecord, i: usize) -> Option<String> {
    rec.get(i)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number(rec: &StringRecord, i: usize) -> Option<f64> {
    rec.get(i)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|f| f.is_finite())
}

/// Iterate readable rows, skipping malformed ones. I/O errors still abort.
fn read_rows<R: Read, T>(
    table: &'static str,
    reader: R,
    mut parse: impl FnMut(&Columns, &StringRecord) -> Option<T>,
    required: &[&str],
) -> ImpactResult<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let columns = Columns::new(table, rdr.headers()?);
    for name in required {
        columns.require(name)?;
    }

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (row_i, rec) in rdr.records().enumerate() {
        let rec = match rec {
            Ok(rec) => rec,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                log::debug!("{table}: skipping row {}: {e}", row_i + 1);
                skipped += 1;
                continue;
            }
        };
        match parse(&columns, &rec) {
            Some(row) => rows.push(row),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        log::warn!("{table}: skipped {skipped} unreadable rows");
    }
    Ok(rows)
}

fn index(columns: &Columns, name: &str) -> usize {
    // Presence was checked up front by read_rows.
    columns.index.get(name).copied().unwrap_or(usize::MAX)
}

// ── Record sets ────────────────────────────────────────────────────

pub fn read_sellers<R: Read>(reader: R) -> ImpactResult<Vec<SellerProfile>> {
    read_rows(
        SELLERS_TABLE,
        reader,
        |c, rec| {
            Some(SellerProfile {
                seller_id: field(rec, index(c, "seller_id"))?,
                seller_city: field(rec, index(c, "seller_city")).unwrap_or_default(),
                seller_state: field(rec, index(c, "seller_state")).unwrap_or_default(),
            })
        },
        &["seller_id", "seller_city", "seller_state"],
    )
}

pub fn read_order_items<R: Read>(reader: R) -> ImpactResult<Vec<RawOrderLineItem>> {
    read_rows(
        ORDER_ITEMS_TABLE,
        reader,
        |c, rec| {
            Some(RawOrderLineItem {
                order_id: field(rec, index(c, "order_id"))?,
                seller_id: field(rec, index(c, "seller_id"))?,
                shipping_limit_date: field(rec, index(c, "shipping_limit_date")),
                price: number(rec, index(c, "price")),
            })
        },
        &["order_id", "seller_id", "shipping_limit_date", "price"],
    )
}

pub fn read_orders<R: Read>(reader: R) -> ImpactResult<Vec<RawOrder>> {
    read_rows(
        ORDERS_TABLE,
        reader,
        |c, rec| {
            Some(RawOrder {
                order_id: field(rec, index(c, "order_id"))?,
                status: OrderStatus::parse(&field(rec, index(c, "order_status")).unwrap_or_default()),
                purchase_timestamp: field(rec, index(c, "order_purchase_timestamp")),
                approved_timestamp: field(rec, index(c, "order_approved_at")),
                carrier_handoff_timestamp: field(rec, index(c, "order_delivered_carrier_date")),
                customer_delivery_timestamp: field(rec, index(c, "order_delivered_customer_date")),
            })
        },
        &[
            "order_id",
            "order_status",
            "order_purchase_timestamp",
            "order_approved_at",
            "order_delivered_carrier_date",
            "order_delivered_customer_date",
        ],
    )
}

pub fn read_reviews<R: Read>(reader: R) -> ImpactResult<Vec<RawReview>> {
    read_rows(
        REVIEWS_TABLE,
        reader,
        |c, rec| {
            Some(RawReview {
                order_id: field(rec, index(c, "order_id"))?,
                score: number(rec, index(c, "review_score")),
            })
        },
        &["order_id", "review_score"],
    )
}
