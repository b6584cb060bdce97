use rusqlite::Connection;
use seller_impact_core::{
    config::ProfitabilityModel,
    csv_source::{
        read_order_items, read_orders, read_reviews, read_sellers, CsvDirectory, ORDERS_FILE,
        ORDER_ITEMS_FILE, REVIEWS_FILE, SELLERS_FILE,
    },
    error::ImpactError,
    pipeline::aggregate,
    raw::{OrderStatus, RawDataSource},
    store::RawStore,
    synthetic::{DatasetShape, SyntheticSource},
};
use std::fs;
use std::path::PathBuf;

// ── Helpers ──────────────────────────────────────────────────────────────────

const SELLERS_CSV: &str = "\u{feff}seller_id,seller_zip_code_prefix,seller_city,seller_state
s1,13023,campinas,SP
,99999,nowhere,XX
";

const ORDER_ITEMS_CSV: &str = "order_id,order_item_id,product_id,seller_id,shipping_limit_date,price,freight_value
o1,1,p1,s1,2018-01-05 10:00:00,12.50,3.10
o1,2,p2,s1,2018-01-05 10:00:00,n/a,3.10
";

const ORDERS_CSV: &str = "order_id,customer_id,order_status,order_purchase_timestamp,order_approved_at,order_delivered_carrier_date,order_delivered_customer_date,order_estimated_delivery_date
o1,c1,delivered,2018-01-01 10:00:00,2018-01-01 12:00:00,2018-01-03 10:00:00,2018-01-08 10:00:00,2018-01-20 00:00:00
o2,c2,canceled,2018-01-02 10:00:00,,,,2018-01-20 00:00:00
";

const REVIEWS_CSV: &str = "review_id,order_id,review_score,review_comment_title,review_comment_message
r1,o1,4,,\"chegou rapido
recomendo\"
r2,o1,,,
";

fn shared_memory_uri(name: &str) -> String {
    format!("file:{name}?mode=memory&cache=shared")
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("seller-impact-{name}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

// ── SQLite ───────────────────────────────────────────────────────────────────

#[test]
fn sqlite_round_trip_preserves_the_dataset() {
    let shape = DatasetShape {
        sellers: 40,
        orders: 800,
        ..DatasetShape::default()
    };
    let raw = SyntheticSource::new(9, shape).generate();

    let mut store = RawStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.insert_dataset(&raw).unwrap();
    let loaded = store.load().unwrap();

    assert_eq!(loaded.sellers, raw.sellers);
    assert_eq!(loaded.order_items, raw.order_items);
    assert_eq!(loaded.orders, raw.orders);
    assert_eq!(loaded.reviews, raw.reviews);

    let model = ProfitabilityModel::default();
    assert_eq!(
        aggregate(&loaded, &model).unwrap(),
        aggregate(&raw, &model).unwrap()
    );
}

#[test]
fn sqlite_missing_table_is_reported() {
    let store = RawStore::in_memory().unwrap();
    match store.load() {
        Err(ImpactError::MissingInput { table }) => assert_eq!(table, "sellers"),
        other => panic!("expected MissingInput, got {other:?}"),
    }
}

#[test]
fn sqlite_missing_column_is_reported() {
    let uri = shared_memory_uri("impact_missing_column");
    let setup = Connection::open(&uri).unwrap();
    setup
        .execute_batch(
            "CREATE TABLE sellers (seller_id TEXT, seller_city TEXT, seller_state TEXT);
             CREATE TABLE order_items (order_id TEXT, seller_id TEXT, shipping_limit_date TEXT);",
        )
        .unwrap();

    let store = RawStore::open(&uri).unwrap();
    match store.load() {
        Err(ImpactError::MissingField { table, field }) => {
            assert_eq!(table, "order_items");
            assert_eq!(field, "price");
        }
        other => panic!("expected MissingField, got {other:?}"),
    }
    drop(setup);
}

/// Numbers stored as text are read back as numbers; junk becomes missing.
#[test]
fn sqlite_values_are_coerced_leniently() {
    let uri = shared_memory_uri("impact_lenient_values");
    let setup = Connection::open(&uri).unwrap();
    let store = RawStore::open(&uri).unwrap();
    store.migrate().unwrap();

    setup
        .execute_batch(
            "INSERT INTO sellers (seller_id, seller_city, seller_state) VALUES ('s1', 'campinas', 'SP');
             INSERT INTO orders (order_id, order_status, order_purchase_timestamp, order_approved_at,
                                 order_delivered_carrier_date, order_delivered_customer_date)
             VALUES ('o1', 'delivered', '2018-01-01 10:00:00', '2018-01-01 12:00:00',
                     '2018-01-03 10:00:00', '2018-01-08 10:00:00');
             INSERT INTO order_items (order_id, seller_id, shipping_limit_date, price)
             VALUES ('o1', 's1', '2018-01-05 10:00:00', '12.5'),
                    ('o1', 's1', '2018-01-05 10:00:00', 'n/a');
             INSERT INTO order_reviews (order_id, review_score) VALUES ('o1', '4'), ('o1', NULL);",
        )
        .unwrap();

    let raw = store.load().unwrap();
    let prices: Vec<Option<f64>> = raw.order_items.iter().flatten().map(|i| i.price).collect();
    assert_eq!(prices, vec![Some(12.5), None]);
    let scores: Vec<Option<f64>> = raw.reviews.iter().flatten().map(|r| r.score).collect();
    assert_eq!(scores, vec![Some(4.0), None]);

    let table = aggregate(&raw, &ProfitabilityModel::default()).unwrap();
    let s1 = table.get("s1").expect("seller s1");
    assert_eq!(s1.kpis.sales, 12.5);
    assert_eq!(s1.kpis.quantity, 2);
    drop(setup);
}

// ── CSV ──────────────────────────────────────────────────────────────────────

#[test]
fn csv_readers_locate_columns_by_header() {
    let sellers = read_sellers(SELLERS_CSV.as_bytes()).unwrap();
    assert_eq!(sellers.len(), 1, "row without seller_id is skipped");
    assert_eq!(sellers[0].seller_id, "s1");
    assert_eq!(sellers[0].seller_city, "campinas");

    let items = read_order_items(ORDER_ITEMS_CSV.as_bytes()).unwrap();
    let prices: Vec<Option<f64>> = items.iter().map(|i| i.price).collect();
    assert_eq!(prices, vec![Some(12.5), None]);

    let orders = read_orders(ORDERS_CSV.as_bytes()).unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].status, OrderStatus::Delivered);
    assert_eq!(orders[1].status, OrderStatus::Canceled);
    assert_eq!(orders[1].approved_timestamp, None);

    let reviews = read_reviews(REVIEWS_CSV.as_bytes()).unwrap();
    let scores: Vec<Option<f64>> = reviews.iter().map(|r| r.score).collect();
    assert_eq!(scores, vec![Some(4.0), None]);
}

#[test]
fn csv_missing_column_is_reported() {
    let csv = "order_id,order_status,order_purchase_timestamp\no1,delivered,2018-01-01 10:00:00\n";
    match read_orders(csv.as_bytes()) {
        Err(ImpactError::MissingField { table, field }) => {
            assert_eq!(table, "orders");
            assert_eq!(field, "order_approved_at");
        }
        other => panic!("expected MissingField, got {other:?}"),
    }
}

#[test]
fn csv_directory_loads_all_four_exports() {
    let dir = temp_dir("csv-full");
    fs::write(dir.join(SELLERS_FILE), SELLERS_CSV).unwrap();
    fs::write(dir.join(ORDER_ITEMS_FILE), ORDER_ITEMS_CSV).unwrap();
    fs::write(dir.join(ORDERS_FILE), ORDERS_CSV).unwrap();
    fs::write(dir.join(REVIEWS_FILE), REVIEWS_CSV).unwrap();

    let source = CsvDirectory::new(&dir);
    assert_eq!(source.name(), "csv");
    let raw = source.load().unwrap();
    let table = aggregate(&raw, &ProfitabilityModel::default()).unwrap();

    assert_eq!(table.len(), 1);
    let s1 = table.get("s1").expect("seller s1");
    assert_eq!(s1.kpis.n_orders, 1);
    assert_eq!(s1.kpis.review_score, 4.0);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn csv_directory_reports_missing_files() {
    let dir = temp_dir("csv-partial");
    fs::write(dir.join(SELLERS_FILE), SELLERS_CSV).unwrap();

    match CsvDirectory::new(&dir).load() {
        Err(ImpactError::MissingInput { table }) => assert_eq!(table, "order_items"),
        other => panic!("expected MissingInput, got {other:?}"),
    }
    fs::remove_dir_all(&dir).ok();
}
