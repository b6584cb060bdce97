//! Seller impact: per-seller profitability and "what if we dropped the
//! worst sellers" scenarios over a marketplace order history.

pub mod config;
pub mod csv_source;
pub mod error;
pub mod pipeline;
pub mod profitability;
pub mod raw;
pub mod rng;
pub mod scenario;
pub mod session;
pub mod store;
pub mod synthetic;
pub mod timestamp;
pub mod types;

pub use config::ImpactConfig;
pub use error::{ImpactError, ImpactResult};
pub use profitability::{SellerMetrics, SellerTable};
pub use raw::{RawDataSource, RawDataset};
pub use scenario::ScenarioEngine;
pub use session::ImpactSession;
