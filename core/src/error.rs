use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImpactError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Required input record set '{table}' is missing")]
    MissingInput { table: &'static str },

    #[error("Record set '{table}' has no column '{field}'")]
    MissingField { table: &'static str, field: String },

    #[error("Seller table generation lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ImpactResult<T> = Result<T, ImpactError>;
