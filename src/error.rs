use thiserror::Error;

#[derive(Error, Debug)]
pub enum PennyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Validation errors: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Unknown record: {0}")]
    UnknownRecord(i64),

    #[error("Background filtering failed: {0}")]
    Worker(String),

    #[error("Filter job was superseded by a newer request")]
    Superseded,

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PennyError>;
