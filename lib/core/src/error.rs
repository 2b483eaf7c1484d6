use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid boost amount {amount}: boost must be a finite number greater than 1.0")]
    InvalidBoost { amount: f64 },

    #[error("Invalid deboost amount {amount}: deboost must be between 0.0 and 1.0 (exclusive)")]
    InvalidDeboost { amount: f64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
