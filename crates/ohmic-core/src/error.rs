//! Error types for ohmic-core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: String, value: f64 },
}

pub type Result<T> = std::result::Result<T, Error>;
