use std::num::ParseIntError;
use thiserror::Error;

/// Errors produced by the buffer, parser and consumer layers.
#[derive(Error, Debug)]
pub enum TsError {
    /// I/O failure in a byte source or config file
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A read ran past the buffered data
    #[error("insufficient data: needed {needed} bits, {available} available")]
    InsufficientData { needed: usize, available: usize },

    /// Malformed header or out-of-range field
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    #[error("engine error: {0}")]
    Engine(String),
}

impl TsError {
    /// True for the "wait for more bytes" condition, which is never fatal.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, TsError::InsufficientData { .. })
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TsError>;
