//! Error types for the book store, the analytics engine and config loading.

use thiserror::Error;

use crate::level::Side;

/// Which half of a `[price, quantity]` pair failed to parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelField {
    Price,
    Quantity,
}

impl std::fmt::Display for LevelField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelField::Price => f.write_str("price"),
            LevelField::Quantity => f.write_str("quantity"),
        }
    }
}

/// Errors raised while applying a snapshot to the book.
///
/// Any of these means the whole update was discarded and the previous
/// book state is still the authoritative one.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BookError {
    /// A price or quantity string is not a non-negative decimal number.
    #[error("invalid {field} {value:?} at {side} level {index}")]
    Parse {
        side: Side,
        index: usize,
        field: LevelField,
        value: String,
    },

    /// The raw payload is not a valid snapshot document.
    #[error("malformed update payload: {0}")]
    Malformed(String),
}

/// Errors raised by the analytics engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalyticsError {
    /// Requested quantity is zero, negative or not finite.
    #[error("invalid quantity {0}: must be a finite value > 0")]
    InvalidQuantity(f64),

    /// The metric has no meaning for the current book (e.g. zero mid price).
    #[error("undefined metric: {0}")]
    UndefinedMetric(&'static str),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}
