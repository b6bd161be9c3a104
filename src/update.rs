//! Inbound feed types.
//!
//! The transport hands the core one [`FeedMessage`] per wire event over an
//! ordered channel. Snapshot payloads keep prices and quantities as the
//! strings the exchange sent; they are only turned into numbers by
//! [`BookUpdate::parse`], which either parses everything or nothing.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{BookError, LevelField};
use crate::level::{Ladder, PriceLevel, Side};

/// A `[price, quantity]` pair exactly as it appeared on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RawLevel(pub String, pub String);

impl RawLevel {
    pub fn new(price: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self(price.into(), quantity.into())
    }
}

/// Full-replacement L2 snapshot for one instrument.
///
/// ```json
/// {"timestamp": "2025-05-04T10:39:13Z", "exchange": "OKX",
///  "symbol": "BTC-USDT-SWAP",
///  "bids": [["95445.4", "1.5"]], "asks": [["95445.5", "9.06"]]}
/// ```
///
/// Only `bids` and `asks` are required.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct BookUpdate {
    pub bids: Vec<RawLevel>,
    pub asks: Vec<RawLevel>,
    /// Exchange-side timestamp, kept raw (RFC 3339 when present)
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// Both ladders of a snapshot after a successful parse.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedSnapshot {
    pub bids: Ladder,
    pub asks: Ladder,
}

impl BookUpdate {
    /// Build an update from `(price, quantity)` string pairs.
    pub fn from_pairs<S: AsRef<str>>(bids: &[(S, S)], asks: &[(S, S)]) -> Self {
        let raw = |pairs: &[(S, S)]| -> Vec<RawLevel> {
            pairs
                .iter()
                .map(|(p, q)| RawLevel::new(p.as_ref(), q.as_ref()))
                .collect()
        };
        Self {
            bids: raw(bids),
            asks: raw(asks),
            ..Self::default()
        }
    }

    /// Decode a raw JSON payload.
    pub fn from_json(payload: &str) -> Result<Self, BookError> {
        serde_json::from_str(payload).map_err(|e| BookError::Malformed(e.to_string()))
    }

    /// Exchange timestamp, if present and well formed.
    pub fn exchange_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Parse both sides into sorted ladders.
    ///
    /// Fails on the first value that is not a non-negative decimal; no
    /// partially parsed result is ever returned.
    pub fn parse(&self) -> Result<ParsedSnapshot, BookError> {
        let bids = parse_side(Side::Bid, &self.bids)?;
        let asks = parse_side(Side::Ask, &self.asks)?;
        Ok(ParsedSnapshot {
            bids: Ladder::from_levels(Side::Bid, bids),
            asks: Ladder::from_levels(Side::Ask, asks),
        })
    }
}

fn parse_side(side: Side, raw: &[RawLevel]) -> Result<Vec<PriceLevel>, BookError> {
    raw.iter()
        .enumerate()
        .map(|(index, RawLevel(price, qty))| -> Result<PriceLevel, BookError> {
            let err = |field: LevelField, value: &str| BookError::Parse {
                side,
                index,
                field,
                value: value.to_string(),
            };
            let price = parse_non_negative(price)
                .ok_or_else(|| err(LevelField::Price, price.as_str()))?;
            let quantity = parse_non_negative(qty)
                .ok_or_else(|| err(LevelField::Quantity, qty.as_str()))?;
            Ok(PriceLevel::new(price, quantity))
        })
        .collect()
}

/// Parse a decimal string (plain or scientific notation) into a finite,
/// non-negative `f64`.
///
/// Plain literals that fit a `Decimal` go through `rust_decimal`; anything
/// outside its 28-digit range, or that it would round to zero, is parsed as
/// `f64` instead. A minus sign is only accepted on zero.
pub fn parse_non_negative(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let mantissa = decimal_mantissa(raw)?;
    let non_zero = mantissa.bytes().any(|b| matches!(b, b'1'..=b'9'));
    if raw.starts_with('-') && non_zero {
        return None;
    }

    let exact = if mantissa.len() == raw.len() {
        Decimal::from_str(raw)
            .ok()
            .filter(|d| !(d.is_zero() && non_zero))
            .and_then(|d| d.to_f64())
    } else {
        None
    };
    let value = match exact {
        Some(v) => v,
        None => raw.parse::<f64>().ok()?,
    };
    Some(value.abs()).filter(|v| v.is_finite())
}

/// Check `[+-]digits[.digits][(e|E)[+-]digits]` and return the part before
/// the exponent. At least one mantissa digit is required.
fn decimal_mantissa(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let mut digits = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }

    let end = i;
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return None;
        }
    }

    (i == bytes.len()).then(|| &raw[..end])
}

/// Messages delivered by the transport, in wire order.
#[derive(Clone, Debug, PartialEq)]
pub enum FeedMessage {
    /// A new full snapshot
    Update(BookUpdate),
    /// The connection ended; no further messages will follow
    ConnectionClosed,
    /// The transport hit an error it could not handle itself
    Error(String),
}
