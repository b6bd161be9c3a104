//! Configuration for the analytics model and the feed loop.
//!
//! Every section has a `Default` matching the reference model, so a config
//! file only needs the keys it overrides:
//!
//! ```json
//! {"symbol": "ETH-USDT-SWAP", "analytics": {"eta": 0.05}}
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

/// Parameters of the cost models.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Temporary-impact coefficient (Almgren-Chriss eta)
    pub eta: f64,
    /// Permanent-impact coefficient (Almgren-Chriss gamma)
    pub gamma: f64,
    /// Slope of the maker/taker logistic
    pub maker_taker_sensitivity: f64,
    /// Normalized spread at which the logistic crosses 0.5
    pub maker_taker_threshold: f64,
    /// Flat fee per unit of quantity
    pub fee_rate: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            eta: 0.1,
            gamma: 0.1,
            maker_taker_sensitivity: 10.0,
            maker_taker_threshold: 0.001,
            fee_rate: 0.001,
        }
    }
}

impl AnalyticsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("eta", self.eta),
            ("gamma", self.gamma),
            ("maker_taker_threshold", self.maker_taker_threshold),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "{name} must be a finite value >= 0, got {value}"
                )));
            }
        }
        if !self.maker_taker_sensitivity.is_finite() || self.maker_taker_sensitivity <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "maker_taker_sensitivity must be a finite value > 0, got {}",
                self.maker_taker_sensitivity
            )));
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(ConfigError::Validation(format!(
                "fee_rate must be in [0, 1), got {}",
                self.fee_rate
            )));
        }
        Ok(())
    }
}

/// Settings for the update-processing loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Bound of the transport -> processor channel
    pub channel_capacity: usize,
    /// Order size the processor prices after every applied update
    pub tracked_quantity: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            tracked_quantity: 100.0,
        }
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "channel_capacity must be > 0".to_string(),
            ));
        }
        if !self.tracked_quantity.is_finite() || self.tracked_quantity <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "tracked_quantity must be a finite value > 0, got {}",
                self.tracked_quantity
            )));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcaConfig {
    pub symbol: String,
    pub analytics: AnalyticsConfig,
    pub feed: FeedConfig,
}

impl Default for TcaConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC-USDT-SWAP".to_string(),
            analytics: AnalyticsConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

impl TcaConfig {
    /// Load and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = Self::from_json(&fs::read_to_string(path)?)?;
        info!(path = %path.display(), symbol = %config.symbol, "loaded configuration");
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::Validation("symbol must not be empty".to_string()));
        }
        self.analytics.validate()?;
        self.feed.validate()
    }
}
