//! Analytics Engine - execution-cost estimates from the current book.
//!
//! Models:
//! 1. SLIPPAGE: walk the ask ladder for the requested size and compare the
//!    volume-weighted fill price with the pre-trade mid
//! 2. MARKET IMPACT: linear Almgren-Chriss, `eta * q + gamma * q`
//! 3. MAKER/TAKER: logistic in the spread normalized by mid price
//!
//! Every store-reading call takes exactly one [`BookState`] snapshot and
//! computes against it, so a concurrent update can never land between two
//! levels of a walk. The `*_on` variants accept a snapshot directly.

use std::sync::Arc;

use serde::Serialize;

use crate::book_store::{BookState, BookStore};
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, ConfigError};

/// Market impact split into its two components.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MarketImpact {
    /// Transient component (`eta * q`)
    pub temporary: f64,
    /// Lasting component (`gamma * q`)
    pub permanent: f64,
}

impl MarketImpact {
    #[inline]
    pub fn total(&self) -> f64 {
        self.temporary + self.permanent
    }
}

/// Every cost number for one hypothetical order, from one snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CostEstimate {
    pub quantity: f64,
    /// Premium over mid per unit; `+inf` when the asks cannot fill `quantity`
    pub slippage: f64,
    pub market_impact: f64,
    pub fees: f64,
    /// `slippage + fees + market_impact`
    pub net_cost: f64,
    /// `None` when the metric is undefined for the book (zero mid price)
    pub maker_taker_probability: Option<f64>,
}

impl CostEstimate {
    /// False when the ask side could not fill the requested quantity.
    #[inline]
    pub fn has_liquidity(&self) -> bool {
        self.slippage.is_finite()
    }
}

/// Reject quantities that are not strictly positive and finite.
#[inline]
fn check_quantity(quantity: f64) -> Result<f64, AnalyticsError> {
    if quantity.is_finite() && quantity > 0.0 {
        Ok(quantity)
    } else {
        Err(AnalyticsError::InvalidQuantity(quantity))
    }
}

/// Stateless cost calculator over a shared [`BookStore`].
#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    store: Arc<BookStore>,
    config: AnalyticsConfig,
}

impl AnalyticsEngine {
    /// Create an engine with validated model parameters.
    pub fn new(store: Arc<BookStore>, config: AnalyticsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Create an engine using the reference parameters.
    pub fn with_defaults(store: Arc<BookStore>) -> Self {
        Self {
            store,
            config: AnalyticsConfig::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    #[inline]
    pub fn store(&self) -> &Arc<BookStore> {
        &self.store
    }

    // ========================================================================
    // Market Impact
    // ========================================================================

    /// Total modeled impact of executing `quantity`.
    pub fn calculate_market_impact(&self, quantity: f64) -> Result<f64, AnalyticsError> {
        self.market_impact_breakdown(quantity).map(|m| m.total())
    }

    /// Temporary and permanent impact of executing `quantity`.
    ///
    /// Independent of the book; linear in `quantity`.
    pub fn market_impact_breakdown(&self, quantity: f64) -> Result<MarketImpact, AnalyticsError> {
        let quantity = check_quantity(quantity)?;
        Ok(MarketImpact {
            temporary: self.config.eta * quantity,
            permanent: self.config.gamma * quantity,
        })
    }

    // ========================================================================
    // Slippage
    // ========================================================================

    /// Expected slippage of a buy of `quantity` against the current book.
    pub fn calculate_slippage(&self, quantity: f64) -> Result<f64, AnalyticsError> {
        self.slippage_on(&self.store.snapshot(), quantity)
    }

    /// Slippage of a buy of `quantity` against `book`.
    ///
    /// Returns `0.0` when either side is empty and `f64::INFINITY` when the
    /// asks hold less than `quantity` in total.
    pub fn slippage_on(&self, book: &BookState, quantity: f64) -> Result<f64, AnalyticsError> {
        let quantity = check_quantity(quantity)?;
        if book.is_one_sided() {
            return Ok(0.0);
        }

        let mut remaining = quantity;
        let mut weighted_cost = 0.0;
        for level in book.asks() {
            if remaining <= 0.0 {
                break;
            }
            let executed = remaining.min(level.quantity);
            weighted_cost += executed * level.price;
            remaining -= executed;
        }

        if remaining > 0.0 {
            return Ok(f64::INFINITY);
        }
        Ok(weighted_cost / quantity - book.mid_price())
    }

    // ========================================================================
    // Maker / Taker
    // ========================================================================

    /// Probability that flow at the current spread is maker flow.
    pub fn calculate_maker_taker_proportion(&self) -> Result<f64, AnalyticsError> {
        self.maker_taker_on(&self.store.snapshot())
    }

    /// `1 / (1 + exp(-k * (spread / mid - threshold)))` for `book`.
    pub fn maker_taker_on(&self, book: &BookState) -> Result<f64, AnalyticsError> {
        let mid = book.mid_price();
        if mid == 0.0 {
            return Err(AnalyticsError::UndefinedMetric("mid price is zero"));
        }

        let normalized_spread = book.spread() / mid;
        let exponent =
            -self.config.maker_taker_sensitivity * (normalized_spread - self.config.maker_taker_threshold);
        let probability = 1.0 / (1.0 + exponent.exp());

        if probability.is_finite() {
            Ok(probability)
        } else {
            Err(AnalyticsError::UndefinedMetric("maker/taker probability is not finite"))
        }
    }

    // ========================================================================
    // Combined
    // ========================================================================

    /// Flat fees for `quantity` at the configured rate.
    pub fn expected_fees(&self, quantity: f64) -> Result<f64, AnalyticsError> {
        Ok(check_quantity(quantity)? * self.config.fee_rate)
    }

    /// Full cost estimate for `quantity` against the current book.
    pub fn estimate(&self, quantity: f64) -> Result<CostEstimate, AnalyticsError> {
        self.estimate_on(&self.store.snapshot(), quantity)
    }

    /// Full cost estimate for `quantity` against `book`.
    pub fn estimate_on(&self, book: &BookState, quantity: f64) -> Result<CostEstimate, AnalyticsError> {
        let slippage = self.slippage_on(book, quantity)?;
        let market_impact = self.calculate_market_impact(quantity)?;
        let fees = self.expected_fees(quantity)?;
        let maker_taker_probability = match self.maker_taker_on(book) {
            Ok(p) => Some(p),
            Err(AnalyticsError::UndefinedMetric(_)) => None,
            Err(e) => return Err(e),
        };

        Ok(CostEstimate {
            quantity,
            slippage,
            market_impact,
            fees,
            net_cost: slippage + fees + market_impact,
            maker_taker_probability,
        })
    }
}
