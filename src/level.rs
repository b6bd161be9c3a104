//! Price levels and ladders - one sorted side of the book.
//!
//! A ladder is built once from a full snapshot and never patched in place.
//! Construction sorts it into side order (bids descending, asks ascending)
//! and folds repeated prices into a single level.

use serde::Serialize;

/// Book side (bid = buy, ask = sell)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    Bid = 0,
    /// Sell side (asks)
    Ask = 1,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Bid => f.write_str("bid"),
            Side::Ask => f.write_str("ask"),
        }
    }
}

/// A single quoted price and the total quantity resting at it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
}

impl PriceLevel {
    #[inline]
    pub const fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

/// One side of the book in priority order.
///
/// Invariant: strictly monotonic prices (descending for bids, ascending
/// for asks), so the best price is always at index 0.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Ladder {
    levels: Vec<PriceLevel>,
}

impl Ladder {
    /// Create an empty ladder
    pub const fn new() -> Self {
        Self { levels: Vec::new() }
    }

    /// Build a ladder for `side` from unordered levels.
    ///
    /// Levels sharing a price are merged by summing their quantities.
    pub fn from_levels(side: Side, mut levels: Vec<PriceLevel>) -> Self {
        match side {
            Side::Bid => levels.sort_by(|a, b| b.price.total_cmp(&a.price)),
            Side::Ask => levels.sort_by(|a, b| a.price.total_cmp(&b.price)),
        }

        let mut merged: Vec<PriceLevel> = Vec::with_capacity(levels.len());
        for level in levels {
            match merged.last_mut() {
                Some(last) if last.price == level.price => last.quantity += level.quantity,
                _ => merged.push(level),
            }
        }

        Self { levels: merged }
    }

    /// Best level (highest bid / lowest ask)
    #[inline]
    pub fn best(&self) -> Option<&PriceLevel> {
        self.levels.first()
    }

    /// Best price, or `0.0` when the ladder is empty.
    #[inline]
    pub fn best_price(&self) -> f64 {
        self.best().map_or(0.0, |l| l.price)
    }

    #[inline]
    pub fn levels(&self) -> &[PriceLevel] {
        &self.levels
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, PriceLevel> {
        self.levels.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Top `n` levels in priority order
    pub fn top(&self, n: usize) -> &[PriceLevel] {
        &self.levels[..n.min(self.levels.len())]
    }

    /// Sum of quantity across all levels
    pub fn total_quantity(&self) -> f64 {
        self.levels.iter().map(|l| l.quantity).sum()
    }
}

impl<'a> IntoIterator for &'a Ladder {
    type Item = &'a PriceLevel;
    type IntoIter = std::slice::Iter<'a, PriceLevel>;

    fn into_iter(self) -> Self::IntoIter {
        self.levels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(ladder: &Ladder) -> Vec<f64> {
        ladder.iter().map(|l| l.price).collect()
    }

    #[test]
    fn test_empty_ladder() {
        let ladder = Ladder::new();
        assert!(ladder.is_empty());
        assert_eq!(ladder.best(), None);
        assert_eq!(ladder.best_price(), 0.0);
        assert_eq!(ladder.total_quantity(), 0.0);
    }

    #[test]
    fn test_bids_sorted_descending() {
        let ladder = Ladder::from_levels(
            Side::Bid,
            vec![
                PriceLevel::new(99.0, 1.0),
                PriceLevel::new(101.0, 1.0),
                PriceLevel::new(100.0, 1.0),
            ],
        );
        assert_eq!(prices(&ladder), vec![101.0, 100.0, 99.0]);
        assert_eq!(ladder.best_price(), 101.0);
    }

    #[test]
    fn test_asks_sorted_ascending() {
        let ladder = Ladder::from_levels(
            Side::Ask,
            vec![
                PriceLevel::new(102.0, 1.0),
                PriceLevel::new(101.0, 1.0),
                PriceLevel::new(103.0, 1.0),
            ],
        );
        assert_eq!(prices(&ladder), vec![101.0, 102.0, 103.0]);
        assert_eq!(ladder.best_price(), 101.0);
    }

    #[test]
    fn test_duplicate_prices_merged() {
        let ladder = Ladder::from_levels(
            Side::Ask,
            vec![
                PriceLevel::new(101.0, 2.0),
                PriceLevel::new(102.0, 1.0),
                PriceLevel::new(101.0, 3.0),
            ],
        );
        assert_eq!(ladder.len(), 2);
        assert_eq!(ladder.levels()[0], PriceLevel::new(101.0, 5.0));
        assert_eq!(ladder.total_quantity(), 6.0);
    }

    #[test]
    fn test_top_clamps_to_len() {
        let ladder = Ladder::from_levels(
            Side::Bid,
            vec![PriceLevel::new(100.0, 1.0), PriceLevel::new(99.0, 2.0)],
        );
        assert_eq!(ladder.top(1).len(), 1);
        assert_eq!(ladder.top(10).len(), 2);
    }
}
