//! Book Store - authoritative L2 state for a single instrument.
//!
//! The current state is an immutable [`BookState`] behind an `Arc`. Applying
//! an update parses into local buffers, builds a complete new state, and
//! swaps the `Arc` under a short exclusive lock. Readers clone the `Arc`
//! under the same lock, so nobody ever sees a ladder mid-replacement and a
//! failed parse never touches shared state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::BookError;
use crate::level::{Ladder, PriceLevel, Side};
use crate::update::{BookUpdate, ParsedSnapshot};

/// One immutable view of the book.
#[derive(Clone, Debug, PartialEq)]
pub struct BookState {
    symbol: Arc<str>,
    bids: Ladder,
    asks: Ladder,
    last_update: DateTime<Utc>,
    /// Count of snapshots applied up to and including this one
    sequence: u64,
}

impl BookState {
    /// Empty book, stamped with the current time
    pub fn empty(symbol: impl Into<Arc<str>>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: Ladder::new(),
            asks: Ladder::new(),
            last_update: Utc::now(),
            sequence: 0,
        }
    }

    /// Standalone state from already-built ladders, for offline analysis
    /// through the `*_on` analytics calls.
    pub fn from_ladders(symbol: impl Into<Arc<str>>, bids: Ladder, asks: Ladder) -> Self {
        Self {
            symbol: symbol.into(),
            bids,
            asks,
            last_update: Utc::now(),
            sequence: 0,
        }
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[inline]
    pub fn bids(&self) -> &Ladder {
        &self.bids
    }

    #[inline]
    pub fn asks(&self) -> &Ladder {
        &self.asks
    }

    #[inline]
    pub fn ladder(&self, side: Side) -> &Ladder {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    #[inline]
    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    // ========================================================================
    // Top of Book
    //
    // Empty sides read as 0.0. Spread and mid are meaningless when the book
    // is one-sided; check `is_one_sided` first when that matters.
    // ========================================================================

    /// Highest bid price, or `0.0` when there are no bids
    #[inline]
    pub fn best_bid(&self) -> f64 {
        self.bids.best_price()
    }

    /// Lowest ask price, or `0.0` when there are no asks
    #[inline]
    pub fn best_ask(&self) -> f64 {
        self.asks.best_price()
    }

    #[inline]
    pub fn spread(&self) -> f64 {
        self.best_ask() - self.best_bid()
    }

    #[inline]
    pub fn mid_price(&self) -> f64 {
        (self.best_ask() + self.best_bid()) / 2.0
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// True when at least one side has no levels
    pub fn is_one_sided(&self) -> bool {
        self.bids.is_empty() || self.asks.is_empty()
    }
}

/// Single-writer, many-reader order book for one symbol.
pub struct BookStore {
    symbol: Arc<str>,
    current: Mutex<Arc<BookState>>,
}

impl BookStore {
    /// Create a store with both ladders empty.
    pub fn new(symbol: impl Into<Arc<str>>) -> Self {
        let symbol = symbol.into();
        Self {
            current: Mutex::new(Arc::new(BookState::empty(symbol.clone()))),
            symbol,
        }
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    // ========================================================================
    // Write Path
    // ========================================================================

    /// Replace both ladders with the contents of a full snapshot.
    ///
    /// Either every level parses and the new state becomes current, or the
    /// update is rejected with [`BookError::Parse`] and the previous state
    /// stays exactly as it was.
    ///
    /// Snapshots are applied in call order. There is no sequence or
    /// timestamp check, so a stale snapshot delivered late overwrites a
    /// newer one.
    pub fn apply(&self, update: &BookUpdate) -> Result<Arc<BookState>, BookError> {
        let parsed = update.parse()?;
        Ok(self.apply_parsed(parsed))
    }

    /// Install already-parsed ladders.
    pub fn apply_parsed(&self, parsed: ParsedSnapshot) -> Arc<BookState> {
        let mut current = self.current.lock();
        let next = Arc::new(BookState {
            symbol: self.symbol.clone(),
            bids: parsed.bids,
            asks: parsed.asks,
            last_update: Utc::now(),
            sequence: current.sequence + 1,
        });
        *current = next.clone();
        drop(current);

        debug!(
            symbol = %self.symbol,
            sequence = next.sequence,
            bid_levels = next.bids.len(),
            ask_levels = next.asks.len(),
            "applied book snapshot"
        );
        next
    }

    // ========================================================================
    // Read Path
    // ========================================================================

    /// The current state as one consistent, immutable view.
    #[inline]
    pub fn snapshot(&self) -> Arc<BookState> {
        self.current.lock().clone()
    }

    pub fn best_bid(&self) -> f64 {
        self.current.lock().best_bid()
    }

    pub fn best_ask(&self) -> f64 {
        self.current.lock().best_ask()
    }

    /// `best_ask - best_bid`, taken from one snapshot
    pub fn spread(&self) -> f64 {
        self.snapshot().spread()
    }

    /// `(best_ask + best_bid) / 2`, taken from one snapshot
    pub fn mid_price(&self) -> f64 {
        self.snapshot().mid_price()
    }

    pub fn last_update_time(&self) -> DateTime<Utc> {
        self.current.lock().last_update
    }

    /// Number of snapshots applied so far
    pub fn sequence(&self) -> u64 {
        self.current.lock().sequence
    }

    /// Copy of the bid ladder (descending)
    pub fn snapshot_bids(&self) -> Ladder {
        self.snapshot().bids.clone()
    }

    /// Copy of the ask ladder (ascending)
    pub fn snapshot_asks(&self) -> Ladder {
        self.snapshot().asks.clone()
    }

    /// Top `levels` levels of one side
    pub fn depth(&self, side: Side, levels: usize) -> Vec<PriceLevel> {
        self.snapshot().ladder(side).top(levels).to_vec()
    }

    /// Total quoted quantity on one side
    pub fn total_quantity(&self, side: Side) -> f64 {
        self.snapshot().ladder(side).total_quantity()
    }
}

impl std::fmt::Debug for BookStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.snapshot();
        f.debug_struct("BookStore")
            .field("symbol", &self.symbol)
            .field("best_bid", &state.best_bid())
            .field("best_ask", &state.best_ask())
            .field("bid_levels", &state.bids.len())
            .field("ask_levels", &state.asks.len())
            .field("sequence", &state.sequence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LevelField;

    fn sample_update() -> BookUpdate {
        BookUpdate::from_pairs(&[("100", "2"), ("99", "3")], &[("101", "2"), ("102", "5")])
    }

    #[test]
    fn test_empty_book() {
        let store = BookStore::new("BTC-USDT-SWAP");
        assert_eq!(store.symbol(), "BTC-USDT-SWAP");
        assert_eq!(store.best_bid(), 0.0);
        assert_eq!(store.best_ask(), 0.0);
        assert_eq!(store.sequence(), 0);
        assert!(store.snapshot().is_empty());
        assert!(store.snapshot_bids().is_empty());
        assert!(store.snapshot_asks().is_empty());
    }

    #[test]
    fn test_apply_top_of_book() {
        let store = BookStore::new("BTC-USDT-SWAP");
        store.apply(&sample_update()).unwrap();

        assert_eq!(store.best_bid(), 100.0);
        assert_eq!(store.best_ask(), 101.0);
        assert_eq!(store.spread(), 1.0);
        assert_eq!(store.mid_price(), 100.5);
        assert_eq!(store.sequence(), 1);
    }

    #[test]
    fn test_apply_sorts_unordered_snapshot() {
        let store = BookStore::new("X");
        let update = BookUpdate::from_pairs(
            &[("98", "1"), ("100", "1"), ("99", "1")],
            &[("103", "1"), ("101", "1"), ("102", "1")],
        );
        store.apply(&update).unwrap();

        let bids: Vec<f64> = store.snapshot_bids().iter().map(|l| l.price).collect();
        let asks: Vec<f64> = store.snapshot_asks().iter().map(|l| l.price).collect();
        assert_eq!(bids, vec![100.0, 99.0, 98.0]);
        assert_eq!(asks, vec![101.0, 102.0, 103.0]);
    }

    #[test]
    fn test_apply_replaces_not_merges() {
        let store = BookStore::new("X");
        store.apply(&sample_update()).unwrap();
        store
            .apply(&BookUpdate::from_pairs(&[("95", "1")], &[("96", "1")]))
            .unwrap();

        assert_eq!(store.snapshot_bids().len(), 1);
        assert_eq!(store.snapshot_asks().len(), 1);
        assert_eq!(store.best_bid(), 95.0);
        assert_eq!(store.best_ask(), 96.0);
    }

    #[test]
    fn test_parse_error_leaves_state_untouched() {
        let store = BookStore::new("X");
        store.apply(&sample_update()).unwrap();
        let before = store.snapshot();

        let bad = BookUpdate::from_pairs(&[("100", "1")], &[("101", "abc")]);
        let err = store.apply(&bad).unwrap_err();
        assert!(matches!(
            err,
            BookError::Parse { side: Side::Ask, field: LevelField::Quantity, .. }
        ));

        let after = store.snapshot();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(store.best_bid(), 100.0);
        assert_eq!(store.best_ask(), 101.0);
        assert_eq!(store.sequence(), 1);
    }

    #[test]
    fn test_apply_quantity_beyond_decimal_range() {
        let store = BookStore::new("X");
        let huge = "100000000000000000000000000000";
        store
            .apply(&BookUpdate::from_pairs(&[("100", "1")], &[("101", huge)]))
            .unwrap();

        assert_eq!(store.best_ask(), 101.0);
        assert_eq!(store.total_quantity(Side::Ask), 1e29);
    }

    #[test]
    fn test_one_sided_book() {
        let store = BookStore::new("X");
        store
            .apply(&BookUpdate::from_pairs(&[("100", "1")], &[]))
            .unwrap();
        let state = store.snapshot();
        assert!(state.is_one_sided());
        assert!(!state.is_empty());
        assert_eq!(state.best_ask(), 0.0);
    }

    #[test]
    fn test_last_update_advances() {
        let store = BookStore::new("X");
        let created = store.last_update_time();
        store.apply(&sample_update()).unwrap();
        assert!(store.last_update_time() >= created);
    }

    #[test]
    fn test_depth_and_total_quantity() {
        let store = BookStore::new("X");
        store.apply(&sample_update()).unwrap();

        assert_eq!(store.depth(Side::Bid, 1), vec![PriceLevel::new(100.0, 2.0)]);
        assert_eq!(store.depth(Side::Ask, 5).len(), 2);
        assert_eq!(store.total_quantity(Side::Ask), 7.0);
        assert_eq!(store.total_quantity(Side::Bid), 5.0);
    }

    #[test]
    fn test_snapshot_is_detached_from_later_updates() {
        let store = BookStore::new("X");
        store.apply(&sample_update()).unwrap();
        let held = store.snapshot();

        store
            .apply(&BookUpdate::from_pairs(&[("50", "1")], &[("51", "1")]))
            .unwrap();

        assert_eq!(held.best_bid(), 100.0);
        assert_eq!(store.best_bid(), 50.0);
    }
}
