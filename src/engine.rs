//! Feed Processor - the single ordered update loop.
//!
//! ```text
//! [Transport Task] --> [mpsc FeedMessage] --> [FeedProcessor Task]
//!                                                   |
//!                                   BookStore::apply + AnalyticsEngine
//!                                                   |
//!                                       [watch CostReport] --> readers
//! ```
//!
//! The processor owns the write path of the book. Messages are handled
//! strictly in the order they arrive; nothing is reordered or coalesced.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analytics::{AnalyticsEngine, CostEstimate};
use crate::book_store::BookStore;
use crate::config::FeedConfig;
use crate::error::ConfigError;
use crate::update::{BookUpdate, FeedMessage};

/// Top of book plus a cost estimate, published after every applied update.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CostReport {
    pub sequence: u64,
    pub last_update: DateTime<Utc>,
    pub best_bid: f64,
    pub best_ask: f64,
    pub spread: f64,
    pub mid_price: f64,
    pub estimate: CostEstimate,
    /// Time spent applying the update and pricing the tracked quantity
    pub processing_latency: Duration,
}

/// Counters kept by the processor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    pub applied: u64,
    /// Updates discarded because a value failed to parse
    pub rejected: u64,
    /// Applied updates whose exchange timestamp went backwards
    pub stale: u64,
    pub transport_errors: u64,
    /// True once a `ConnectionClosed` message was seen
    pub closed: bool,
}

/// Processing latency percentiles, in nanoseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub min: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub max: u64,
}

impl LatencySummary {
    fn from_histogram(histogram: &Histogram<u64>) -> Self {
        if histogram.is_empty() {
            return Self::default();
        }
        Self {
            count: histogram.len(),
            min: histogram.min(),
            p50: histogram.value_at_quantile(0.50),
            p90: histogram.value_at_quantile(0.90),
            p99: histogram.value_at_quantile(0.99),
            max: histogram.max(),
        }
    }
}

impl std::fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Updates: {:8}", self.count)?;
        writeln!(f, "Min:     {:8} ns", self.min)?;
        writeln!(f, "P50:     {:8} ns", self.p50)?;
        writeln!(f, "P90:     {:8} ns", self.p90)?;
        writeln!(f, "P99:     {:8} ns", self.p99)?;
        write!(f, "Max:     {:8} ns", self.max)
    }
}

/// Final state of a processor run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FeedReport {
    pub stats: FeedStats,
    pub latency: LatencySummary,
    pub last_report: Option<CostReport>,
}

/// Create the bounded transport -> processor channel.
pub fn feed_channel(config: &FeedConfig) -> (mpsc::Sender<FeedMessage>, mpsc::Receiver<FeedMessage>) {
    mpsc::channel(config.channel_capacity.max(1))
}

/// Consumes [`FeedMessage`]s, applies them to the book and publishes a
/// [`CostReport`] for the tracked quantity after each applied update.
pub struct FeedProcessor {
    store: Arc<BookStore>,
    engine: AnalyticsEngine,
    config: FeedConfig,
    reports: watch::Sender<Option<CostReport>>,
    latency: Histogram<u64>,
    stats: FeedStats,
    last_exchange_time: Option<DateTime<Utc>>,
}

impl FeedProcessor {
    /// Create a processor writing to the engine's store.
    pub fn new(engine: AnalyticsEngine, config: FeedConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let latency = Histogram::<u64>::new(3)
            .map_err(|e| ConfigError::Validation(format!("latency histogram: {e}")))?;
        let (reports, _) = watch::channel(None);

        Ok(Self {
            store: engine.store().clone(),
            engine,
            config,
            reports,
            latency,
            stats: FeedStats::default(),
            last_exchange_time: None,
        })
    }

    #[inline]
    pub fn store(&self) -> &Arc<BookStore> {
        &self.store
    }

    #[inline]
    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    /// Receive the latest report; `None` until the first update is applied.
    pub fn subscribe(&self) -> watch::Receiver<Option<CostReport>> {
        self.reports.subscribe()
    }

    /// Handle one message.
    ///
    /// Returns `Break` once the transport reported the connection closed.
    /// This is the synchronous entry point used by tests and replay tools.
    pub fn handle(&mut self, message: FeedMessage) -> ControlFlow<()> {
        match message {
            FeedMessage::Update(update) => {
                self.on_update(&update);
                ControlFlow::Continue(())
            }
            FeedMessage::Error(reason) => {
                self.stats.transport_errors += 1;
                error!(symbol = %self.store.symbol(), %reason, "transport error");
                ControlFlow::Continue(())
            }
            FeedMessage::ConnectionClosed => {
                self.stats.closed = true;
                info!(symbol = %self.store.symbol(), "connection closed");
                ControlFlow::Break(())
            }
        }
    }

    fn on_update(&mut self, update: &BookUpdate) {
        let start = Instant::now();

        let state = match self.store.apply(update) {
            Ok(state) => state,
            Err(e) => {
                self.stats.rejected += 1;
                warn!(symbol = %self.store.symbol(), error = %e, "rejected book update");
                return;
            }
        };
        self.stats.applied += 1;
        self.check_exchange_time(update);

        let estimate = match self.engine.estimate_on(&state, self.config.tracked_quantity) {
            Ok(estimate) => estimate,
            Err(e) => {
                warn!(symbol = %self.store.symbol(), error = %e, "could not price tracked quantity");
                return;
            }
        };

        let elapsed = start.elapsed();
        self.latency
            .saturating_record(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));

        self.reports.send_replace(Some(CostReport {
            sequence: state.sequence(),
            last_update: state.last_update(),
            best_bid: state.best_bid(),
            best_ask: state.best_ask(),
            spread: state.spread(),
            mid_price: state.mid_price(),
            estimate,
            processing_latency: elapsed,
        }));
    }

    /// Stale snapshots are still applied; they are only counted and logged.
    fn check_exchange_time(&mut self, update: &BookUpdate) {
        let Some(time) = update.exchange_time() else {
            return;
        };
        match self.last_exchange_time {
            Some(previous) if time < previous => {
                self.stats.stale += 1;
                warn!(
                    symbol = %self.store.symbol(),
                    %previous,
                    received = %time,
                    "applied snapshot older than its predecessor"
                );
            }
            _ => self.last_exchange_time = Some(time),
        }
    }

    /// Drain `input` until the connection closes or every sender is dropped.
    pub async fn run(mut self, mut input: mpsc::Receiver<FeedMessage>) -> FeedReport {
        info!(
            symbol = %self.store.symbol(),
            tracked_quantity = self.config.tracked_quantity,
            "feed processor started"
        );

        while let Some(message) = input.recv().await {
            if self.handle(message).is_break() {
                break;
            }
        }

        let report = self.report();
        info!(
            symbol = %self.store.symbol(),
            applied = report.stats.applied,
            rejected = report.stats.rejected,
            "feed processor stopped"
        );
        report
    }

    /// Run on the current tokio runtime.
    pub fn spawn(self, input: mpsc::Receiver<FeedMessage>) -> JoinHandle<FeedReport> {
        tokio::spawn(self.run(input))
    }

    /// Counters, latency percentiles and the last published report.
    pub fn report(&self) -> FeedReport {
        let report = FeedReport {
            stats: self.stats,
            latency: LatencySummary::from_histogram(&self.latency),
            last_report: *self.reports.borrow(),
        };
        debug!(?report.stats, "feed report");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> FeedProcessor {
        let store = Arc::new(BookStore::new("BTC-USDT-SWAP"));
        let engine = AnalyticsEngine::with_defaults(store);
        FeedProcessor::new(
            engine,
            FeedConfig {
                channel_capacity: 16,
                tracked_quantity: 3.0,
            },
        )
        .unwrap()
    }

    fn sample_update() -> BookUpdate {
        BookUpdate::from_pairs(&[("100", "2"), ("99", "3")], &[("101", "2"), ("102", "5")])
    }

    #[test]
    fn test_processor_creation() {
        let processor = processor();
        assert_eq!(processor.stats(), FeedStats::default());
        assert!(processor.subscribe().borrow().is_none());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let engine = AnalyticsEngine::with_defaults(Arc::new(BookStore::new("X")));
        let config = FeedConfig {
            channel_capacity: 0,
            ..FeedConfig::default()
        };
        assert!(FeedProcessor::new(engine, config).is_err());
    }

    #[test]
    fn test_handle_update_publishes_report() {
        let mut processor = processor();
        let reports = processor.subscribe();

        assert!(processor
            .handle(FeedMessage::Update(sample_update()))
            .is_continue());

        let report = reports.borrow().expect("report published");
        assert_eq!(report.sequence, 1);
        assert_eq!(report.best_bid, 100.0);
        assert_eq!(report.best_ask, 101.0);
        assert_eq!(report.mid_price, 100.5);
        assert!((report.estimate.slippage - (304.0 / 3.0 - 100.5)).abs() < 1e-9);
        assert_eq!(processor.stats().applied, 1);
    }

    #[test]
    fn test_handle_rejected_update_keeps_book() {
        let mut processor = processor();
        processor.handle(FeedMessage::Update(sample_update()));
        processor.handle(FeedMessage::Update(BookUpdate::from_pairs(
            &[("100", "1")],
            &[("101", "abc")],
        )));

        let stats = processor.stats();
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(processor.store().best_ask(), 101.0);
        assert_eq!(processor.store().sequence(), 1);
    }

    #[test]
    fn test_handle_error_and_close() {
        let mut processor = processor();
        assert!(processor
            .handle(FeedMessage::Error("tls alert".to_string()))
            .is_continue());
        assert!(processor.handle(FeedMessage::ConnectionClosed).is_break());

        let stats = processor.stats();
        assert_eq!(stats.transport_errors, 1);
        assert!(stats.closed);
    }

    #[test]
    fn test_stale_snapshot_is_applied_and_counted() {
        let mut processor = processor();
        let mut newer = sample_update();
        newer.timestamp = Some("2025-05-04T10:39:14Z".to_string());
        let mut older = BookUpdate::from_pairs(&[("90", "1")], &[("91", "1")]);
        older.timestamp = Some("2025-05-04T10:39:13Z".to_string());

        processor.handle(FeedMessage::Update(newer));
        processor.handle(FeedMessage::Update(older));

        assert_eq!(processor.stats().stale, 1);
        assert_eq!(processor.stats().applied, 2);
        assert_eq!(processor.store().best_bid(), 90.0);
    }

    #[test]
    fn test_report_latency_counts_applied_updates() {
        let mut processor = processor();
        for _ in 0..5 {
            processor.handle(FeedMessage::Update(sample_update()));
        }
        let report = processor.report();
        assert_eq!(report.latency.count, 5);
        assert!(report.latency.min <= report.latency.max);
        assert_eq!(report.last_report.map(|r| r.sequence), Some(5));
    }

    #[tokio::test]
    async fn test_run_stops_on_connection_closed() {
        let processor = processor();
        let store = processor.store().clone();
        let (tx, rx) = feed_channel(&FeedConfig::default());

        let handle = processor.spawn(rx);
        tx.send(FeedMessage::Update(sample_update())).await.unwrap();
        tx.send(FeedMessage::ConnectionClosed).await.unwrap();

        let report = handle.await.unwrap();
        assert!(report.stats.closed);
        assert_eq!(report.stats.applied, 1);
        assert_eq!(store.best_bid(), 100.0);
    }

    #[tokio::test]
    async fn test_run_stops_when_senders_dropped() {
        let processor = processor();
        let (tx, rx) = feed_channel(&FeedConfig::default());

        let handle = processor.spawn(rx);
        tx.send(FeedMessage::Update(sample_update())).await.unwrap();
        drop(tx);

        let report = handle.await.unwrap();
        assert!(!report.stats.closed);
        assert_eq!(report.stats.applied, 1);
    }
}
