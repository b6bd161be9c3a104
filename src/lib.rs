//! # Flash-TCA
//!
//! Level-2 order book state for a single instrument, with execution-cost
//! analytics (slippage, market impact, maker/taker split) computed on demand.
//!
//! ## Design Principles
//!
//! - **Full Snapshots**: every update replaces both ladders; nothing is patched
//! - **Atomic Apply**: an update either parses completely or leaves the book untouched
//! - **Copy-on-Write Reads**: readers get an immutable `Arc<BookState>`, never a live ladder
//! - **Single Writer**: one task owns the update path and applies messages in arrival order
//!
//! ## Architecture
//!
//! ```text
//! [Transport] --> [mpsc FeedMessage] --> [FeedProcessor]
//!                                              |
//!                                         [BookStore] <-- snapshot() -- [AnalyticsEngine]
//!                                              |
//!                                      [watch CostReport] --> [Presentation]
//! ```

pub mod analytics;
pub mod book_store;
pub mod config;
pub mod engine;
pub mod error;
pub mod level;
pub mod logging;
pub mod update;

// Re-exports for convenience
pub use analytics::{AnalyticsEngine, CostEstimate, MarketImpact};
pub use book_store::{BookState, BookStore};
pub use config::{AnalyticsConfig, FeedConfig, TcaConfig};
pub use engine::{feed_channel, CostReport, FeedProcessor, FeedReport, FeedStats, LatencySummary};
pub use error::{AnalyticsError, BookError, ConfigError, LevelField};
pub use level::{Ladder, PriceLevel, Side};
pub use update::{BookUpdate, FeedMessage, ParsedSnapshot, RawLevel};
