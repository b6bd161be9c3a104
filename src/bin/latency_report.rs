use flash_tca::{AnalyticsEngine, BookStore, BookUpdate};
use hdrhistogram::Histogram;
use std::sync::Arc;
use std::time::Instant;

const ITERATIONS: u64 = 200_000;
const LEVELS_PER_SIDE: usize = 50;

/// Synthetic snapshot around a drifting mid price.
fn synthetic_update(rng: &mut u64, mid: f64) -> BookUpdate {
    let mut next = || {
        *rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
        *rng >> 32 // High bits (LCG low bits are poor)
    };

    let mut bids = Vec::with_capacity(LEVELS_PER_SIDE);
    let mut asks = Vec::with_capacity(LEVELS_PER_SIDE);
    for i in 0..LEVELS_PER_SIDE {
        let offset = 0.5 + i as f64 * 0.5;
        bids.push((format!("{:.1}", mid - offset), format!("{:.3}", 0.001 * (1 + next() % 5000) as f64)));
        asks.push((format!("{:.1}", mid + offset), format!("{:.3}", 0.001 * (1 + next() % 5000) as f64)));
    }
    BookUpdate::from_pairs(&bids, &asks)
}

fn print_histogram(name: &str, histogram: &Histogram<u64>) {
    println!("\n=== {} (ns) ===", name);
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("Max:    {:6} ns", histogram.max());
}

fn main() {
    println!("Preparing Latency Benchmark...");

    let store = Arc::new(BookStore::new("BTC-USDT-SWAP"));
    let engine = AnalyticsEngine::with_defaults(store.clone());

    let mut apply_hist = Histogram::<u64>::new_with_bounds(1, 10_000_000, 3).unwrap();
    let mut estimate_hist = Histogram::<u64>::new_with_bounds(1, 10_000_000, 3).unwrap();

    let mut rng = 12345u64;
    let mut mid = 95_000.0;

    // Pre-generate so string formatting stays out of the measured section
    let updates: Vec<BookUpdate> = (0..1000)
        .map(|_| {
            mid += ((rng >> 40) % 11) as f64 - 5.0;
            synthetic_update(&mut rng, mid)
        })
        .collect();

    println!("Running {} iterations...", ITERATIONS);

    let mut total_duration = std::time::Duration::new(0, 0);
    for i in 0..ITERATIONS {
        let update = &updates[(i % updates.len() as u64) as usize];

        let start = Instant::now();
        std::hint::black_box(store.apply(update).unwrap());
        let applied = start.elapsed();

        let start = Instant::now();
        std::hint::black_box(engine.estimate(10.0).unwrap());
        let estimated = start.elapsed();

        apply_hist.saturating_record(u64::try_from(applied.as_nanos()).unwrap_or(u64::MAX));
        estimate_hist.saturating_record(u64::try_from(estimated.as_nanos()).unwrap_or(u64::MAX));
        total_duration += applied + estimated;
    }

    println!("\nTotal Ops:  {}", ITERATIONS);
    println!("Throughput: {:.2} updates/sec", ITERATIONS as f64 / total_duration.as_secs_f64());
    print_histogram("apply", &apply_hist);
    print_histogram("estimate", &estimate_hist);
}
