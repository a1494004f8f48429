//! Command implementations for concutils-demo

use std::time::Duration;

use anyhow::Result;
use concutils::{CompletionSignal, signal};

pub mod and;
pub mod fan_in;
pub mod fan_out;
pub mod or;
pub mod pool;

/// Runs every demo in sequence with the default parameters.
pub fn run_all() -> Result<()> {
    println!("--- OrCombiner Example ---");
    or::run(&[2000, 1000, 3000])?;

    println!("\n--- AndCombiner Example ---");
    and::run(&[1000, 2000, 3000])?;

    println!("\n--- FanInMerger Example ---");
    fan_in::run(&[3, 2, 4], 100)?;

    println!("\n--- FanOutDistributor Example ---");
    fan_out::run(10, 3)?;

    println!("\n--- WorkerPool Example ---");
    pool::run(20, 4, 0)
}

/// Creates one timer signal per delay (in milliseconds).
fn timers(delays_ms: &[u64]) -> Vec<CompletionSignal> {
    delays_ms
        .iter()
        .map(|&ms| signal::after(Duration::from_millis(ms)))
        .collect()
}
