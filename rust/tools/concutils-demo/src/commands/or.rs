use std::time::Instant;

use anyhow::Result;
use concutils::OrCombiner;

/// Waits for the fastest timer to fire.
pub fn run(delays_ms: &[u64]) -> Result<()> {
    let start = Instant::now();
    let done = OrCombiner::new(super::timers(delays_ms)).out();
    if delays_ms.is_empty() {
        println!("OrCombiner has no inputs and would never finish");
        return Ok(());
    }

    done.wait();
    println!("OrCombiner finished after {:?}", start.elapsed());
    Ok(())
}
