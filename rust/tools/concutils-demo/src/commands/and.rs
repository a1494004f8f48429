use std::time::Instant;

use anyhow::Result;
use concutils::AndCombiner;

/// Waits for every timer to fire.
pub fn run(delays_ms: &[u64]) -> Result<()> {
    let start = Instant::now();
    let done = AndCombiner::new(super::timers(delays_ms)).out();
    if delays_ms.is_empty() {
        println!("AndCombiner has no inputs and would never finish");
        return Ok(());
    }

    done.wait();
    println!("AndCombiner finished after {:?}", start.elapsed());
    Ok(())
}
