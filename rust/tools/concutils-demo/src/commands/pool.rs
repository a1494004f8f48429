use std::{
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use concutils::WorkerPool;

/// Runs `tasks` short sleeping tasks on a pool of `workers`.
pub fn run(tasks: usize, workers: usize, fail_every: usize) -> Result<()> {
    let pool = WorkerPool::with_thread_name(workers, |i| format!("demo-worker-{i}"))
        .context("Failed to create worker pool")?;
    let mut peak = 0usize;
    let start = Instant::now();

    for i in 0..tasks {
        let fails = fail_every != 0 && (i + 1) % fail_every == 0;
        pool.submit(move || {
            thread::sleep(Duration::from_millis(10));
            if fails {
                panic!("task {i} failed on purpose");
            }
            log::debug!(
                "task {i} done on {}",
                thread::current().name().unwrap_or("unnamed")
            );
        })
        .with_context(|| format!("Failed to submit task {i}"))?;
        peak = peak.max(pool.active_tasks());
    }

    pool.stop().context("Failed to stop worker pool")?;
    println!(
        "WorkerPool ran {} tasks ({} failed) on {} workers in {:?}, peak in-flight {}",
        pool.completed_tasks() + pool.failed_tasks(),
        pool.failed_tasks(),
        pool.num_workers(),
        start.elapsed(),
        peak
    );
    Ok(())
}
