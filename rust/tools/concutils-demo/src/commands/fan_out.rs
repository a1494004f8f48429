use std::thread;

use anyhow::{Result, ensure};
use concutils::{FanOutDistributor, stream};

/// Sends `items` numbers through a distributor with `workers` outputs.
pub fn run(items: usize, workers: usize) -> Result<()> {
    ensure!(workers > 0, "at least one worker is required");

    let (tx, rx) = stream::rendezvous::<usize>();
    thread::spawn(move || {
        for i in 0..items {
            if tx.send(i).is_err() {
                return;
            }
        }
    });

    let distributor = FanOutDistributor::new(rx, workers);
    thread::scope(|s| {
        for (worker_id, out) in distributor.outs().iter().enumerate() {
            s.spawn(move || {
                for num in out {
                    println!("Worker {worker_id} received: {num}");
                }
            });
        }
    });
    Ok(())
}
