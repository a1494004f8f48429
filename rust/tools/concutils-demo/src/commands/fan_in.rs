use std::{thread, time::Duration};

use anyhow::Result;
use concutils::{FanInMerger, stream};

/// Merges the messages of one producer per entry of `counts`.
pub fn run(counts: &[usize], interval_ms: u64) -> Result<()> {
    let producers = counts
        .iter()
        .enumerate()
        .map(|(i, &count)| producer(producer_id(i), count, Duration::from_millis(interval_ms)))
        .collect::<Vec<_>>();

    let merged = FanInMerger::new(producers).into_out();
    let mut total = 0;
    for msg in merged {
        println!("{msg}");
        total += 1;
    }
    println!("received {total} messages");
    Ok(())
}

/// Sends `count` messages, pausing `interval` after each.
fn producer(id: String, count: usize, interval: Duration) -> stream::Receiver<String> {
    let (tx, rx) = stream::rendezvous();
    thread::spawn(move || {
        for i in 0..count {
            if tx.send(format!("Producer {id}: message {i}")).is_err() {
                return;
            }
            thread::sleep(interval);
        }
    });
    rx
}

/// "A", "B", ..., "Z", then "P26", "P27", ...
fn producer_id(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => char::from(b'A' + i).to_string(),
        _ => format!("P{index}"),
    }
}
