//! Stress tests for the registry.
//!
//! These runs put many threads on a small set of names and check that the
//! store's conflict handling keeps claims exclusive.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use uniquename_core::UniqueNames;
use uniquename_store::MemoryStore;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Operations that returned `true`.
    pub successful_ops: usize,
    /// Operations that returned `false`.
    pub refused_ops: usize,
    /// Operations that returned an error.
    pub failed_ops: usize,
    /// Commit conflicts the store reported during the run.
    pub conflicts: u64,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        let secs = self.duration.as_secs_f64();
        let throughput = if secs > 0.0 {
            self.total_ops as f64 / secs
        } else {
            0.0
        };
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Refused: {}", self.refused_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Conflicts retried: {}", self.conflicts);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {throughput:.2} ops/sec");
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct names contended for.
    pub names: usize,
    /// Rounds each thread runs over every name.
    pub rounds: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            names: 16,
            rounds: 4,
        }
    }
}

#[derive(Default)]
struct Counters {
    successful: AtomicUsize,
    refused: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn record<E>(&self, result: Result<bool, E>) -> Option<bool> {
        let counter = match result {
            Ok(true) => &self.successful,
            Ok(false) => &self.refused,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result.ok()
    }

    fn finish(&self, names: &UniqueNames<MemoryStore>, before: u64, start: Instant) -> StressTestResult {
        let successful = self.successful.load(Ordering::Relaxed);
        let refused = self.refused.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let conflicts = names
            .store()
            .map(|store| store.stats().conflicts - before)
            .unwrap_or(0);
        StressTestResult {
            total_ops: successful + refused + failed,
            successful_ops: successful,
            refused_ops: refused,
            failed_ops: failed,
            conflicts,
            duration: start.elapsed(),
        }
    }
}

fn conflicts_so_far(names: &UniqueNames<MemoryStore>) -> u64 {
    names.store().map(|store| store.stats().conflicts).unwrap_or(0)
}

/// Every thread tries to take every name, permanently, once per round.
///
/// Returns the run result and, for each name, the owners whose first `take`
/// on it succeeded. Exclusivity means each list has exactly one entry.
pub fn stress_contended_takes(
    names: Arc<UniqueNames<MemoryStore>>,
    config: &StressConfig,
) -> (StressTestResult, HashMap<String, Vec<String>>) {
    let counters = Arc::new(Counters::default());
    let winners: Arc<Mutex<HashMap<String, Vec<String>>>> = Arc::default();
    let before = conflicts_so_far(&names);
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let names = Arc::clone(&names);
            let counters = Arc::clone(&counters);
            let winners = Arc::clone(&winners);
            let (name_count, rounds) = (config.names, config.rounds);

            thread::spawn(move || {
                let owner = format!("owner-{t}");
                for round in 0..rounds {
                    for n in 0..name_count {
                        let name = format!("name-{n}");
                        let won = counters.record(names.take(&name, &owner, None));
                        if round == 0 && won == Some(true) {
                            winners.lock().entry(name).or_default().push(owner.clone());
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let result = counters.finish(&names, before, start);
    let winners = std::mem::take(&mut *winners.lock());
    (result, winners)
}

/// Threads pass a single name around a ring of owners.
///
/// Each thread repeatedly tries to transfer the name from its own owner id to
/// the next thread's. The name starts with `owner-0`. Returns the run result
/// and the final owner.
pub fn stress_transfer_ring(
    names: Arc<UniqueNames<MemoryStore>>,
    config: &StressConfig,
) -> (StressTestResult, Option<String>) {
    const NAME: &str = "ring";
    let threads = config.threads.max(2);
    names
        .take(NAME, "owner-0", None)
        .expect("Failed to seed ring");

    let counters = Arc::new(Counters::default());
    let before = conflicts_so_far(&names);
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let names = Arc::clone(&names);
            let counters = Arc::clone(&counters);
            let attempts = config.rounds * config.names;

            thread::spawn(move || {
                let from = format!("owner-{t}");
                let to = format!("owner-{}", (t + 1) % threads);
                for _ in 0..attempts {
                    counters.record(names.change_owner(NAME, &from, &to, None));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let result = counters.finish(&names, before, start);
    let owner = names
        .entity_for_name(NAME)
        .expect("Failed to read ring")
        .map(|record| record.owner_id);
    (result, owner)
}
