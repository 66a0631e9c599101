//! Background expiry of the contact table.
//!
//! Wakes every `interval`, takes one reference time, and drops every flow last
//! seen more than `max_age` before it. Bounds the table to roughly the flows of
//! the last `max_age` seconds no matter how long the monitor runs.

use crate::logger::{Event, SharedLogger};
use crate::monitor::table::SharedTable;
use crate::monitor::types::SharedStats;
use crate::monitor::worker::{sleep_while_running, Worker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub struct ExpiryWorker {
    table:    SharedTable,
    max_age:  Duration,
    interval: Duration,
    logger:   SharedLogger,
    stats:    SharedStats,
}

impl ExpiryWorker {
    /// # Arguments
    /// * `max_age`  - Entries older than this are removed.
    /// * `interval` - Idle time between sweeps; keeps the lock free for the
    ///                other workers most of the time.
    pub fn new(
        table:    SharedTable,
        max_age:  Duration,
        interval: Duration,
        logger:   SharedLogger,
        stats:    SharedStats,
    ) -> Self {
        Self { table, max_age, interval, logger, stats }
    }

    /// Runs a single sweep against `now`. Returns the number of removed flows.
    pub fn sweep(&self, now: Instant) -> usize {
        let removed = self.table.expire(now, self.max_age);
        if removed > 0 {
            self.stats.flows_expired.fetch_add(removed as u64, Ordering::Relaxed);
            self.logger.log(&Event::FlowsExpired {
                removed,
                remaining: self.table.len(),
            });
        }
        removed
    }
}

impl Worker for ExpiryWorker {
    fn name(&self) -> &'static str {
        "expiry"
    }

    fn run(&mut self, running: &AtomicBool) {
        self.logger.log(&Event::WorkerStarted { worker: self.name() });

        while running.load(Ordering::Relaxed) {
            self.sweep(Instant::now());
            sleep_while_running(running, self.interval);
        }

        self.logger.log(&Event::WorkerStopped { worker: self.name() });
    }
}
