//! Fan-out rate analysis and port-scan alerting.
//!
//! Every cycle the analyzer takes one snapshot of per-source flow counts for
//! all window tiers, then checks each source against the tier thresholds with
//! the table lock already released.
//!
//! A source is reported at most once per tier for the lifetime of the
//! analyzer. Within a cycle only the first newly exceeded tier (shortest
//! window first) produces an alert for a given source.

use crate::logger::{Event, SharedLogger};
use crate::monitor::config::{WindowTier, TIER_COUNT};
use crate::monitor::table::SharedTable;
use crate::monitor::types::{Alert, FanOutCounts, FanOutSnapshot, SharedStats};
use crate::monitor::worker::{sleep_while_running, Worker};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Tiers already reported, per source address. Never shrinks.
pub type Blacklist = HashMap<String, BTreeSet<usize>>;

pub struct RateAnalyzer {
    table:     SharedTable,
    tiers:     [WindowTier; TIER_COUNT],
    interval:  Duration,
    blacklist: Blacklist,
    logger:    SharedLogger,
    stats:     SharedStats,
}

impl RateAnalyzer {
    pub fn new(
        table:    SharedTable,
        tiers:    [WindowTier; TIER_COUNT],
        interval: Duration,
        logger:   SharedLogger,
        stats:    SharedStats,
    ) -> Self {
        Self {
            table,
            tiers,
            interval,
            blacklist: Blacklist::new(),
            logger,
            stats,
        }
    }

    /// Whether `src` has already been reported for tier `tier`.
    pub fn is_reported(&self, src: &str, tier: usize) -> bool {
        self.blacklist.get(src).is_some_and(|t| t.contains(&tier))
    }

    /// Runs one full cycle against reference time `now`: snapshot, evaluate,
    /// and log every resulting alert.
    pub fn analyze(&mut self, now: Instant) -> Vec<Alert> {
        let snapshot = self.table.snapshot(now, &self.tiers);
        let alerts = self.evaluate(&snapshot);

        for alert in &alerts {
            self.logger.log(&Event::port_scan(alert));
            self.stats.alerts_emitted.fetch_add(1, Ordering::Relaxed);
        }
        alerts
    }

    /// Checks a snapshot against the tier thresholds and updates the
    /// blacklist. Alerts come back ordered by source address.
    pub fn evaluate(&mut self, snapshot: &FanOutSnapshot) -> Vec<Alert> {
        let mut sources: Vec<(&String, &FanOutCounts)> = snapshot.iter().collect();
        sources.sort_by(|a, b| a.0.cmp(b.0));

        let mut alerts = Vec::new();
        for (src, counts) in sources {
            let reported = self.blacklist.entry(src.clone()).or_default();

            let violated = self
                .tiers
                .iter()
                .enumerate()
                .find(|(i, tier)| counts[*i] > tier.threshold && !reported.contains(i));

            if let Some((i, tier)) = violated {
                reported.insert(i);
                let (per_second, per_minute, per_five_minutes) = averaged_rates(counts, &self.tiers);
                alerts.push(Alert {
                    src: src.clone(),
                    tier: i,
                    label: tier.label,
                    window: tier.duration,
                    observed: counts[i],
                    threshold: tier.threshold,
                    per_second,
                    per_minute,
                    per_five_minutes,
                });
            }
        }

        self.blacklist.retain(|_, reported| !reported.is_empty());
        alerts
    }
}

/// Average fan-out over the widest window, expressed per second, per minute
/// and per five minutes.
pub fn averaged_rates(counts: &FanOutCounts, tiers: &[WindowTier; TIER_COUNT]) -> (f64, f64, f64) {
    let widest = tiers[TIER_COUNT - 1].duration.as_secs_f64();
    let total = counts[TIER_COUNT - 1] as f64;
    if widest <= 0.0 {
        return (0.0, 0.0, total);
    }
    let per_second = total / widest;
    (per_second, per_second * 60.0, per_second * 300.0)
}

impl Worker for RateAnalyzer {
    fn name(&self) -> &'static str {
        "analyzer"
    }

    fn run(&mut self, running: &AtomicBool) {
        self.logger.log(&Event::WorkerStarted { worker: self.name() });

        while running.load(Ordering::Relaxed) {
            self.analyze(Instant::now());
            sleep_while_running(running, self.interval);
        }

        self.logger.log(&Event::WorkerStopped { worker: self.name() });
    }
}
