use crate::monitor::config::TIER_COUNT;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use std::time::Duration;

/// Identifies one conversation target for fan-out purposes.
///
/// Only the destination port is part of the key: every packet a source sends
/// to the same `(host, port)` pair refreshes a single entry, whichever source
/// port it came from.
#[derive(Hash, Eq, PartialEq, Debug, Clone, PartialOrd, Ord)]
pub struct FlowKey {
    pub src_ip:   String,
    pub dst_ip:   String,
    pub dst_port: u16,
}

impl FlowKey {
    pub fn new(src_ip: impl Into<String>, dst_ip: impl Into<String>, dst_port: u16) -> Self {
        Self {
            src_ip: src_ip.into(),
            dst_ip: dst_ip.into(),
            dst_port,
        }
    }
}

/// Per-window flow counts for one source, indexed like [`crate::monitor::config::WINDOW_TIERS`].
pub type FanOutCounts = [usize; TIER_COUNT];

/// Source address → per-window counts, rebuilt from scratch every analysis cycle.
pub type FanOutSnapshot = HashMap<String, FanOutCounts>;

/// A port-scan detection for one source at one window tier.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub src:              String,
    /// Index of the violated tier.
    pub tier:             usize,
    /// Label of the violated tier, e.g. `"1min"`.
    pub label:            &'static str,
    /// Length of the violated window.
    pub window:           Duration,
    /// Distinct flows seen from `src` inside the violated window.
    pub observed:         usize,
    pub threshold:        usize,
    /// Average flows per second over the widest window.
    pub per_second:       f64,
    /// Average flows per minute over the widest window.
    pub per_minute:       f64,
    /// Raw flow count of the widest window.
    pub per_five_minutes: f64,
}

impl Alert {
    /// Human explanation of which threshold was crossed.
    pub fn reason(&self) -> String {
        format!(
            "Fan-Out-Rate in the past {} seconds was {} > {}",
            self.window.as_secs(),
            self.observed,
            self.threshold,
        )
    }
}

/// Cooperative stop flag; workers keep looping while it reads `true`.
pub type RunFlag = Arc<AtomicBool>;

/// Set by the Ctrl+C handler or the termination keystroke.
pub type ShutdownFlag = Arc<AtomicBool>;

/// Running totals for the end-of-session summary.
///
/// Every counter is monotonic and updated with relaxed atomics; the summary is
/// only read after all workers have been joined.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Frames handed to the dissector.
    pub frames_total:     AtomicU64,
    /// Frames dropped because a header was truncated.
    pub frames_malformed: AtomicU64,
    /// TCP/UDP flows written to the contact table (inserts and refreshes).
    pub flows_recorded:   AtomicU64,
    /// Entries removed by the expiry worker.
    pub flows_expired:    AtomicU64,
    pub alerts_emitted:   AtomicU64,
    /// Receive failures that ended capture after startup.
    pub capture_errors:   AtomicU64,
}

pub type SharedStats = Arc<SessionStats>;

impl SessionStats {
    pub fn new() -> SharedStats {
        Arc::new(Self::default())
    }
}
