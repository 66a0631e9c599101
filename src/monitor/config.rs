use std::time::Duration;

/// Age after which a contact-table entry is removed by the expiry worker.
///
/// Matches the widest detection window: a flow older than five minutes can no
/// longer contribute to any fan-out count, so keeping it only costs memory.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(300);

/// Upper bound on a single blocking receive in the capture worker.
///
/// The capture worker only sees the stop flag between receives, so this is
/// also the worst-case shutdown latency of the capture path.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle time between two expiry sweeps.
pub const EXPIRY_INTERVAL: Duration = Duration::from_secs(1);

/// Idle time between two rate-analysis cycles.
pub const ANALYSIS_INTERVAL: Duration = Duration::from_secs(1);

/// Granularity of interruptible sleeps in the background workers.
pub const STOP_POLL: Duration = Duration::from_millis(50);

/// Bytes captured per frame. Only the first 38 are ever read.
pub const SNAPLEN: i32 = 65_536;

/// Number of monitored window tiers.
pub const TIER_COUNT: usize = 3;

/// One monitored time window and the fan-out count that flags a scanner in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowTier {
    /// Flows younger than this count towards the window.
    pub duration:  Duration,
    /// A source is flagged when its count is strictly greater than this.
    pub threshold: usize,
    /// Short human label used in reports.
    pub label:     &'static str,
}

/// Default tier table, shortest window first.
///
/// Index 0 is the one-second window everywhere in the crate: the fan-out
/// snapshot, the blacklist and the alert all use this ordering.
pub const WINDOW_TIERS: [WindowTier; TIER_COUNT] = [
    WindowTier { duration: Duration::from_secs(1),   threshold: 5,   label: "1s"   },
    WindowTier { duration: Duration::from_secs(60),  threshold: 100, label: "1min" },
    WindowTier { duration: Duration::from_secs(300), threshold: 300, label: "5min" },
];

/// Count thresholds for the three tiers, overridable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub per_second:       usize,
    pub per_minute:       usize,
    pub per_five_minutes: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            per_second:       WINDOW_TIERS[0].threshold,
            per_minute:       WINDOW_TIERS[1].threshold,
            per_five_minutes: WINDOW_TIERS[2].threshold,
        }
    }
}

impl Thresholds {
    /// Builds the tier table with these thresholds and the default durations.
    pub fn tiers(&self) -> [WindowTier; TIER_COUNT] {
        let mut tiers = WINDOW_TIERS;
        tiers[0].threshold = self.per_second;
        tiers[1].threshold = self.per_minute;
        tiers[2].threshold = self.per_five_minutes;
        tiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tiers_are_ordered_shortest_first() {
        let tiers = Thresholds::default().tiers();
        assert_eq!(tiers, WINDOW_TIERS);
        assert!(tiers.windows(2).all(|w| w[0].duration < w[1].duration));
    }

    #[test]
    fn overrides_only_touch_thresholds() {
        let tiers = Thresholds { per_second: 1, per_minute: 2, per_five_minutes: 3 }.tiers();
        assert_eq!(tiers.map(|t| t.threshold), [1, 2, 3]);
        assert_eq!(tiers.map(|t| t.duration), WINDOW_TIERS.map(|t| t.duration));
        assert_eq!(tiers[2].label, "5min");
    }

    #[test]
    fn max_age_covers_widest_window() {
        assert!(DEFAULT_MAX_AGE >= WINDOW_TIERS[TIER_COUNT - 1].duration);
    }
}
