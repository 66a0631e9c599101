use clap::Parser;
use fanout_watch::monitor::config::{
    Thresholds, ANALYSIS_INTERVAL, DEFAULT_MAX_AGE, EXPIRY_INTERVAL, RECV_TIMEOUT, WINDOW_TIERS,
};
use std::time::Duration;

/// fanout-watch — passive port-scan detector.
///
/// Watches link-layer traffic, records every (source, destination, port)
/// contact and reports sources whose fan-out over the last second, minute or
/// five minutes exceeds a threshold. Type `x` and Enter (or press Ctrl+C) to
/// stop.
#[derive(Parser, Debug, Clone)]
#[command(
    name    = "fanout-watch",
    version,
    about   = "Passive port-scan detector based on fan-out rates",
    long_about = None,
)]
pub struct Cli {
    // ── Capture ──────────────────────────────────────────────────────────────

    /// Network interface to capture on.
    ///
    /// If omitted, libpcap's default device is used. Live capture usually
    /// needs root or CAP_NET_RAW.
    #[arg(short = 'i', long = "interface", value_name = "IFACE")]
    pub interface: Option<String>,

    /// Read packets from a saved PCAP file instead of a live interface.
    ///
    /// The run ends on its own once the file has been fully replayed.
    #[arg(short = 'r', long = "read", value_name = "FILE")]
    pub pcap_file: Option<String>,

    /// Longest a single live receive may block, in milliseconds.
    ///
    /// Also bounds how long shutdown waits for the capture worker.
    #[arg(long = "recv-timeout-ms", value_name = "MS", default_value_t = RECV_TIMEOUT.as_millis() as u64)]
    pub recv_timeout_ms: u64,

    // ── Logging ──────────────────────────────────────────────────────────────

    /// Write log output to this file in addition to stdout.
    #[arg(short = 'o', long = "log-file", value_name = "PATH")]
    pub log_file: Option<String>,

    /// Emit log entries as newline-delimited JSON (NDJSON).
    #[arg(short = 'j', long = "json")]
    pub json: bool,

    // ── Detection thresholds ─────────────────────────────────────────────────

    /// Distinct flows from one source within 1 second that flag a scan.
    #[arg(long = "limit-1s", value_name = "N", default_value_t = WINDOW_TIERS[0].threshold)]
    pub limit_1s: usize,

    /// Distinct flows from one source within 1 minute that flag a scan.
    #[arg(long = "limit-1m", value_name = "N", default_value_t = WINDOW_TIERS[1].threshold)]
    pub limit_1m: usize,

    /// Distinct flows from one source within 5 minutes that flag a scan.
    #[arg(long = "limit-5m", value_name = "N", default_value_t = WINDOW_TIERS[2].threshold)]
    pub limit_5m: usize,

    // ── Table maintenance ────────────────────────────────────────────────────

    /// Seconds after which an unrefreshed flow is dropped from the table.
    #[arg(long = "max-age", value_name = "SECS", default_value_t = DEFAULT_MAX_AGE.as_secs())]
    pub max_age: u64,

    /// Milliseconds between two expiry sweeps (at least 1).
    #[arg(
        long = "expiry-interval-ms",
        value_name = "MS",
        default_value_t = EXPIRY_INTERVAL.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    pub expiry_interval_ms: u64,

    /// Milliseconds between two rate-analysis cycles (at least 1).
    #[arg(
        long = "analysis-interval-ms",
        value_name = "MS",
        default_value_t = ANALYSIS_INTERVAL.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    pub analysis_interval_ms: u64,
}

impl Cli {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            per_second:       self.limit_1s,
            per_minute:       self.limit_1m,
            per_five_minutes: self.limit_5m,
        }
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age)
    }

    pub fn expiry_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_interval_ms)
    }

    pub fn analysis_interval(&self) -> Duration {
        Duration::from_millis(self.analysis_interval_ms)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
}
