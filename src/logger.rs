//! Structured logging for fanout-watch.
//!
//! Provides a [`Logger`] that writes events to stdout and optionally to a log
//! file. Output can be formatted as human-readable plain text or as
//! newline-delimited JSON (NDJSON) for log shippers.

use crate::monitor::types::Alert;
use chrono::Local;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::sync::{Arc, Mutex};

// ── Event types ──────────────────────────────────────────────────────────────

/// All distinct event kinds the monitor emits.
///
/// `#[serde(tag = "event")]` puts an `"event"` key in every JSON line so
/// consumers can filter by kind.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event<'a> {
    /// Informational startup / status message.
    Info { message: &'a str },

    /// The frame source was opened successfully.
    CaptureOpened { source: &'a str },

    /// The frame source failed after startup; capture stops.
    CaptureError { error: &'a str },

    WorkerStarted { worker: &'a str },

    WorkerStopped { worker: &'a str },

    /// An expiry sweep removed stale flows.
    FlowsExpired { removed: usize, remaining: usize },

    /// A source crossed a fan-out threshold.
    PortScan {
        src:              &'a str,
        tier:             &'static str,
        window_secs:      u64,
        observed:         usize,
        threshold:        usize,
        per_second:       f64,
        per_minute:       f64,
        per_five_minutes: f64,
        reason:           String,
    },

    /// Session summary emitted on shutdown.
    SessionSummary {
        duration_secs:    u64,
        frames_total:     u64,
        frames_malformed: u64,
        flows_recorded:   u64,
        flows_expired:    u64,
        alerts_emitted:   u64,
        capture_errors:   u64,
    },
}

impl<'a> Event<'a> {
    pub fn port_scan(alert: &'a Alert) -> Self {
        Event::PortScan {
            src:              &alert.src,
            tier:             alert.label,
            window_secs:      alert.window.as_secs(),
            observed:         alert.observed,
            threshold:        alert.threshold,
            per_second:       alert.per_second,
            per_minute:       alert.per_minute,
            per_five_minutes: alert.per_five_minutes,
            reason:           alert.reason(),
        }
    }
}

// ── Logger ───────────────────────────────────────────────────────────────────

/// Shared, thread-safe structured logger.
///
/// Constructed once by the driver and handed to every worker as an
/// `Arc<Logger>`. The file writer sits behind a `Mutex` so lines from
/// different workers never interleave.
pub struct Logger {
    json:   bool,
    stdout: bool,
    file:   Option<Mutex<BufWriter<std::fs::File>>>,
}

pub type SharedLogger = Arc<Logger>;

impl Logger {
    /// Creates a new logger.
    ///
    /// # Arguments
    /// * `json`     - Emit NDJSON instead of plain text when `true`.
    /// * `log_path` - If `Some`, open (or create) this file for appended writes.
    ///
    /// # Errors
    /// Returns an `io::Error` if the log file cannot be opened or created.
    pub fn new(json: bool, log_path: Option<&str>) -> io::Result<Self> {
        let file = match log_path {
            Some(path) => {
                let f = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Mutex::new(BufWriter::new(f)))
            }
            None => None,
        };

        Ok(Self { json, stdout: true, file })
    }

    /// A logger that discards everything.
    pub fn quiet() -> Self {
        Self { json: false, stdout: false, file: None }
    }

    /// Logs a single [`Event`] to stdout and, if configured, the log file.
    pub fn log(&self, event: &Event) {
        if !self.stdout && self.file.is_none() {
            return;
        }
        let line = self.render(event);

        if self.stdout {
            println!("{}", line);
        }

        if let Some(mutex) = &self.file {
            if let Ok(mut writer) = mutex.lock() {
                let _ = writeln!(writer, "{}", line);
                let _ = writer.flush();
            }
        }
    }

    /// Formats an event exactly as [`Logger::log`] would write it.
    pub fn render(&self, event: &Event) -> String {
        let timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string();

        if self.json {
            let mut val = serde_json::to_value(event).unwrap_or_default();
            if let Some(obj) = val.as_object_mut() {
                obj.insert("timestamp".to_string(), serde_json::Value::String(timestamp));
            }
            serde_json::to_string(&val).unwrap_or_default()
        } else {
            format!("[{}] {}", timestamp, plain_text(event))
        }
    }
}

/// Formats an [`Event`] as human-readable text (no timestamp).
fn plain_text(event: &Event) -> String {
    match event {
        Event::Info { message } => format!("[INFO] {}", message),

        Event::CaptureOpened { source } => format!("[CAPTURE] reading from {}", source),

        Event::CaptureError { error } => format!("[CAPTURE] stopped: {}", error),

        Event::WorkerStarted { worker } => format!("[WORKER] {} started", worker),

        Event::WorkerStopped { worker } => format!("[WORKER] {} stopped", worker),

        Event::FlowsExpired { removed, remaining } =>
            format!("[EXPIRY] removed {} flows, {} remain", removed, remaining),

        Event::PortScan { src, per_second, per_minute, per_five_minutes, reason, .. } => format!(
            "[PORT SCAN] Port Scanner Detected from IP Address: {}\n\
             \x20  Average Fan-Out Rate Per-Second Over the Last 5mins: {:.3}\n\
             \x20  Average Fan-Out Rate Per-Minute Over the Last 5mins: {:.2}\n\
             \x20  Average Fan-Out Rate Per-5-Minutes Over the Last 5mins: {:.0}\n\
             \x20  Reason: {}",
            src, per_second, per_minute, per_five_minutes, reason
        ),

        Event::SessionSummary {
            duration_secs, frames_total, frames_malformed, flows_recorded, flows_expired, alerts_emitted,
            capture_errors,
        } => format!(
            "[SUMMARY] duration={}s frames={} malformed={} flows={} expired={} alerts={} capture_errors={}",
            duration_secs, frames_total, frames_malformed, flows_recorded, flows_expired, alerts_emitted,
            capture_errors
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn alert() -> Alert {
        Alert {
            src:              "10.0.0.5".to_string(),
            tier:             0,
            label:            "1s",
            window:           Duration::from_secs(1),
            observed:         6,
            threshold:        5,
            per_second:       0.02,
            per_minute:       1.2,
            per_five_minutes: 6.0,
        }
    }

    #[test]
    fn port_scan_text_carries_rates_and_reason() {
        let alert = alert();
        let line = plain_text(&Event::port_scan(&alert));

        assert!(line.contains("10.0.0.5"));
        assert!(line.contains("Per-Second Over the Last 5mins: 0.020"));
        assert!(line.contains("Per-Minute Over the Last 5mins: 1.20"));
        assert!(line.contains("Per-5-Minutes Over the Last 5mins: 6"));
        assert!(line.contains("Reason: Fan-Out-Rate in the past 1 seconds was 6 > 5"));
        assert_eq!(line.lines().count(), 5);
    }

    #[test]
    fn json_lines_are_tagged_and_timestamped() {
        let logger = Logger { json: true, stdout: false, file: None };
        let alert = alert();
        let line = logger.render(&Event::port_scan(&alert));

        let val: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(val["event"], "port_scan");
        assert_eq!(val["src"], "10.0.0.5");
        assert_eq!(val["tier"], "1s");
        assert_eq!(val["window_secs"], 1);
        assert_eq!(val["per_five_minutes"], 6.0);
        assert!(val["timestamp"].is_string());
    }

    #[test]
    fn file_output_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.log");
        let path = path.to_str().unwrap();

        let mut logger = Logger::new(false, Some(path)).unwrap();
        logger.stdout = false;
        logger.log(&Event::Info { message: "first" });
        logger.log(&Event::FlowsExpired { removed: 2, remaining: 9 });

        let contents = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[INFO] first"));
        assert!(lines[1].ends_with("[EXPIRY] removed 2 flows, 9 remain"));
    }
}
