//! Capture worker: frames in, contact-table upserts out.
//!
//! The only writer of the contact table. Each received frame is dissected;
//! IPv4 TCP and UDP frames refresh the `(src, dst, dst_port)` entry with the
//! current time. Everything else is dissected and dropped.

use crate::logger::{Event, SharedLogger};
use crate::monitor::parsers::dissect_frame;
use crate::monitor::source::{FrameSource, Received};
use crate::monitor::table::SharedTable;
use crate::monitor::types::{FlowKey, SharedStats};
use crate::monitor::worker::Worker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

pub struct CaptureWorker<S> {
    source: S,
    table:  SharedTable,
    logger: SharedLogger,
    stats:  SharedStats,
}

impl<S: FrameSource> CaptureWorker<S> {
    pub fn new(source: S, table: SharedTable, logger: SharedLogger, stats: SharedStats) -> Self {
        Self { source, table, logger, stats }
    }

    /// Handles one raw frame, returning the flow it recorded, if any.
    ///
    /// Malformed frames are counted and dropped; they never reach the table.
    pub fn process_frame(&self, frame: &[u8], now: Instant) -> Option<FlowKey> {
        self.stats.frames_total.fetch_add(1, Ordering::Relaxed);

        let dissected = match dissect_frame(frame) {
            Ok(d) => d,
            Err(_) => {
                self.stats.frames_malformed.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let key = dissected.flow_key()?;
        self.table.upsert(key.clone(), now);
        self.stats.flows_recorded.fetch_add(1, Ordering::Relaxed);
        Some(key)
    }
}

impl<S: FrameSource + 'static> Worker for CaptureWorker<S> {
    fn name(&self) -> &'static str {
        "capture"
    }

    fn run(&mut self, running: &AtomicBool) {
        self.logger.log(&Event::WorkerStarted { worker: self.name() });

        while running.load(Ordering::Relaxed) {
            match self.source.receive() {
                Ok(Received::Frame(frame)) => {
                    self.process_frame(&frame, Instant::now());
                }
                // Timeout only exists so the flag above gets re-checked.
                Ok(Received::Timeout) => continue,
                Ok(Received::Exhausted) => {
                    self.logger.log(&Event::Info {
                        message: &format!("{} exhausted", self.source.describe()),
                    });
                    break;
                }
                Err(e) => {
                    self.stats.capture_errors.fetch_add(1, Ordering::Relaxed);
                    self.logger.log(&Event::CaptureError { error: &e.to_string() });
                    break;
                }
            }
        }

        self.logger.log(&Event::WorkerStopped { worker: self.name() });
    }
}
