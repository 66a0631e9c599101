//! Error types for the monitor.
//!
//! Dissection errors never leave the capture worker; they are counted and the
//! frame is dropped. Capture and spawn errors only occur while the monitor is
//! starting and are returned to the driver; a capture failure after startup
//! ends the run and surfaces as [`MonitorError::CaptureAborted`].

use std::io;
use thiserror::Error;

/// A frame was too short for the header expected at some layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DissectError {
    #[error("truncated {layer} header: need {needed} bytes, got {got}")]
    Truncated {
        layer:  &'static str,
        needed: usize,
        got:    usize,
    },
}

/// Failures of the frame source (libpcap).
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("pcap device lookup failed: {0}")]
    Lookup(#[source] pcap::Error),

    #[error("no capture device found")]
    NoDevice,

    #[error("cannot open capture on '{device}': {source}")]
    Open {
        device: String,
        #[source]
        source: pcap::Error,
    },

    #[error("cannot open pcap file '{path}': {source}")]
    Replay {
        path: String,
        #[source]
        source: pcap::Error,
    },

    #[error("capture read failed: {0}")]
    Read(#[source] pcap::Error),
}

/// Errors surfaced by [`crate::monitor::start_monitor`] and the driver.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("failed to spawn {worker} worker: {source}")]
    Spawn {
        worker: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("capture stopped on a source error")]
    CaptureAborted,

    #[error("cannot open log file: {0}")]
    Logger(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
