//! Frame sources feeding the capture worker.
//!
//! The capture worker only needs "give me the next link-layer frame, or tell
//! me the receive timed out". Live capture and offline replay both go through
//! libpcap; an in-memory source backs tests and synthetic runs.

use crate::error::CaptureError;
use crate::monitor::config::SNAPLEN;
use pcap::{Active, Capture, Device, Offline};
use std::collections::VecDeque;
use std::time::Duration;

/// Outcome of one blocking receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A complete Ethernet frame.
    Frame(Vec<u8>),
    /// Nothing arrived within the receive timeout.
    Timeout,
    /// The source has no more frames (end of a replay file).
    Exhausted,
}

/// Blocking supplier of raw Ethernet frames.
pub trait FrameSource: Send {
    /// Waits at most the source's receive timeout for the next frame.
    fn receive(&mut self) -> Result<Received, CaptureError>;

    /// Short description for log output.
    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn receive(&mut self) -> Result<Received, CaptureError> {
        (**self).receive()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

fn timeout_ms(timeout: Duration) -> i32 {
    timeout.as_millis().clamp(1, i32::MAX as u128) as i32
}

// ── Live capture ──────────────────────────────────────────────────────────────

/// Promiscuous live capture on one interface.
pub struct LiveSource {
    device: String,
    cap:    Capture<Active>,
}

impl LiveSource {
    /// Opens `interface`, or libpcap's default device when `None`.
    ///
    /// Fails if the device cannot be found or opened (typically missing
    /// capture privileges); no worker should be started in that case.
    pub fn open(interface: Option<&str>, timeout: Duration) -> Result<Self, CaptureError> {
        let device = match interface {
            Some(name) => name.to_string(),
            None => {
                Device::lookup()
                    .map_err(CaptureError::Lookup)?
                    .ok_or(CaptureError::NoDevice)?
                    .name
            }
        };

        let open_err = |source| CaptureError::Open { device: device.clone(), source };
        let cap = Capture::from_device(device.as_str())
            .map_err(open_err)?
            .promisc(true)
            .snaplen(SNAPLEN)
            .timeout(timeout_ms(timeout))
            .open()
            .map_err(open_err)?;

        Ok(Self { device, cap })
    }
}

impl FrameSource for LiveSource {
    fn receive(&mut self) -> Result<Received, CaptureError> {
        match self.cap.next_packet() {
            Ok(pkt) => Ok(Received::Frame(pkt.data.to_vec())),
            Err(pcap::Error::TimeoutExpired) => Ok(Received::Timeout),
            Err(e) => Err(CaptureError::Read(e)),
        }
    }

    fn describe(&self) -> String {
        format!("live capture on {}", self.device)
    }
}

// ── PCAP file replay ──────────────────────────────────────────────────────────

/// Frames read back from a saved pcap file.
pub struct ReplaySource {
    path: String,
    cap:  Capture<Offline>,
}

impl ReplaySource {
    pub fn open(path: &str) -> Result<Self, CaptureError> {
        let cap = Capture::from_file(path).map_err(|source| CaptureError::Replay {
            path: path.to_string(),
            source,
        })?;
        Ok(Self { path: path.to_string(), cap })
    }
}

impl FrameSource for ReplaySource {
    fn receive(&mut self) -> Result<Received, CaptureError> {
        match self.cap.next_packet() {
            Ok(pkt) => Ok(Received::Frame(pkt.data.to_vec())),
            Err(pcap::Error::NoMorePackets) => Ok(Received::Exhausted),
            Err(e) => Err(CaptureError::Read(e)),
        }
    }

    fn describe(&self) -> String {
        format!("replay of {}", self.path)
    }
}

// ── In-memory ─────────────────────────────────────────────────────────────────

/// Plays back a fixed script of receive outcomes, then reports `Exhausted`.
#[derive(Debug, Default)]
pub struct MemorySource {
    script: VecDeque<Received>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_frames<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        Self { script: frames.into_iter().map(Received::Frame).collect() }
    }

    pub fn push_frame(&mut self, frame: Vec<u8>) -> &mut Self {
        self.script.push_back(Received::Frame(frame));
        self
    }

    pub fn push_timeout(&mut self) -> &mut Self {
        self.script.push_back(Received::Timeout);
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl FrameSource for MemorySource {
    fn receive(&mut self) -> Result<Received, CaptureError> {
        Ok(self.script.pop_front().unwrap_or(Received::Exhausted))
    }

    fn describe(&self) -> String {
        format!("in-memory source ({} queued)", self.script.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_plays_script_then_exhausts() {
        let mut src = MemorySource::new();
        src.push_frame(vec![1, 2, 3]).push_timeout();

        assert_eq!(src.receive().unwrap(), Received::Frame(vec![1, 2, 3]));
        assert_eq!(src.receive().unwrap(), Received::Timeout);
        assert_eq!(src.receive().unwrap(), Received::Exhausted);
        assert_eq!(src.receive().unwrap(), Received::Exhausted);
    }

    #[test]
    fn boxed_sources_delegate() {
        let mut src: Box<dyn FrameSource> = Box::new(MemorySource::from_frames(vec![vec![0xaa]]));
        assert!(src.describe().contains("1 queued"));
        assert_eq!(src.receive().unwrap(), Received::Frame(vec![0xaa]));
    }

    #[test]
    fn missing_replay_file_is_an_error() {
        let err = ReplaySource::open("/nonexistent/capture.pcap").err().unwrap();
        assert!(matches!(err, CaptureError::Replay { .. }));
    }

    #[test]
    fn timeout_is_clamped_to_pcap_range() {
        assert_eq!(timeout_ms(Duration::from_secs(5)), 5000);
        assert_eq!(timeout_ms(Duration::ZERO), 1);
    }
}
