//! Port-scan detection engine.
//!
//! Three workers share one [`ContactTable`]:
//!
//! - **capture** reads frames, dissects them and upserts TCP/UDP flows;
//! - **expiry** periodically drops flows older than the maximum age;
//! - **analyzer** periodically derives per-source fan-out counts for the
//!   1 s / 1 min / 5 min windows and reports sources that exceed a threshold.
//!
//! The workers only interact through the table. [`start_monitor`] opens the
//! frame source before any thread is spawned, so a capture failure is returned
//! to the caller with nothing left running.

pub mod capture;
pub mod config;
pub mod detection;
pub mod eviction;
pub mod parsers;
pub mod source;
pub mod table;
pub mod types;
pub mod worker;

use crate::error::{MonitorError, Result};
use crate::logger::{Event, SharedLogger};
use crate::monitor::capture::CaptureWorker;
use crate::monitor::config::*;
use crate::monitor::detection::RateAnalyzer;
use crate::monitor::eviction::ExpiryWorker;
use crate::monitor::source::{FrameSource, LiveSource, ReplaySource};
use crate::monitor::table::{ContactTable, SharedTable};
use crate::monitor::types::{SharedStats, ShutdownFlag};
use crate::monitor::worker::{Spawner, ThreadSpawner, Worker, WorkerGroup};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Configuration bundle passed from `main` into the monitoring engine.
pub struct MonitorConfig {
    /// Interface for live capture; `None` lets libpcap pick the default.
    pub interface:         Option<String>,
    /// Path to a pcap file for offline replay, or `None` for live capture.
    pub pcap_file:         Option<String>,
    /// Count thresholds for the three window tiers.
    pub thresholds:        Thresholds,
    /// Flows older than this are expired from the table.
    pub max_age:           Duration,
    pub expiry_interval:   Duration,
    pub analysis_interval: Duration,
    /// Longest a single live receive may block.
    pub recv_timeout:      Duration,
    pub logger:            SharedLogger,
    pub stats:             SharedStats,
    /// Set by the driver (Ctrl+C, `x`) to end [`Monitor::wait`].
    pub shutdown:          ShutdownFlag,
}

impl MonitorConfig {
    /// Live capture on the default device with all default settings.
    pub fn new(logger: SharedLogger, stats: SharedStats) -> Self {
        Self {
            interface:         None,
            pcap_file:         None,
            thresholds:        Thresholds::default(),
            max_age:           DEFAULT_MAX_AGE,
            expiry_interval:   EXPIRY_INTERVAL,
            analysis_interval: ANALYSIS_INTERVAL,
            recv_timeout:      RECV_TIMEOUT,
            logger,
            stats,
            shutdown:          Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Opens the frame source selected by `cfg`: a replay file when one is given,
/// a live capture otherwise.
pub fn open_source(cfg: &MonitorConfig) -> Result<Box<dyn FrameSource>> {
    let source: Box<dyn FrameSource> = match cfg.pcap_file {
        Some(ref path) => Box::new(ReplaySource::open(path)?),
        None => Box::new(LiveSource::open(cfg.interface.as_deref(), cfg.recv_timeout)?),
    };
    cfg.logger.log(&Event::CaptureOpened { source: &source.describe() });
    Ok(source)
}

/// Opens the configured frame source and starts all three workers.
pub fn start_monitor(cfg: &MonitorConfig) -> Result<Monitor> {
    let source = open_source(cfg)?;
    start_with_source(cfg, source)
}

/// Starts the workers on an already opened frame source.
///
/// If any worker fails to spawn, the ones already running are stopped and
/// joined before the error is returned.
pub fn start_with_source<S: FrameSource + 'static>(cfg: &MonitorConfig, source: S) -> Result<Monitor> {
    start_with_spawner(cfg, source, &mut ThreadSpawner)
}

/// Like [`start_with_source`], with worker threads created by `spawner`.
pub fn start_with_spawner<S, P>(cfg: &MonitorConfig, source: S, spawner: &mut P) -> Result<Monitor>
where
    S: FrameSource + 'static,
    P: Spawner,
{
    let table = ContactTable::shared();
    let mut workers = WorkerGroup::new();

    if let Err(e) = launch_all(cfg, source, &table, spawner, &mut workers) {
        cfg.logger.log(&Event::Info {
            message: &format!("startup failed, stopping {} started workers", workers.len()),
        });
        workers.shutdown();
        return Err(e);
    }

    Ok(Monitor {
        workers,
        table,
        logger:   Arc::clone(&cfg.logger),
        stats:    Arc::clone(&cfg.stats),
        shutdown: Arc::clone(&cfg.shutdown),
    })
}

fn launch_all<S: FrameSource + 'static, P: Spawner>(
    cfg:     &MonitorConfig,
    source:  S,
    table:   &SharedTable,
    spawner: &mut P,
    workers: &mut WorkerGroup,
) -> Result<()> {
    launch(
        spawner,
        workers,
        CaptureWorker::new(source, Arc::clone(table), Arc::clone(&cfg.logger), Arc::clone(&cfg.stats)),
    )?;
    launch(
        spawner,
        workers,
        ExpiryWorker::new(
            Arc::clone(table),
            cfg.max_age,
            cfg.expiry_interval,
            Arc::clone(&cfg.logger),
            Arc::clone(&cfg.stats),
        ),
    )?;
    launch(
        spawner,
        workers,
        RateAnalyzer::new(
            Arc::clone(table),
            cfg.thresholds.tiers(),
            cfg.analysis_interval,
            Arc::clone(&cfg.logger),
            Arc::clone(&cfg.stats),
        ),
    )
}

fn launch<P: Spawner, W: Worker>(spawner: &mut P, workers: &mut WorkerGroup, worker: W) -> Result<()> {
    let name = worker.name();
    let handle = spawner
        .spawn(worker)
        .map_err(|source| MonitorError::Spawn { worker: name, source })?;
    workers.push(handle);
    Ok(())
}

/// A running monitor: the shared table plus the handles of its workers.
pub struct Monitor {
    workers: WorkerGroup,
    table:   SharedTable,
    logger:   SharedLogger,
    stats:    SharedStats,
    shutdown: ShutdownFlag,
}

impl Monitor {
    pub fn table(&self) -> &SharedTable {
        &self.table
    }

    /// `true` once the capture worker has left its loop (replay finished or
    /// the capture device failed).
    pub fn capture_finished(&self) -> bool {
        self.workers.get("capture").is_some_and(|h| h.is_finished())
    }

    /// `true` if capture ended on a source error rather than a stop request
    /// or the end of a replay.
    pub fn capture_failed(&self) -> bool {
        self.stats.capture_errors.load(Ordering::Relaxed) > 0
    }

    /// Blocks until the shutdown flag is set or the capture worker has
    /// finished.
    ///
    /// After capture finishes the call lingers for `linger` so the analyzer
    /// gets at least one more cycle over the final table contents.
    pub fn wait(&self, linger: Duration) {
        while !self.shutdown.load(Ordering::SeqCst) {
            if self.capture_finished() {
                thread::sleep(linger);
                break;
            }
            thread::sleep(STOP_POLL);
        }
    }

    /// Signals every worker to stop and waits for all of them.
    pub fn stop(self) {
        self.logger.log(&Event::Info { message: "Stopping workers..." });
        for name in self.workers.shutdown() {
            self.logger.log(&Event::Info { message: &format!("{} worker panicked", name) });
        }
    }
}
