//! Long-lived worker threads with a cooperative stop flag.
//!
//! Each worker owns its loop and polls a keep-running flag at the top of every
//! iteration. The controller only ever flips the flag and joins the thread; it
//! never interrupts a worker mid-iteration.

use crate::monitor::config::STOP_POLL;
use crate::monitor::types::RunFlag;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A unit of work that runs on its own thread until told to stop.
pub trait Worker: Send + 'static {
    /// Thread name, also used in log events.
    fn name(&self) -> &'static str;

    /// Runs the worker loop. Must return soon after `running` becomes `false`.
    fn run(&mut self, running: &AtomicBool);
}

/// Controller-side handle of a started worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name:    &'static str,
    running: RunFlag,
    thread:  thread::JoinHandle<()>,
}

/// Starts `worker` on a named thread with a fresh keep-running flag.
pub fn spawn_worker<W: Worker>(mut worker: W) -> io::Result<WorkerHandle> {
    let name = worker.name();
    let running: RunFlag = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);

    let thread = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || worker.run(&flag))?;

    Ok(WorkerHandle { name, running, thread })
}

/// Starts workers on behalf of the monitor.
pub trait Spawner {
    fn spawn<W: Worker>(&mut self, worker: W) -> io::Result<WorkerHandle>;
}

/// One OS thread per worker, via [`spawn_worker`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn<W: Worker>(&mut self, worker: W) -> io::Result<WorkerHandle> {
        spawn_worker(worker)
    }
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Asks the worker to leave its loop at the next iteration boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// `true` once the worker's loop has returned.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until the worker thread exits. Returns `false` if it panicked.
    pub fn join(self) -> bool {
        self.thread.join().is_ok()
    }
}

/// The set of workers started by one monitor run.
#[derive(Debug, Default)]
pub struct WorkerGroup {
    handles: Vec<WorkerHandle>,
}

impl WorkerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: WorkerHandle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&WorkerHandle> {
        self.handles.iter().find(|h| h.name == name)
    }

    pub fn stop_all(&self) {
        for handle in &self.handles {
            handle.stop();
        }
    }

    /// Joins every worker, returning the names of those that panicked.
    pub fn join_all(self) -> Vec<&'static str> {
        self.handles
            .into_iter()
            .filter_map(|h| {
                let name = h.name;
                (!h.join()).then_some(name)
            })
            .collect()
    }

    /// Stops and joins every worker.
    pub fn shutdown(self) -> Vec<&'static str> {
        self.stop_all();
        self.join_all()
    }
}

/// Sleeps for `total`, waking every [`STOP_POLL`] to check `running`.
///
/// Returns `false` if the flag was cleared before the full duration elapsed.
pub fn sleep_while_running(running: &AtomicBool, total: Duration) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if !running.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(STOP_POLL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counter {
        ticks: Arc<AtomicUsize>,
    }

    impl Worker for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn run(&mut self, running: &AtomicBool) {
            while running.load(Ordering::Relaxed) {
                self.ticks.fetch_add(1, Ordering::Relaxed);
                sleep_while_running(running, Duration::from_millis(5));
            }
        }
    }

    #[test]
    fn stop_then_join_ends_the_loop() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let handle = spawn_worker(Counter { ticks: Arc::clone(&ticks) }).unwrap();
        assert_eq!(handle.name(), "counter");
        assert!(!handle.is_finished());

        thread::sleep(Duration::from_millis(30));
        handle.stop();
        assert!(handle.join());
        assert!(ticks.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn group_shutdown_joins_everything() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut group = WorkerGroup::new();
        for _ in 0..3 {
            group.push(spawn_worker(Counter { ticks: Arc::clone(&ticks) }).unwrap());
        }
        assert_eq!(group.len(), 3);

        assert!(group.shutdown().is_empty());
    }

    #[test]
    fn sleep_returns_early_when_stopped() {
        let running = AtomicBool::new(false);
        let start = Instant::now();
        assert!(!sleep_while_running(&running, Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));

        running.store(true, Ordering::Relaxed);
        assert!(sleep_while_running(&running, Duration::from_millis(10)));
    }
}
