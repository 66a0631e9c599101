mod cli;

use clap::Parser;
use cli::Cli;
use fanout_watch::error::MonitorError;
use fanout_watch::logger::{Event, Logger, SharedLogger};
use fanout_watch::monitor::types::{SessionStats, SharedStats, ShutdownFlag};
use fanout_watch::monitor::{start_monitor, MonitorConfig};
use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logger: SharedLogger = match Logger::new(cli.json, cli.log_file.as_deref()) {
        Ok(l) => Arc::new(l),
        Err(e) => {
            eprintln!("{}", MonitorError::Logger(e));
            return ExitCode::FAILURE;
        }
    };

    match run(&cli, &logger) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger.log(&Event::Info { message: &format!("Monitor error: {}", e) });
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, logger: &SharedLogger) -> Result<(), MonitorError> {
    let session_start = Instant::now();
    let stats = SessionStats::new();
    let shutdown: ShutdownFlag = Arc::new(AtomicBool::new(false));

    // Installed before startup so an early Ctrl+C still goes through stop + join.
    register_shutdown_handler(Arc::clone(&shutdown));

    let cfg = MonitorConfig {
        interface:         cli.interface.clone(),
        pcap_file:         cli.pcap_file.clone(),
        thresholds:        cli.thresholds(),
        max_age:           cli.max_age(),
        expiry_interval:   cli.expiry_interval(),
        analysis_interval: cli.analysis_interval(),
        recv_timeout:      cli.recv_timeout(),
        logger:            Arc::clone(logger),
        stats:             Arc::clone(&stats),
        shutdown:          Arc::clone(&shutdown),
    };

    // Nothing is running yet if this fails.
    let monitor = start_monitor(&cfg)?;

    spawn_keystroke_listener(Arc::clone(&shutdown));
    logger.log(&Event::Info { message: "Enter 'x' to stop detecting" });

    // Give the analyzer one more cycle after a replay file runs dry.
    let linger = cfg.analysis_interval + Duration::from_millis(100);
    monitor.wait(linger);
    let capture_failed = monitor.capture_failed();

    logger.log(&Event::Info { message: "Terminating workers..." });
    monitor.stop();

    print_summary(logger, &stats, session_start);
    if capture_failed {
        return Err(MonitorError::CaptureAborted);
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Sets `shutdown` on Ctrl+C.
fn register_shutdown_handler(shutdown: ShutdownFlag) {
    let result = ctrlc::set_handler(move || {
        println!("\n[!] Ctrl+C received, shutting down...");
        shutdown.store(true, Ordering::SeqCst);
    });
    if let Err(e) = result {
        eprintln!("[!] could not register Ctrl+C handler: {}", e);
    }
}

/// Sets `shutdown` when a line consisting of `x` or `X` is read from stdin.
///
/// The reader thread is detached: a blocking stdin read cannot be interrupted,
/// and it holds no resources beyond the flag.
fn spawn_keystroke_listener(shutdown: ShutdownFlag) {
    let spawned = thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().eq_ignore_ascii_case("x") {
                    shutdown.store(true, Ordering::SeqCst);
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        eprintln!("[!] could not start keystroke listener: {}", e);
    }
}

/// Prints session summary statistics.
fn print_summary(logger: &SharedLogger, stats: &SharedStats, session_start: Instant) {
    logger.log(&Event::SessionSummary {
        duration_secs:    session_start.elapsed().as_secs(),
        frames_total:     stats.frames_total.load(Ordering::Relaxed),
        frames_malformed: stats.frames_malformed.load(Ordering::Relaxed),
        flows_recorded:   stats.flows_recorded.load(Ordering::Relaxed),
        flows_expired:    stats.flows_expired.load(Ordering::Relaxed),
        alerts_emitted:   stats.alerts_emitted.load(Ordering::Relaxed),
        capture_errors:   stats.capture_errors.load(Ordering::Relaxed),
    });
}
