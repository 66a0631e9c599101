//! fanout-watch: passive port-scan detection from per-source fan-out rates.
//!
//! The engine lives in [`monitor`]; [`logger`] and [`error`] are shared by the
//! engine and the `fanout-watch` binary.

pub mod error;
pub mod logger;
pub mod monitor;

pub use error::{CaptureError, DissectError, MonitorError};
pub use monitor::table::ContactTable;
pub use monitor::types::{Alert, FlowKey};
pub use monitor::{start_monitor, start_with_source, Monitor, MonitorConfig};
