pub mod config;
pub mod core;
pub mod error;
pub mod logging;

pub use config::{Cli, DeleteStrategy, SyncConfig};
pub use crate::core::{EventSink, Scheduler, SchedulerState, SyncEngine, SyncEvent, SyncReport, TracingSink};
pub use error::{Result, SyncError};
pub use logging::LogConfig;
