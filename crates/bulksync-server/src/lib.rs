pub mod bootstrap;
pub mod config;
pub mod error;
pub mod observability;
pub mod sync;

pub use config::{AppConfig, ConfigOverrides};
pub use error::StartupError;
pub use observability::init_tracing;
pub use sync::{CycleOutcome, CycleReport, CycleRunner, SchedulerHandle, SchedulerState, SyncScheduler};
