pub mod context;
pub mod scheduler;
pub mod stats;

pub use context::EngineContext;
pub use scheduler::{DrainReport, LoopExit, Scheduler, SchedulerConfig, SchedulerState};
pub use stats::{Stats, StatsSnapshot};
