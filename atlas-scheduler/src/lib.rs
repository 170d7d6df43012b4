pub mod config;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod heartbeat;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod staging;
pub mod stats;

pub use config::SchedulerConfig;
pub use core::SchedulerCore;
pub use error::{Result, SchedulerError};
pub use graph::JobGraph;
pub use queue::{DelayQueue, ReadyQueue};
pub use registry::{Worker, WorkerRegistry};
pub use scheduler::Scheduler;
pub use stats::SystemStats;
