//! Subagent orchestration engine.
//!
//! Fans delegated tasks out to specialist subagents in three topologies
//! (parallel, staged, pipeline) under a bounded concurrency gate, and merges
//! the outcomes into one report.

pub mod agent;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod schema;
pub mod store;
pub mod task;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result, MAX_CONCURRENT_CEILING};
pub use orchestrator::{Orchestrator, OrchestratorEvent, Outcome, Report};
pub use task::{Request, SubagentType, Task, TaskStatus, Topology};
