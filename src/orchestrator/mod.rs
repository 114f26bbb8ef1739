mod event;
mod executor;
mod gate;
mod report;
mod runner;

pub use event::OrchestratorEvent;
pub use executor::{Executor, TIMEOUT_ERROR};
pub use gate::{ConcurrencyGate, GateError, GatePermit};
pub use report::{truncate_text, Outcome, Report, ReportLimits, TaskReport};
pub use runner::Orchestrator;
