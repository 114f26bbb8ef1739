//! Progress events published while a plan runs.

use crate::task::{SubagentType, TaskStatus, Topology};

use super::report::Outcome;

#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    PlanStarted {
        run_id: String,
        topology: Topology,
        task_count: usize,
    },
    /// A task was admitted and its subagent type resolved.
    TaskStarted {
        run_id: String,
        task_id: String,
        description: String,
        subagent_type: SubagentType,
    },
    /// A task reached a terminal status, dispatched or not.
    TaskFinished {
        run_id: String,
        task_id: String,
        status: TaskStatus,
        duration_ms: u64,
    },
    PlanFinished {
        run_id: String,
        outcome: Outcome,
    },
}

impl OrchestratorEvent {
    pub fn run_id(&self) -> &str {
        match self {
            Self::PlanStarted { run_id, .. }
            | Self::TaskStarted { run_id, .. }
            | Self::TaskFinished { run_id, .. }
            | Self::PlanFinished { run_id, .. } => run_id,
        }
    }
}
