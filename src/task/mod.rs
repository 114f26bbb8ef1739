mod plan;
#[allow(clippy::module_inception)]
mod task;

pub use plan::{
    validate_concurrency, OrchestrateRequest, ParallelRequest, PipelineRequest, PipelineStep,
    Plan, PlanBody, Request, TaskSpec, Topology, PREVIOUS_RESULT_PLACEHOLDER,
};
pub use task::{SubagentType, Task, TaskStatus};
