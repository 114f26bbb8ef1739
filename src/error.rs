use thiserror::Error;

/// Hard ceiling on simultaneously running subagents.
pub const MAX_CONCURRENT_CEILING: usize = 10;

/// Plan-level errors. A plan that passes validation always yields a report;
/// these are the only failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("max_concurrent {requested} exceeds the ceiling of {ceiling}")]
    CapacityExceeded { requested: usize, ceiling: usize },

    #[error("max_concurrent must be at least 1")]
    InvalidConcurrency,

    #[error("no tasks provided")]
    EmptyPlan,

    #[error("stage {0} has no tasks")]
    EmptyStage(usize),

    #[error("task '{0}' has an empty prompt")]
    MissingPrompt(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures reported by an agent runtime for a single task.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {code:?}: {stderr}")]
    ExitStatus {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}

/// Router failures. Never surfaced as a task failure; the orchestrator
/// falls back to the configured default subagent.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("router unavailable: {0}")]
    Unavailable(String),

    #[error("could not classify prompt")]
    Unrecognized,
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
