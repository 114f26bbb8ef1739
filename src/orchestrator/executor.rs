use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::{AgentRequest, AgentRuntime, ToolRegistry};
use crate::error::RuntimeError;
use crate::task::{Task, TaskStatus};

/// Error text recorded when a task exceeds its time budget
pub const TIMEOUT_ERROR: &str = "timeout";

/// Runs one task against the agent runtime and records the outcome on it.
/// Never retries.
pub struct Executor {
    runtime: Arc<dyn AgentRuntime>,
    tools: Arc<dyn ToolRegistry>,
    timeout: Duration,
}

impl Executor {
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        tools: Arc<dyn ToolRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            runtime,
            tools,
            timeout,
        }
    }

    /// Execute `task`, which must already carry a concrete subagent type.
    ///
    /// `shutdown` stops waiting on the runtime: the task ends `cancelled` and
    /// whatever the runtime produces afterwards is discarded.
    pub async fn execute(&self, mut task: Task, shutdown: &CancellationToken) -> Task {
        if task.subagent_type.is_auto() {
            task.cancel("subagent type was not resolved before dispatch");
            return task;
        }
        if !task.start() {
            return task;
        }

        info!(
            task_id = %task.id,
            subagent = %task.subagent_type,
            description = %task.description,
            "task started"
        );

        let request = AgentRequest {
            task_id: task.id.clone(),
            subagent_type: task.subagent_type,
            prompt: task.prompt.clone(),
            tools: Arc::clone(&self.tools),
        };
        let run = tokio::time::timeout(
            self.timeout,
            self.runtime.run(request, shutdown.child_token()),
        );

        let outcome = tokio::select! {
            outcome = run => Some(outcome),
            _ = shutdown.cancelled() => None,
        };

        match outcome {
            Some(Ok(Ok(result))) => {
                task.succeed(result);
            }
            Some(Ok(Err(RuntimeError::Cancelled))) | None => {
                task.cancel("cancelled");
            }
            Some(Ok(Err(e))) => {
                task.fail(e.to_string());
            }
            Some(Err(_)) => {
                task.fail(TIMEOUT_ERROR);
            }
        }

        match task.status {
            TaskStatus::Succeeded => info!(
                task_id = %task.id,
                duration_ms = task.duration_ms(),
                "task succeeded"
            ),
            _ => warn!(
                task_id = %task.id,
                status = task.status.display_name(),
                error = task.error.as_deref().unwrap_or_default(),
                duration_ms = task.duration_ms(),
                "task did not succeed"
            ),
        }
        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::StaticToolRegistry;
    use crate::task::SubagentType;
    use async_trait::async_trait;

    enum Script {
        Reply(&'static str),
        Fail(&'static str),
        Sleep(Duration),
        HonorCancel,
    }

    struct ScriptedRuntime(Script);

    #[async_trait]
    impl AgentRuntime for ScriptedRuntime {
        async fn run(
            &self,
            request: AgentRequest,
            cancel: CancellationToken,
        ) -> Result<String, RuntimeError> {
            match &self.0 {
                Script::Reply(text) => Ok(format!("{}: {}", request.subagent_type, text)),
                Script::Fail(msg) => Err(RuntimeError::Failed(msg.to_string())),
                Script::Sleep(duration) => {
                    tokio::time::sleep(*duration).await;
                    Ok("slept".into())
                }
                Script::HonorCancel => {
                    cancel.cancelled().await;
                    Err(RuntimeError::Cancelled)
                }
            }
        }
    }

    fn executor(script: Script, timeout: Duration) -> Executor {
        Executor::new(
            Arc::new(ScriptedRuntime(script)),
            Arc::new(StaticToolRegistry::default()),
            timeout,
        )
    }

    fn task() -> Task {
        Task::new(SubagentType::Coder, "do it", "Do it")
    }

    #[tokio::test]
    async fn test_success_records_result_and_timing() {
        let exec = executor(Script::Reply("ok"), Duration::from_secs(5));
        let done = exec.execute(task(), &CancellationToken::new()).await;

        assert_eq!(done.status, TaskStatus::Succeeded);
        assert_eq!(done.result.as_deref(), Some("coder: ok"));
        assert!(done.error.is_none());
        assert!(done.started_at.is_some());
        assert!(done.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_runtime_error_marks_failed() {
        let exec = executor(Script::Fail("model refused"), Duration::from_secs(5));
        let done = exec.execute(task(), &CancellationToken::new()).await;

        assert_eq!(done.status, TaskStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("model refused"));
        assert!(done.result.is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let exec = executor(Script::Sleep(Duration::from_secs(10)), Duration::from_millis(30));
        let done = exec.execute(task(), &CancellationToken::new()).await;

        assert_eq!(done.status, TaskStatus::Failed);
        assert_eq!(done.error.as_deref(), Some(TIMEOUT_ERROR));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_running_task() {
        let exec = executor(Script::Sleep(Duration::from_secs(10)), Duration::from_secs(60));
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let done = exec.execute(task(), &shutdown).await;
        assert_eq!(done.status, TaskStatus::Cancelled);
        assert!(done.result.is_none());
    }

    #[tokio::test]
    async fn test_runtime_sees_cancel_signal() {
        let exec = executor(Script::HonorCancel, Duration::from_secs(60));
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let done = exec.execute(task(), &shutdown).await;
        assert_eq!(done.status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_unresolved_auto_is_never_dispatched() {
        let exec = executor(Script::Reply("ok"), Duration::from_secs(5));
        let auto = Task::new(SubagentType::Auto, "p", "d");
        let done = exec.execute(auto, &CancellationToken::new()).await;

        assert_eq!(done.status, TaskStatus::Cancelled);
        assert!(done.started_at.is_none());
    }
}
