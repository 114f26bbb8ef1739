use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ToolRegistry;
use crate::config::{AgentSpec, OrchestratorConfig};
use crate::error::RuntimeError;
use crate::task::SubagentType;

/// Environment variable listing the parent's tools for a child session
pub const PARENT_TOOLS_ENV: &str = "CONDUCTOR_PARENT_TOOLS";

/// Lines of stderr kept in an exit-status error
const STDERR_TAIL_LINES: usize = 20;

/// Everything a runtime needs to run one subagent session
#[derive(Clone)]
pub struct AgentRequest {
    pub task_id: String,
    /// Always concrete; `auto` is resolved before dispatch
    pub subagent_type: SubagentType,
    pub prompt: String,
    pub tools: Arc<dyn ToolRegistry>,
}

impl std::fmt::Debug for AgentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRequest")
            .field("task_id", &self.task_id)
            .field("subagent_type", &self.subagent_type)
            .field("prompt_len", &self.prompt.len())
            .finish()
    }
}

/// Executes a single reasoning session and returns its text result.
///
/// `cancel` is a best-effort signal; implementations that cannot interrupt
/// the underlying call may ignore it.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn run(
        &self,
        request: AgentRequest,
        cancel: CancellationToken,
    ) -> Result<String, RuntimeError>;
}

/// Runs each subagent as a child process (`claude -p`, `codex`, ...) with the
/// prompt as the last argument; stdout is the result.
pub struct CommandRuntime {
    subagents: BTreeMap<SubagentType, AgentSpec>,
    working_dir: PathBuf,
    log_dir: Option<PathBuf>,
}

impl CommandRuntime {
    pub fn new(config: &OrchestratorConfig, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            subagents: config.subagents.clone(),
            working_dir: working_dir.into(),
            log_dir: None,
        }
    }

    /// Mirror each session's stdout into `<log_dir>/<task_id>.log`
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        let log_dir = log_dir.into();
        std::fs::create_dir_all(&log_dir).ok();
        self.log_dir = Some(log_dir);
        self
    }

    fn log_path(&self, task_id: &str) -> Option<PathBuf> {
        self.log_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.log", task_id)))
    }
}

/// Reads stdout line by line as raw bytes. Invalid UTF-8 is replaced, never
/// an error; the log receives the bytes unchanged.
async fn collect_stdout<R>(stream: R, log_path: Option<PathBuf>) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut log_file = match log_path {
        Some(path) => tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .ok(),
        None => None,
    };

    let mut output = String::new();
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw).await? == 0 {
            break;
        }
        if let Some(ref mut file) = log_file {
            let _ = file.write_all(&raw).await;
        }
        let line = String::from_utf8_lossy(&raw);
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(line.trim_end_matches(|c| c == '\n' || c == '\r'));
    }
    Ok(output)
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[async_trait]
impl AgentRuntime for CommandRuntime {
    async fn run(
        &self,
        request: AgentRequest,
        cancel: CancellationToken,
    ) -> Result<String, RuntimeError> {
        let spec = self.subagents.get(&request.subagent_type).ok_or_else(|| {
            RuntimeError::Failed(format!(
                "no agent configured for subagent type '{}'",
                request.subagent_type
            ))
        })?;

        let mut args = spec.args.clone();
        args.push(request.prompt.clone());

        debug!(
            task_id = %request.task_id,
            command = %spec.command,
            "spawning subagent process"
        );

        let mut child = Command::new(&spec.command)
            .args(&args)
            .current_dir(&self.working_dir)
            .env(PARENT_TOOLS_ENV, request.tools.tool_names().join(","))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RuntimeError::Spawn {
                command: spec.command.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let log_path = self.log_path(&request.task_id);

        let stdout_task = tokio::spawn(async move {
            match stdout {
                Some(stream) => collect_stdout(stream, log_path).await,
                None => Ok(String::new()),
            }
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stream) = stderr {
                let _ = stream.read_to_end(&mut buf).await;
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(RuntimeError::Cancelled);
            }
        };

        let output = stdout_task
            .await
            .map_err(|e| RuntimeError::Failed(e.to_string()))??;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(RuntimeError::ExitStatus {
                command: spec.command.clone(),
                code: status.code(),
                stderr: tail(&stderr, STDERR_TAIL_LINES),
            });
        }
        Ok(output)
    }
}
