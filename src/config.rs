use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result, MAX_CONCURRENT_CEILING};
use crate::task::{validate_concurrency, SubagentType};

/// Command line used to launch one kind of subagent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl AgentSpec {
    fn claude(role: &str, description: &str) -> Self {
        Self {
            command: "claude".into(),
            args: vec![
                "-p".into(),
                "--append-system-prompt".into(),
                format!("You are a {} subagent. {}", role, description),
            ],
            description: description.into(),
        }
    }
}

fn default_subagents() -> BTreeMap<SubagentType, AgentSpec> {
    let roles = [
        (SubagentType::Coder, "Implements changes and fixes bugs"),
        (SubagentType::Researcher, "Investigates and explains code"),
        (SubagentType::Reviewer, "Reviews code for bugs and quality issues"),
        (SubagentType::Planner, "Breaks work into implementation plans"),
        (SubagentType::Finder, "Locates files, symbols and usages"),
        (SubagentType::Oracle, "Reasons about hard debugging and design questions"),
        (SubagentType::Librarian, "Looks up library and API documentation"),
    ];
    roles
        .into_iter()
        .map(|(kind, description)| (kind, AgentSpec::claude(kind.as_str(), description)))
        .collect()
}

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Default slot count when a request does not name one
    pub max_concurrent: usize,
    /// Per-task timeout
    pub task_timeout_secs: u64,
    /// Timeout for a single routing decision
    pub router_timeout_secs: u64,
    /// Used when routing fails or times out
    pub fallback_subagent: SubagentType,
    /// Max characters of each result quoted in the digest
    pub digest_result_limit: usize,
    /// When set, also truncates the per-task `result` field of the report
    pub task_result_limit: Option<usize>,
    /// Launch commands per subagent type
    pub subagents: BTreeMap<SubagentType, AgentSpec>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: MAX_CONCURRENT_CEILING,
            task_timeout_secs: 600,
            router_timeout_secs: 15,
            fallback_subagent: SubagentType::Researcher,
            digest_result_limit: 3000,
            task_result_limit: None,
            subagents: default_subagents(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the `orchestrator` section of `<state_dir>/config.json`.
    /// Missing file or section yields the defaults. Configured subagents are
    /// merged over the default launch commands.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let config_path = state_dir.join("config.json");
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: serde_json::Value = serde_json::from_str(&content)?;
        let mut loaded = match config.get("orchestrator") {
            Some(section) => serde_json::from_value::<Self>(section.clone())?,
            None => Self::default(),
        };
        let mut subagents = default_subagents();
        subagents.append(&mut loaded.subagents);
        loaded.subagents = subagents;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Global config location, used when the state dir has none
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("conductor"))
    }

    pub fn validate(&self) -> Result<()> {
        validate_concurrency(self.max_concurrent)?;
        if self.fallback_subagent.is_auto() {
            return Err(OrchestratorError::Config(
                "fallback_subagent must be a concrete type".into(),
            ));
        }
        if self.task_timeout_secs == 0 {
            return Err(OrchestratorError::Config(
                "task_timeout_secs must be positive".into(),
            ));
        }
        if self.digest_result_limit == 0 {
            return Err(OrchestratorError::Config(
                "digest_result_limit must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn router_timeout(&self) -> Duration {
        Duration::from_secs(self.router_timeout_secs)
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_router_timeout(mut self, timeout: Duration) -> Self {
        self.router_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_fallback_subagent(mut self, kind: SubagentType) -> Self {
        self.fallback_subagent = kind;
        self
    }

    pub fn with_digest_result_limit(mut self, limit: usize) -> Self {
        self.digest_result_limit = limit;
        self
    }

    pub fn with_task_result_limit(mut self, limit: Option<usize>) -> Self {
        self.task_result_limit = limit;
        self
    }
}
