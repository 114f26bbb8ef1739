use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subagent specialization. `Auto` is resolved once, at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SubagentType {
    Coder,
    Researcher,
    Reviewer,
    Planner,
    Finder,
    Oracle,
    Librarian,
    Auto,
}

impl SubagentType {
    /// Every concrete (routable) type
    pub const CONCRETE: [SubagentType; 7] = [
        Self::Coder,
        Self::Researcher,
        Self::Reviewer,
        Self::Planner,
        Self::Finder,
        Self::Oracle,
        Self::Librarian,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coder => "coder",
            Self::Researcher => "researcher",
            Self::Reviewer => "reviewer",
            Self::Planner => "planner",
            Self::Finder => "finder",
            Self::Oracle => "oracle",
            Self::Librarian => "librarian",
            Self::Auto => "auto",
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    /// All names accepted on the wire, `auto` included
    pub fn names() -> Vec<&'static str> {
        Self::CONCRETE
            .iter()
            .map(|t| t.as_str())
            .chain(std::iter::once("auto"))
            .collect()
    }
}

impl fmt::Display for SubagentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubagentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coder" => Ok(Self::Coder),
            "researcher" => Ok(Self::Researcher),
            "reviewer" => Ok(Self::Reviewer),
            "planner" => Ok(Self::Planner),
            "finder" => Ok(Self::Finder),
            "oracle" => Ok(Self::Oracle),
            "librarian" => Ok(Self::Librarian),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown subagent type '{}'", other)),
        }
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> next` is an allowed transition
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Cancelled)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Cancelled)
        )
    }
}

/// A unit of delegated work and its outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique, immutable
    pub id: String,
    pub subagent_type: SubagentType,
    pub prompt: String,
    /// Short label used for reporting
    pub description: String,
    pub status: TaskStatus,
    /// Present only when succeeded
    pub result: Option<String>,
    /// Present only when failed or cancelled
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        subagent_type: SubagentType,
        prompt: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("task-{}", Uuid::new_v4().simple()),
            subagent_type,
            prompt: prompt.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Moves to `status` if the transition is allowed. Returns false otherwise.
    fn transition(&mut self, status: TaskStatus) -> bool {
        if !self.status.can_transition_to(status) {
            return false;
        }
        self.status = status;
        match status {
            TaskStatus::Running => self.started_at = Some(Utc::now()),
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled => {
                self.finished_at = Some(Utc::now());
            }
            TaskStatus::Pending => {}
        }
        true
    }

    pub fn start(&mut self) -> bool {
        self.transition(TaskStatus::Running)
    }

    pub fn succeed(&mut self, result: impl Into<String>) -> bool {
        let ok = self.transition(TaskStatus::Succeeded);
        if ok {
            self.result = Some(result.into());
        }
        ok
    }

    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        let ok = self.transition(TaskStatus::Failed);
        if ok {
            self.error = Some(error.into());
        }
        ok
    }

    pub fn cancel(&mut self, reason: impl Into<String>) -> bool {
        let ok = self.transition(TaskStatus::Cancelled);
        if ok {
            self.error = Some(reason.into());
        }
        ok
    }

    /// Wall time between start and finish, zero if never started
    pub fn duration_ms(&self) -> u64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as u64,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation() {
        let task = Task::new(SubagentType::Coder, "Fix the bug", "Fix bug");
        assert!(task.id.starts_with("task-"));
        assert_eq!(task.description, "Fix bug");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.result.is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Task::new(SubagentType::Coder, "a", "a");
        let b = Task::new(SubagentType::Coder, "a", "a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_status_transition() {
        let mut task = Task::new(SubagentType::Researcher, "p", "d");
        assert!(task.started_at.is_none());

        assert!(task.start());
        assert!(task.started_at.is_some());
        assert!(task.finished_at.is_none());

        assert!(task.succeed("done"));
        assert!(task.finished_at.is_some());
        assert_eq!(task.result.as_deref(), Some("done"));
        assert!(task.error.is_none());
    }

    #[test]
    fn test_transitions_are_monotonic() {
        let mut task = Task::new(SubagentType::Coder, "p", "d");
        // cannot finish before running
        assert!(!task.succeed("x"));
        assert!(!task.fail("x"));
        assert_eq!(task.status, TaskStatus::Pending);

        task.start();
        task.fail("boom");
        assert!(!task.start());
        assert!(!task.succeed("late"));
        assert!(!task.cancel("late"));
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("boom"));
        assert!(task.result.is_none());
    }

    #[test]
    fn test_cancel_before_start() {
        let mut task = Task::new(SubagentType::Coder, "p", "d");
        assert!(task.cancel("fail_fast"));
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.started_at.is_none());
        assert_eq!(task.duration_ms(), 0);
    }

    #[test]
    fn test_subagent_type_parsing() {
        assert_eq!("coder".parse::<SubagentType>().unwrap(), SubagentType::Coder);
        assert_eq!(" AUTO ".parse::<SubagentType>().unwrap(), SubagentType::Auto);
        assert!("wizard".parse::<SubagentType>().is_err());
    }

    #[test]
    fn test_subagent_type_serialization() {
        let json = serde_json::to_string(&SubagentType::Librarian).unwrap();
        assert_eq!(json, "\"librarian\"");
        let parsed: SubagentType = serde_json::from_str("\"oracle\"").unwrap();
        assert_eq!(parsed, SubagentType::Oracle);
    }

    #[test]
    fn test_names_cover_every_variant() {
        let names = SubagentType::names();
        assert_eq!(names.len(), 8);
        assert!(names.contains(&"auto"));
        assert!(SubagentType::CONCRETE.iter().all(|t| !t.is_auto()));
    }
}
