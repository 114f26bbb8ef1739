//! Merges terminal tasks into a single report with a bounded digest.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{SubagentType, Task, TaskStatus, Topology};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Every task succeeded
    Complete,
    /// At least one task failed or was cancelled
    Partial,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
        }
    }
}

/// Truncation applied while building a report
#[derive(Debug, Clone, Copy)]
pub struct ReportLimits {
    /// Max characters of each result quoted in the digest
    pub digest_result_limit: usize,
    /// Max characters of the per-task `result` field, `None` keeps it whole
    pub task_result_limit: Option<usize>,
}

impl Default for ReportLimits {
    fn default() -> Self {
        Self {
            digest_result_limit: 3000,
            task_result_limit: None,
        }
    }
}

/// Keeps the first `limit` characters and marks the cut.
/// Counts characters, so a multi-byte code point is never split.
pub fn truncate_text(text: &str, limit: usize) -> Cow<'_, str> {
    let cut = match text.char_indices().nth(limit) {
        Some((byte_index, _)) => byte_index,
        None => return Cow::Borrowed(text),
    };
    let omitted = text[cut..].chars().count();
    Cow::Owned(format!(
        "{}\n... (truncated, {} chars omitted)",
        &text[..cut],
        omitted
    ))
}

/// One line of the detailed listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub id: String,
    pub description: String,
    pub subagent_type: SubagentType,
    pub status: TaskStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub run_id: String,
    pub topology: Topology,
    pub outcome: Outcome,
    pub created_at: DateTime<Utc>,
    pub total_duration_ms: u64,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// In submission order
    pub tasks: Vec<TaskReport>,
    pub digest: String,
}

fn status_mark(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Succeeded => "✓",
        TaskStatus::Failed => "✗",
        TaskStatus::Cancelled => "⊘",
        TaskStatus::Pending | TaskStatus::Running => "…",
    }
}

impl Report {
    /// Build a report from terminal tasks, given in submission order.
    pub fn build(
        run_id: impl Into<String>,
        topology: Topology,
        tasks: &[Task],
        total_duration_ms: u64,
        limits: ReportLimits,
    ) -> Self {
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
        let succeeded = count(TaskStatus::Succeeded);
        let failed = count(TaskStatus::Failed);
        let cancelled = count(TaskStatus::Cancelled);
        let outcome = if succeeded == tasks.len() {
            Outcome::Complete
        } else {
            Outcome::Partial
        };

        let listing = tasks
            .iter()
            .map(|task| TaskReport {
                id: task.id.clone(),
                description: task.description.clone(),
                subagent_type: task.subagent_type,
                status: task.status,
                duration_ms: task.duration_ms(),
                result: task.result.as_deref().map(|r| match limits.task_result_limit {
                    Some(limit) => truncate_text(r, limit).into_owned(),
                    None => r.to_string(),
                }),
                error: task.error.clone(),
            })
            .collect::<Vec<_>>();

        let mut report = Self {
            run_id: run_id.into(),
            topology,
            outcome,
            created_at: Utc::now(),
            total_duration_ms,
            succeeded,
            failed,
            cancelled,
            tasks: listing,
            digest: String::new(),
        };
        report.digest = report.render_digest(tasks, limits.digest_result_limit);
        report
    }

    /// Digest quotes the stored task results and errors, not the listing, so
    /// it is unaffected by `task_result_limit`. Both are cut at `limit`.
    fn render_digest(&self, tasks: &[Task], limit: usize) -> String {
        let mut parts = vec![format!(
            "{} {}: {}/{} succeeded in {}ms",
            self.topology.display_name(),
            self.outcome.as_str(),
            self.succeeded,
            self.tasks.len(),
            self.total_duration_ms
        )];
        if self.failed > 0 || self.cancelled > 0 {
            parts.push(format!(
                "{} failed, {} cancelled",
                self.failed, self.cancelled
            ));
        }

        for (index, task) in tasks.iter().enumerate() {
            parts.push(format!(
                "---\n### {}. {} {} @{} ({}ms)",
                index + 1,
                status_mark(task.status),
                task.description,
                task.subagent_type,
                task.duration_ms()
            ));
            match task.status {
                TaskStatus::Succeeded => {
                    let body = task.result.as_deref().unwrap_or_default();
                    parts.push(truncate_text(body, limit).into_owned());
                }
                TaskStatus::Cancelled => parts.push(format!(
                    "**Cancelled:** {}",
                    truncate_text(task.error.as_deref().unwrap_or("cancelled"), limit)
                )),
                _ => parts.push(format!(
                    "**Error:** {}",
                    truncate_text(task.error.as_deref().unwrap_or("unknown error"), limit)
                )),
            }
        }
        parts.join("\n")
    }

    pub fn is_complete(&self) -> bool {
        self.outcome == Outcome::Complete
    }
}
