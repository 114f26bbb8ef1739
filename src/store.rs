use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::orchestrator::Report;

/// Persists finished run reports, one JSON file per run
pub struct RunStore {
    runs_dir: PathBuf,
}

impl RunStore {
    /// Opens the store under `state_dir`, creating `runs/` and `logs/`.
    pub fn new(state_dir: impl AsRef<Path>) -> Result<Self> {
        let state_dir = state_dir.as_ref();
        let runs_dir = state_dir.join("runs");

        if !runs_dir.exists() {
            fs::create_dir_all(&runs_dir).context("Failed to create runs directory")?;
        }
        let logs_dir = state_dir.join("logs");
        if !logs_dir.exists() {
            fs::create_dir_all(&logs_dir).context("Failed to create logs directory")?;
        }

        Ok(Self { runs_dir })
    }

    fn run_file(&self, run_id: &str) -> PathBuf {
        self.runs_dir.join(format!("{run_id}.json"))
    }

    pub fn save(&self, report: &Report) -> Result<PathBuf> {
        let path = self.run_file(&report.run_id);
        let content = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn load(&self, run_id: &str) -> Result<Option<Report>> {
        let path = self.run_file(run_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let report = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(report))
    }

    /// All stored reports, newest first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<Report>> {
        let mut reports = Vec::new();
        for entry in fs::read_dir(&self.runs_dir).context("Failed to read runs directory")? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|content| Ok(serde_json::from_str::<Report>(&content)?));
            match parsed {
                Ok(report) => reports.push(report),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable run"),
            }
        }
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    /// Returns false when no such run exists.
    pub fn delete(&self, run_id: &str) -> Result<bool> {
        let path = self.run_file(run_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
        Ok(true)
    }
}
