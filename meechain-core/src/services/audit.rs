//! services/audit.rs
//! Append-only action logbook.
//!
//! - Writes one JSON object per line to `actions.jsonl` under the logbook dir.
//! - Write failures are swallowed: auditing never breaks an action.

use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::LogbookConfig;

pub struct Logbook {
    actions: Option<PathBuf>,
    // one writer at a time within this process
    write_lock: Mutex<()>,
}

impl Logbook {
    pub fn from_config(cfg: &LogbookConfig) -> Self {
        if cfg.enabled {
            Self::at(cfg.actions.clone())
        } else {
            Self::disabled()
        }
    }

    pub fn at(actions: impl Into<PathBuf>) -> Self {
        Self {
            actions: Some(actions.into()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            actions: None,
            write_lock: Mutex::new(()),
        }
    }

    pub fn actions_path(&self) -> Option<&Path> {
        self.actions.as_deref()
    }

    /// Record one action.
    ///
    /// # Arguments
    /// * `agent`: component that acted (e.g. `"orchestrator"`).
    /// * `action`: short verb label (e.g. `"mint_random"`).
    /// * `details`: free-form JSON payload.
    /// * `severity`: `"low" | "medium" | "high"`.
    pub fn record_action(&self, agent: &str, action: &str, details: &Value, severity: &str) {
        let Some(path) = &self.actions else {
            return;
        };
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": "action",
            "agent": agent,
            "action": action,
            "severity": severity,
            "details": details
        });
        let _guard = self.write_lock.lock();
        append_jsonl(path, &entry);
    }
}

impl Default for Logbook {
    fn default() -> Self {
        Self::disabled()
    }
}

fn append_jsonl<S: Serialize>(path: &Path, val: &S) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let Ok(line) = serde_json::to_string(val) else {
        return;
    };
    if let Ok(mut f) = fs::OpenOptions::new().create(true).append(true).open(path) {
        if let Err(e) = writeln!(f, "{line}") {
            tracing::debug!(path = %path.display(), error = %e, "logbook append failed");
        }
    }
}

/// Short, single-line preview of user text for log payloads.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let mut cut: String = flat.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}
