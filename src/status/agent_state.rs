use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::domain::{AgentStatus, PaneType};

/// State an agent-side hook writes about itself, one file per pane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStateFile {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub updated_at_unix_ms: i64,
    #[serde(default)]
    pub pane_id: String,
}

impl AgentStateFile {
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        if self.updated_at_unix_ms <= 0 {
            return None;
        }
        DateTime::from_timestamp_millis(self.updated_at_unix_ms)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let Some(updated) = self.updated_at() else {
            return false;
        };
        match (now - updated).to_std() {
            Ok(age) => age <= ttl,
            // Written "in the future" by a skewed clock
            Err(_) => true,
        }
    }

    /// The file's own pane id, if it has one, must name this pane.
    pub fn matches_pane(&self, pane_id: &str) -> bool {
        let own = self.pane_id.trim();
        own.is_empty() || own == pane_id
    }

    /// A file written by one agent must not describe a pane assigned to another.
    pub fn matches_tool(&self, pane_type: PaneType) -> bool {
        match self.tool.trim().to_lowercase().as_str() {
            "codex" => matches!(pane_type, PaneType::Codex | PaneType::Unknown),
            "claude" => matches!(pane_type, PaneType::Claude | PaneType::Unknown),
            _ => true,
        }
    }

    /// Running or idle, `None` for values we do not recognise.
    pub fn status(&self) -> Option<AgentStatus> {
        match self.state.trim().to_lowercase().as_str() {
            "running" | "in_progress" | "in-progress" => Some(AgentStatus::Running),
            "idle" | "waiting" | "paused" | "done" | "completed" | "success" | "error"
            | "failed" | "failure" => Some(AgentStatus::Idle),
            _ => None,
        }
    }
}

pub fn state_file_path(dir: &Path, pane_id: &str) -> Option<PathBuf> {
    let pane_id = pane_id.trim();
    if pane_id.is_empty() {
        return None;
    }
    Some(dir.join(format!("{}.json", pane_id)))
}

/// Load a pane's state file. Missing, unreadable and malformed files all
/// yield `None`.
pub fn read_state_file(dir: &Path, pane_id: &str) -> Option<AgentStateFile> {
    let path = state_file_path(dir, pane_id)?;
    let data = match std::fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            debug!("Cannot read {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_slice(&data) {
        Ok(state) => Some(state),
        Err(e) => {
            debug!("Ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file(state: &str, tool: &str, updated_ms: i64) -> AgentStateFile {
        AgentStateFile {
            state: state.to_string(),
            tool: tool.to_string(),
            updated_at_unix_ms: updated_ms,
            pane_id: String::new(),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(file("running", "", 0).status(), Some(AgentStatus::Running));
        assert_eq!(file(" In_Progress ", "", 0).status(), Some(AgentStatus::Running));
        assert_eq!(file("failed", "", 0).status(), Some(AgentStatus::Idle));
        assert_eq!(file("done", "", 0).status(), Some(AgentStatus::Idle));
        assert_eq!(file("compacting", "", 0).status(), None);
    }

    #[test]
    fn test_freshness() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        let ttl = Duration::from_secs(30);
        assert!(file("running", "", 970_000).is_fresh(now, ttl));
        assert!(!file("running", "", 969_999).is_fresh(now, ttl));
        assert!(file("running", "", 1_005_000).is_fresh(now, ttl));
        assert!(!file("running", "", 0).is_fresh(now, ttl));
    }

    #[test]
    fn test_tool_and_pane_matching() {
        assert!(file("", "", 0).matches_tool(PaneType::Claude));
        assert!(file("", "Codex", 0).matches_tool(PaneType::Codex));
        assert!(file("", "codex", 0).matches_tool(PaneType::Unknown));
        assert!(!file("", "codex", 0).matches_tool(PaneType::Claude));

        let mut f = file("", "", 0);
        assert!(f.matches_pane("%3"));
        f.pane_id = "%3".to_string();
        assert!(f.matches_pane("%3"));
        assert!(!f.matches_pane("%4"));
    }

    #[test]
    fn test_read_state_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_state_file(dir.path(), "%1").is_none());
        assert!(read_state_file(dir.path(), "  ").is_none());

        std::fs::write(
            dir.path().join("%1.json"),
            r#"{"state":"running","tool":"claude","updated_at_unix_ms":1700000000000,"pane_id":"%1"}"#,
        )
        .unwrap();
        let state = read_state_file(dir.path(), "%1").unwrap();
        assert_eq!(state.tool, "claude");
        assert_eq!(state.updated_at().map(|t| t.timestamp()), Some(1_700_000_000));

        std::fs::write(dir.path().join("%2.json"), "garbage").unwrap();
        assert!(read_state_file(dir.path(), "%2").is_none());
    }
}
