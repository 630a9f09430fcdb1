//! Durable pane bookkeeping that survives tmux's memoryless view.

mod reconcile;
mod store;

pub use reconcile::reconcile;
pub use store::StoreFile;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::PaneType;
use crate::tmux::Pane;

pub const STORE_VERSION: u32 = 1;

fn default_version() -> u32 {
    STORE_VERSION
}

/// Root of the persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    #[serde(default = "default_version")]
    pub version: u32,
    /// tmux server instance this record belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default)]
    pub sessions: BTreeMap<String, SessionState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub panes: Vec<PaneState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaneState {
    pub pane_id: String,
    #[serde(rename = "type", default)]
    pub pane_type: PaneType,
    #[serde(default)]
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_at: Option<DateTime<Utc>>,
}

impl PaneState {
    /// Record for a pane seen live for the first time.
    pub fn from_live(pane: &Pane, now: DateTime<Utc>) -> Self {
        Self {
            pane_id: pane.id.clone(),
            pane_type: PaneType::infer(&pane.current_command, &pane.title),
            title: pane.title.clone(),
            created_at: now,
            renamed_at: None,
        }
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            version: STORE_VERSION,
            server_id: None,
            sessions: BTreeMap::new(),
        }
    }

    /// Bind the store to a tmux server. Records from a different server are
    /// discarded wholesale since their pane ids are no longer comparable.
    pub fn bind_server(self, server_id: &str) -> Self {
        let mut store = match self.server_id.as_deref() {
            Some(existing) if !existing.is_empty() && existing != server_id => {
                tracing::info!(
                    "tmux server changed ({} -> {}), dropping stored panes",
                    existing,
                    server_id
                );
                Store::new()
            }
            _ => self,
        };
        store.server_id = Some(server_id.to_string());
        store
    }

    pub fn pane(&self, session: &str, pane_id: &str) -> Option<&PaneState> {
        self.sessions
            .get(session)?
            .panes
            .iter()
            .find(|p| p.pane_id == pane_id)
    }

    fn session_entry(
        &mut self,
        session: &str,
        session_path: &str,
        now: DateTime<Utc>,
    ) -> &mut SessionState {
        self.sessions
            .entry(session.to_string())
            .or_insert_with(|| SessionState {
                path: session_path.to_string(),
                created_at: Some(now),
                panes: Vec::new(),
            })
    }

    /// Record a user rename, creating the session or pane entry if needed.
    pub fn rename_pane(
        &mut self,
        session: &str,
        session_path: &str,
        pane_id: &str,
        title: &str,
        now: DateTime<Utc>,
    ) {
        let entry = self.session_entry(session, session_path, now);

        if let Some(pane) = entry.panes.iter_mut().find(|p| p.pane_id == pane_id) {
            pane.title = title.to_string();
            pane.renamed_at = Some(now);
            return;
        }

        entry.panes.push(PaneState {
            pane_id: pane_id.to_string(),
            pane_type: PaneType::Unknown,
            title: title.to_string(),
            created_at: now,
            renamed_at: Some(now),
        });
    }

    /// Record a pane we just opened, replacing any stale entry with its id.
    pub fn add_pane(
        &mut self,
        session: &str,
        session_path: &str,
        pane_id: &str,
        pane_type: PaneType,
        title: &str,
        now: DateTime<Utc>,
    ) {
        let entry = self.session_entry(session, session_path, now);
        entry.panes.retain(|p| p.pane_id != pane_id);
        entry.panes.push(PaneState {
            pane_id: pane_id.to_string(),
            pane_type,
            title: title.to_string(),
            created_at: now,
            renamed_at: None,
        });
    }

    /// First `<type>-N` title not already used in the session. Numbering
    /// starts after the panes of that type already on record.
    pub fn next_auto_title(
        &self,
        session: &str,
        pane_type: PaneType,
        live_titles: &[&str],
    ) -> String {
        let stored = self.sessions.get(session);
        let same_type = stored
            .map(|s| s.panes.iter().filter(|p| p.pane_type == pane_type).count())
            .unwrap_or(0);
        let taken = |title: &str| {
            live_titles.iter().any(|t| t.eq_ignore_ascii_case(title))
                || stored.is_some_and(|s| {
                    s.panes
                        .iter()
                        .any(|p| p.title.eq_ignore_ascii_case(title))
                })
        };

        let mut n = same_type + 1;
        loop {
            let title = format!("{}-{}", pane_type, n);
            if !taken(&title) {
                return title;
            }
            n += 1;
        }
    }

    /// Change a tracked pane's assigned type. Returns false if the pane is unknown.
    pub fn set_pane_type(&mut self, session: &str, pane_id: &str, pane_type: PaneType) -> bool {
        let Some(pane) = self
            .sessions
            .get_mut(session)
            .and_then(|s| s.panes.iter_mut().find(|p| p.pane_id == pane_id))
        else {
            return false;
        };
        pane.pane_type = pane_type;
        true
    }

    /// Drop a pane from every session. Returns whether anything was removed.
    pub fn remove_pane(&mut self, pane_id: &str) -> bool {
        let mut removed = false;
        for session in self.sessions.values_mut() {
            let before = session.panes.len();
            session.panes.retain(|p| p.pane_id != pane_id);
            removed |= session.panes.len() != before;
        }
        removed
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
