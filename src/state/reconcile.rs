use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

use super::{PaneState, SessionState, Store};
use crate::domain::PaneType;
use crate::tmux::Session;

/// How much later a live session may report its creation time before we
/// decide it was torn down and recreated under the same name.
pub const CREATED_AT_SLACK_SECS: i64 = 2;

/// A pane whose live title drifted from the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleFix {
    pub pane_id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPane {
    pub session: String,
    pub pane_id: String,
    pub inferred_type: PaneType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutput {
    pub store: Store,
    pub title_fixes: Vec<TitleFix>,
    pub orphaned_panes: Vec<String>,
    pub new_panes: Vec<NewPane>,
}

/// Merge the stored record with what tmux reports right now.
///
/// Stored titles and types win over live ones. `now` stamps panes seen for
/// the first time. No I/O happens here; the caller persists the store and
/// applies the title fixes.
pub fn reconcile(current: &Store, live: &[Session], now: DateTime<Utc>) -> ReconcileOutput {
    let mut output = ReconcileOutput {
        store: Store {
            version: current.version,
            server_id: current.server_id.clone(),
            sessions: Default::default(),
        },
        title_fixes: Vec::new(),
        orphaned_panes: Vec::new(),
        new_panes: Vec::new(),
    };

    let live_by_name: HashMap<&str, &Session> =
        live.iter().map(|s| (s.name.as_str(), s)).collect();

    // Stored sessions that vanished from tmux are dropped silently
    for (name, stored) in &current.sessions {
        let Some(live_session) = live_by_name.get(name.as_str()) else {
            continue;
        };
        let reconciled = reconcile_session(stored, live_session, now, &mut output);
        output.store.sessions.insert(name.clone(), reconciled);
    }

    for session in live {
        if current.sessions.contains_key(&session.name)
            || output.store.sessions.contains_key(&session.name)
        {
            continue;
        }
        let fresh = fresh_session(session, now, &mut output);
        output.store.sessions.insert(session.name.clone(), fresh);
    }

    output
}

fn was_recreated(stored: &SessionState, live: &Session) -> bool {
    match (stored.created_at, live.created_at) {
        (Some(stored_at), Some(live_at)) => {
            live_at > stored_at + Duration::seconds(CREATED_AT_SLACK_SECS)
        }
        _ => false,
    }
}

fn reconcile_session(
    stored: &SessionState,
    live: &Session,
    now: DateTime<Utc>,
    output: &mut ReconcileOutput,
) -> SessionState {
    if was_recreated(stored, live) {
        return fresh_session(live, now, output);
    }

    let live_panes: HashMap<&str, &crate::tmux::Pane> =
        live.panes.iter().map(|p| (p.id.as_str(), p)).collect();
    let stored_ids: HashSet<&str> = stored.panes.iter().map(|p| p.pane_id.as_str()).collect();

    let mut panes = Vec::with_capacity(live.panes.len());

    for stored_pane in &stored.panes {
        let Some(live_pane) = live_panes.get(stored_pane.pane_id.as_str()) else {
            output.orphaned_panes.push(stored_pane.pane_id.clone());
            continue;
        };

        if live_pane.title != stored_pane.title {
            output.title_fixes.push(TitleFix {
                pane_id: stored_pane.pane_id.clone(),
                title: stored_pane.title.clone(),
            });
        }
        panes.push(stored_pane.clone());
    }

    for live_pane in &live.panes {
        if stored_ids.contains(live_pane.id.as_str()) {
            continue;
        }
        let pane = PaneState::from_live(live_pane, now);
        output.new_panes.push(NewPane {
            session: live.name.clone(),
            pane_id: pane.pane_id.clone(),
            inferred_type: pane.pane_type,
        });
        panes.push(pane);
    }

    SessionState {
        path: stored.path.clone(),
        created_at: stored.created_at,
        panes,
    }
}

fn fresh_session(live: &Session, now: DateTime<Utc>, output: &mut ReconcileOutput) -> SessionState {
    let panes: Vec<PaneState> = live
        .panes
        .iter()
        .map(|p| PaneState::from_live(p, now))
        .collect();

    output.new_panes.extend(panes.iter().map(|p| NewPane {
        session: live.name.clone(),
        pane_id: p.pane_id.clone(),
        inferred_type: p.pane_type,
    }));

    SessionState {
        path: live.path.clone(),
        created_at: live.created_at,
        panes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmux::Pane;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn live_pane(id: &str, title: &str, command: &str) -> Pane {
        Pane {
            current_command: command.to_string(),
            ..Pane::new(id, title)
        }
    }

    fn live_session(name: &str, created: i64, panes: Vec<Pane>) -> Session {
        Session {
            path: format!("/tmp/{}", name),
            created_at: Some(at(created)),
            panes,
            ..Session::new(name)
        }
    }

    fn stored_pane(id: &str, pane_type: PaneType, title: &str) -> PaneState {
        PaneState {
            pane_id: id.to_string(),
            pane_type,
            title: title.to_string(),
            created_at: at(50),
            renamed_at: None,
        }
    }

    fn stored_store(created: i64, panes: Vec<PaneState>) -> Store {
        let mut store = Store::new();
        store.server_id = Some("srv".to_string());
        store.sessions.insert(
            "repo".to_string(),
            SessionState {
                path: "/tmp/repo".to_string(),
                created_at: Some(at(created)),
                panes,
            },
        );
        store
    }

    #[test]
    fn test_updates_titles_orphans_and_new_panes() {
        let store = stored_store(
            1000,
            vec![
                stored_pane("%0", PaneType::Codex, "old"),
                stored_pane("%9", PaneType::Shell, "orphan"),
            ],
        );
        let live = vec![live_session(
            "repo",
            1000,
            vec![live_pane("%0", "new", "zsh"), live_pane("%1", "shell-1", "zsh")],
        )];

        let out = reconcile(&store, &live, at(2000));

        assert_eq!(
            out.title_fixes,
            vec![TitleFix {
                pane_id: "%0".to_string(),
                title: "old".to_string()
            }]
        );
        assert_eq!(out.orphaned_panes, vec!["%9".to_string()]);
        assert_eq!(
            out.new_panes,
            vec![NewPane {
                session: "repo".to_string(),
                pane_id: "%1".to_string(),
                inferred_type: PaneType::Shell,
            }]
        );

        let session = &out.store.sessions["repo"];
        assert_eq!(session.panes.len(), 2);
        assert_eq!(session.panes[0].title, "old");
        assert_eq!(session.panes[0].pane_type, PaneType::Codex);
        assert_eq!(session.panes[1].created_at, at(2000));
        assert!(out.store.pane("repo", "%9").is_none());
        assert_eq!(out.store.server_id.as_deref(), Some("srv"));
    }

    #[test]
    fn test_recreated_session_is_rebuilt() {
        let store = stored_store(
            1000,
            vec![
                stored_pane("%0", PaneType::Codex, "codex-1"),
                stored_pane("%1", PaneType::Claude, "claude-1"),
            ],
        );
        let live = vec![live_session(
            "repo",
            1003,
            vec![live_pane("%0", "zsh", "zsh"), live_pane("%2", "codex-2", "codex")],
        )];

        let out = reconcile(&store, &live, at(2000));
        let session = &out.store.sessions["repo"];

        assert!(out.title_fixes.is_empty());
        assert!(out.orphaned_panes.is_empty());
        assert_eq!(session.created_at, Some(at(1003)));
        assert_eq!(session.panes.len(), 2);
        // %0 was reused by the new session and must not keep the old record
        assert_eq!(session.panes[0].title, "zsh");
        assert_eq!(session.panes[0].pane_type, PaneType::Unknown);
        assert_eq!(session.panes[0].created_at, at(2000));
        assert!(out.store.pane("repo", "%1").is_none());

        let new_ids: Vec<&str> = out.new_panes.iter().map(|p| p.pane_id.as_str()).collect();
        assert_eq!(new_ids, vec!["%0", "%2"]);
        assert_eq!(out.new_panes[1].inferred_type, PaneType::Codex);
    }

    #[test]
    fn test_created_at_within_slack_is_patched() {
        let store = stored_store(1000, vec![stored_pane("%0", PaneType::Codex, "codex-1")]);
        let live = vec![live_session("repo", 1002, vec![live_pane("%0", "codex-1", "node")])];

        let out = reconcile(&store, &live, at(2000));
        assert!(out.new_panes.is_empty());
        assert_eq!(out.store.sessions["repo"].created_at, Some(at(1000)));
        assert_eq!(out.store.sessions["repo"].panes[0].created_at, at(50));
    }

    #[test]
    fn test_vanished_session_dropped_silently() {
        let store = stored_store(1000, vec![stored_pane("%0", PaneType::Codex, "codex-1")]);
        let out = reconcile(&store, &[], at(2000));
        assert!(out.store.sessions.is_empty());
        assert!(out.orphaned_panes.is_empty());
        assert!(out.title_fixes.is_empty());
        assert!(out.new_panes.is_empty());
    }

    #[test]
    fn test_new_session_from_live() {
        let live = vec![live_session(
            "api",
            500,
            vec![
                live_pane("%4", "anything", "claude"),
                live_pane("%5", "codex-main", "zsh"),
                live_pane("%6", "notes", "vim"),
            ],
        )];
        let out = reconcile(&Store::new(), &live, at(600));

        let session = &out.store.sessions["api"];
        assert_eq!(session.path, "/tmp/api");
        assert_eq!(session.created_at, Some(at(500)));
        let types: Vec<PaneType> = out.new_panes.iter().map(|p| p.inferred_type).collect();
        assert_eq!(types, vec![PaneType::Claude, PaneType::Codex, PaneType::Unknown]);
    }

    #[test]
    fn test_idempotent() {
        let store = stored_store(
            1000,
            vec![
                stored_pane("%0", PaneType::Codex, "old"),
                stored_pane("%9", PaneType::Shell, "orphan"),
            ],
        );
        let live = vec![
            live_session(
                "repo",
                1000,
                vec![live_pane("%0", "old", "zsh"), live_pane("%1", "x", "zsh")],
            ),
            live_session("web", 1500, vec![live_pane("%2", "claude-1", "zsh")]),
        ];

        let first = reconcile(&store, &live, at(2000));
        let second = reconcile(&first.store, &live, at(3000));

        assert_eq!(second.store, first.store);
        assert!(second.title_fixes.is_empty());
        assert!(second.orphaned_panes.is_empty());
        assert!(second.new_panes.is_empty());
    }
}
