use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::ffi::OsString;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::StatusConfig;
use crate::domain::{AgentStatus, Liveness, PaneType};
use crate::launch::plan_launch;
use crate::state::{reconcile, Store, StoreFile};
use crate::status::{
    classify, detect_liveness, read_state_file, PaneObservation, ProcessSnapshot,
};
use crate::tmux::{Multiplexer, Session};

/// tmux global environment key holding the server instance id
pub const SERVER_ID_ENV: &str = "AGENT_DECK_SERVER_ID";

/// A pane as the dashboard shows it
#[derive(Debug, Clone, PartialEq)]
pub struct PaneView {
    pub id: String,
    pub index: u32,
    pub title: String,
    pub pane_type: PaneType,
    pub current_command: String,
    pub liveness: Liveness,
    pub agent_status: AgentStatus,
    pub last_active: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub name: String,
    pub path: String,
    pub attached: bool,
    pub panes: Vec<PaneView>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSnapshot {
    pub sessions: Vec<SessionView>,
}

/// A pane opened from the dashboard
#[derive(Debug, Clone, PartialEq)]
pub struct AddedPane {
    pub pane_id: String,
    pub title: String,
    pub pane_type: PaneType,
    pub fell_back_to_shell: bool,
}

/// Remembers when each pane's output last changed.
#[derive(Debug, Default)]
pub struct ActivityTracker {
    seen: HashMap<String, (u64, Option<DateTime<Utc>>)>,
}

impl ActivityTracker {
    /// Record the latest capture. Returns when the output last changed, or
    /// `None` while it is unchanged since the pane was first seen.
    pub fn observe(
        &mut self,
        pane_id: &str,
        output: &str,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let mut hasher = DefaultHasher::new();
        output.hash(&mut hasher);
        let fingerprint = hasher.finish();

        match self.seen.get_mut(pane_id) {
            Some((last, changed_at)) => {
                if *last != fingerprint {
                    *last = fingerprint;
                    *changed_at = Some(now);
                }
                *changed_at
            }
            None => {
                self.seen.insert(pane_id.to_string(), (fingerprint, None));
                None
            }
        }
    }

    pub fn last_active(&self, pane_id: &str) -> Option<DateTime<Utc>> {
        self.seen.get(pane_id).and_then(|(_, at)| *at)
    }

    /// Forget panes that no longer exist.
    pub fn retain_live(&mut self, live: &HashSet<&str>) {
        self.seen.retain(|id, _| live.contains(id.as_str()));
    }
}

/// Runs one refresh cycle: list, reconcile, persist, classify.
pub struct Assembler<M: Multiplexer> {
    mux: M,
    store: StoreFile,
    /// Held from load to save by every store update
    store_lock: tokio::sync::Mutex<()>,
    config: StatusConfig,
    activity: Mutex<ActivityTracker>,
    /// Where agent executables are looked up before launching one
    search_path: Option<OsString>,
}

impl<M: Multiplexer> Assembler<M> {
    pub fn new(mux: M, store: StoreFile, config: StatusConfig) -> Self {
        Self {
            mux,
            store,
            store_lock: tokio::sync::Mutex::new(()),
            config,
            activity: Mutex::new(ActivityTracker::default()),
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Read the server id from tmux, minting one on first use.
    pub async fn ensure_server_id(&self) -> Result<String> {
        if let Some(id) = self.mux.get_global_env(SERVER_ID_ENV).await? {
            return Ok(id);
        }
        let id = ulid::Ulid::new().to_string();
        self.mux
            .set_global_env(SERVER_ID_ENV, &id)
            .await
            .context("Failed to record server id")?;
        info!("Tagged tmux server with id {}", id);
        Ok(id)
    }

    /// Load the store bound to the live server, or an empty one.
    async fn load_bound_store(&self) -> Result<Store> {
        let server_id = self.ensure_server_id().await?;
        Ok(self.store.load_or_default().bind_server(&server_id))
    }

    /// Bring the store in line with `live`, push title fixes to tmux and
    /// save. A failed title fix is logged and skipped.
    pub async fn reconcile(&self, live: &[Session]) -> Result<Store> {
        let _guard = self.store_lock.lock().await;
        let current = self.load_bound_store().await?;
        let output = reconcile(&current, live, Utc::now());

        for orphan in &output.orphaned_panes {
            debug!("Dropping vanished pane {}", orphan);
        }
        for new_pane in &output.new_panes {
            debug!(
                "Tracking new pane {} in {} as {}",
                new_pane.pane_id, new_pane.session, new_pane.inferred_type
            );
        }
        for fix in &output.title_fixes {
            if let Err(e) = self.mux.set_pane_title(&fix.pane_id, &fix.title).await {
                warn!("Failed to restore title of pane {}: {}", fix.pane_id, e);
            }
        }

        if let Err(e) = self.store.save(&output.store) {
            warn!("Failed to save state: {}", e);
        }
        Ok(output.store)
    }

    /// Full refresh with a fresh process table.
    pub async fn refresh(&self) -> Result<DashboardSnapshot> {
        let processes = tokio::task::spawn_blocking(ProcessSnapshot::capture)
            .await
            .context("Process scan task failed")?;
        self.refresh_with(processes.as_ref()).await
    }

    pub async fn refresh_with(
        &self,
        processes: Option<&ProcessSnapshot>,
    ) -> Result<DashboardSnapshot> {
        let live = self
            .mux
            .list_sessions()
            .await
            .context("Failed to list tmux sessions")?;
        let store = self.reconcile(&live).await?;

        let mut captures: HashMap<String, String> = HashMap::new();
        for pane in live.iter().flat_map(|s| &s.panes) {
            match self
                .mux
                .capture_pane_tail(&pane.id, self.config.output_lines)
                .await
            {
                Ok(text) => {
                    captures.insert(pane.id.clone(), text);
                }
                Err(e) => debug!("Capture of {} failed: {}", pane.id, e),
            }
        }

        let now = Utc::now();
        let mut activity = self
            .activity
            .lock()
            .map_err(|_| anyhow::anyhow!("activity tracker poisoned"))?;

        let live_ids: HashSet<&str> = live
            .iter()
            .flat_map(|s| s.panes.iter().map(|p| p.id.as_str()))
            .collect();
        activity.retain_live(&live_ids);

        let mut sessions = Vec::with_capacity(live.len());
        for session in &live {
            let mut panes = Vec::with_capacity(session.panes.len());
            for pane in &session.panes {
                let (title, pane_type) = match store.pane(&session.name, &pane.id) {
                    Some(stored) => (stored.title.clone(), stored.pane_type),
                    None => (
                        pane.title.clone(),
                        PaneType::infer(&pane.current_command, &pane.title),
                    ),
                };

                let output = captures.get(&pane.id).map(String::as_str);
                let last_active = match output {
                    Some(text) => activity.observe(&pane.id, text, now),
                    None => activity.last_active(&pane.id),
                };
                let state_file = read_state_file(&self.config.agent_state_dir, &pane.id);

                let observation = PaneObservation {
                    pane_id: &pane.id,
                    pane_type,
                    state_file: state_file.as_ref(),
                    output,
                    last_active,
                };

                panes.push(PaneView {
                    id: pane.id.clone(),
                    index: pane.index,
                    title,
                    pane_type,
                    current_command: pane.current_command.clone(),
                    liveness: detect_liveness(processes, pane.pid, pane_type),
                    agent_status: classify(&observation, now, &self.config),
                    last_active,
                });
            }

            sessions.push(SessionView {
                name: session.name.clone(),
                path: session.path.clone(),
                attached: session.attached,
                panes,
            });
        }

        Ok(DashboardSnapshot { sessions })
    }

    /// Set a pane's title in tmux and remember it as the intended one.
    pub async fn rename_pane(
        &self,
        session: &str,
        session_path: &str,
        pane_id: &str,
        title: &str,
    ) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            bail!("title cannot be empty");
        }
        let _guard = self.store_lock.lock().await;
        self.mux
            .set_pane_title(pane_id, title)
            .await
            .with_context(|| format!("Failed to rename pane {}", pane_id))?;

        let mut store = self.load_bound_store().await?;
        store.rename_pane(session, session_path, pane_id, title, Utc::now());
        self.store.save(&store)?;
        Ok(())
    }

    /// Reassign what a pane is expected to run.
    pub async fn retype_pane(
        &self,
        session: &str,
        pane_id: &str,
        pane_type: PaneType,
    ) -> Result<()> {
        let _guard = self.store_lock.lock().await;
        let mut store = self.load_bound_store().await?;
        if !store.set_pane_type(session, pane_id, pane_type) {
            bail!("pane {} is not tracked yet", pane_id);
        }
        self.store.save(&store)?;
        Ok(())
    }

    /// Kill a pane and forget it.
    pub async fn close_pane(&self, pane_id: &str) -> Result<()> {
        let _guard = self.store_lock.lock().await;
        self.mux
            .kill_pane(pane_id)
            .await
            .with_context(|| format!("Failed to close pane {}", pane_id))?;

        let mut store = self.load_bound_store().await?;
        store.remove_pane(pane_id);
        self.store.save(&store)?;
        Ok(())
    }

    /// Open a new pane in `session`, title it `<type>-N`, start the agent
    /// and record it. Falls back to a plain shell if the agent is missing.
    pub async fn add_pane(&self, session: &str, requested: PaneType) -> Result<AddedPane> {
        let _guard = self.store_lock.lock().await;

        let live = self
            .mux
            .list_sessions()
            .await
            .context("Failed to list tmux sessions")?;
        let Some(live_session) = live.iter().find(|s| s.name == session) else {
            bail!("session {} not found", session);
        };

        let plan = plan_launch(requested, self.search_path.as_deref());
        if plan.fell_back_to_shell {
            info!("{} is not installed, opening a shell instead", requested);
        }

        let mut store = self.load_bound_store().await?;
        let live_titles: Vec<&str> = live_session.panes.iter().map(|p| p.title.as_str()).collect();
        let title = store.next_auto_title(session, plan.pane_type, &live_titles);

        let pane_id = self
            .mux
            .split_window(session, &live_session.path)
            .await
            .with_context(|| format!("Failed to split a pane in {}", session))?;
        self.mux
            .set_pane_title(&pane_id, &title)
            .await
            .with_context(|| format!("Failed to title pane {}", pane_id))?;
        if let Some(command) = plan.command {
            self.mux
                .send_command(&pane_id, command)
                .await
                .with_context(|| format!("Failed to start {} in {}", command, pane_id))?;
        }

        store.add_pane(
            session,
            &live_session.path,
            &pane_id,
            plan.pane_type,
            &title,
            Utc::now(),
        );
        self.store.save(&store)?;
        debug!("Opened {} as {} in {}", pane_id, title, session);

        Ok(AddedPane {
            pane_id,
            title,
            pane_type: plan.pane_type,
            fell_back_to_shell: plan.fell_back_to_shell,
        })
    }
}
