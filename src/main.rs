use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use std::fs::OpenOptions;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{error, info};

mod actions;
mod app;
mod config;
mod domain;
mod launch;
mod snapshot;
mod state;
mod status;
mod tmux;

use actions::Action;
use app::App;
use config::AppConfig;
use snapshot::{Assembler, DashboardSnapshot};
use state::StoreFile;
use tmux::TmuxClient;

/// Log to a file so output does not tear the TUI.
fn init_logging(config: &AppConfig) {
    let writer: Box<dyn io::Write + Send> = match config
        .log_path
        .parent()
        .map(std::fs::create_dir_all)
        .transpose()
        .and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.log_path)
        }) {
        Ok(file) => Box::new(file),
        Err(_) => Box::new(io::sink()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(Mutex::new(writer))
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env();
    init_logging(&config);

    // Create event channel
    let (tx, mut rx) = mpsc::unbounded_channel::<Action>();

    // Initialize terminal
    let mut terminal = ratatui::init();

    // Spawn input handler
    let input_tx = tx.clone();
    tokio::spawn(async move {
        loop {
            if event::poll(Duration::from_millis(100)).unwrap_or(false) {
                if let Ok(Event::Key(key)) = event::read() {
                    if key.kind == KeyEventKind::Press {
                        let _ = input_tx.send(Action::KeyPress(key));
                    }
                }
            }
        }
    });

    let store_file = StoreFile::new(config.store_path.clone());
    info!(
        "Starting with state file {} and refresh every {:?}",
        store_file.path().display(),
        config.refresh_interval
    );
    let assembler = Arc::new(Assembler::new(
        TmuxClient::with_socket(config.tmux_socket.clone()),
        store_file,
        config.status.clone(),
    ));
    let refresh_now = Arc::new(Notify::new());

    // Spawn refresh poller
    let poll_tx = tx.clone();
    let poll_assembler = Arc::clone(&assembler);
    let poll_wake = Arc::clone(&refresh_now);
    let poll_client = TmuxClient::with_socket(config.tmux_socket.clone());
    let refresh_interval = config.refresh_interval;
    tokio::spawn(async move {
        loop {
            if !poll_client.is_server_running().await {
                let _ = poll_tx.send(Action::SnapshotUpdated(DashboardSnapshot::default()));
            } else {
                match poll_assembler.refresh().await {
                    Ok(snapshot) => {
                        let _ = poll_tx.send(Action::SnapshotUpdated(snapshot));
                    }
                    Err(e) => {
                        error!("Refresh failed: {:#}", e);
                        let _ = poll_tx.send(Action::Error(format!("Refresh error: {}", e)));
                    }
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(refresh_interval) => {}
                _ = poll_wake.notified() => {}
            }
        }
    });

    // Shared tmux client for session-level actions
    let tmux_client = TmuxClient::with_socket(config.tmux_socket.clone());

    // Create app state
    let mut app = App::new();

    // Main event loop
    let result = loop {
        // Render
        terminal.draw(|f| app.render(f))?;

        // Process any pending actions from the app
        for pending_action in app.take_pending_actions() {
            let outcome = match pending_action {
                Action::AttachSession(ref session) => {
                    // Suspend TUI and attach to session
                    ratatui::restore();

                    let cmd = tmux_client.attach_command(session);
                    let status = std::process::Command::new(&cmd[0])
                        .args(&cmd[1..])
                        .stdin(Stdio::inherit())
                        .stdout(Stdio::inherit())
                        .stderr(Stdio::inherit())
                        .status();

                    // Resume TUI
                    terminal = ratatui::init();

                    status
                        .map(|_| None)
                        .map_err(|e| anyhow::anyhow!("Failed to attach: {}", e))
                }
                Action::KillSession(ref session) => tmux_client
                    .kill_session(session)
                    .await
                    .map(|_| Some(format!("Session '{}' killed", session)))
                    .map_err(|e| anyhow::anyhow!("Failed to kill session: {}", e)),
                Action::RenamePane {
                    ref session,
                    ref session_path,
                    ref pane_id,
                    ref title,
                } => assembler
                    .rename_pane(session, session_path, pane_id, title)
                    .await
                    .map(|_| Some(format!("Pane renamed to '{}'", title)))
                    .map_err(|e| anyhow::anyhow!("Failed to rename: {:#}", e)),
                Action::RetypePane {
                    ref session,
                    ref pane_id,
                    pane_type,
                } => assembler
                    .retype_pane(session, pane_id, pane_type)
                    .await
                    .map(|_| Some(format!("Pane marked as {}", pane_type)))
                    .map_err(|e| anyhow::anyhow!("Failed to retype: {:#}", e)),
                Action::ClosePane(ref pane_id) => assembler
                    .close_pane(pane_id)
                    .await
                    .map(|_| Some("Pane closed".to_string()))
                    .map_err(|e| anyhow::anyhow!("Failed to close pane: {:#}", e)),
                Action::AddPane {
                    ref session,
                    pane_type,
                } => assembler
                    .add_pane(session, pane_type)
                    .await
                    .map(|added| {
                        info!("Added {} pane {} to {}", added.pane_type, added.pane_id, session);
                        Some(if added.fell_back_to_shell {
                            format!("{} not installed, opened {}", pane_type, added.title)
                        } else {
                            format!("Opened {}", added.title)
                        })
                    })
                    .map_err(|e| anyhow::anyhow!("Failed to add pane: {:#}", e)),
                Action::Refresh => Ok(None),
                _ => continue,
            };

            match outcome {
                Ok(msg) => {
                    if msg.is_some() {
                        app.message = msg;
                    }
                }
                Err(e) => {
                    error!("{:#}", e);
                    app.message = Some(e.to_string());
                }
            }
            refresh_now.notify_one();
        }

        // Handle events from channel
        tokio::select! {
            Some(action) = rx.recv() => {
                match app.handle_action(action) {
                    Ok(should_quit) => {
                        if should_quit {
                            break Ok(());
                        }
                    }
                    Err(e) => {
                        break Err(e);
                    }
                }
            }
        }
    };

    // Restore terminal
    ratatui::restore();
    info!("Exiting");
    result
}
