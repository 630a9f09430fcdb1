use crossterm::event::KeyEvent;

use crate::domain::PaneType;
use crate::snapshot::DashboardSnapshot;

/// Actions that can be dispatched through the application
#[derive(Debug, Clone)]
pub enum Action {
    /// A key was pressed
    KeyPress(KeyEvent),
    /// A refresh cycle finished
    SnapshotUpdated(DashboardSnapshot),
    /// An error occurred
    Error(String),
    /// Request to quit the application
    Quit,
    /// Run a refresh cycle now
    Refresh,
    /// Attach to a session
    AttachSession(String),
    /// Kill a session
    KillSession(String),
    /// Give a pane a new title
    RenamePane {
        session: String,
        session_path: String,
        pane_id: String,
        title: String,
    },
    /// Change what a pane is expected to run
    RetypePane {
        session: String,
        pane_id: String,
        pane_type: PaneType,
    },
    /// Kill a pane
    ClosePane(String),
    /// Open a new pane in a session
    AddPane {
        session: String,
        pane_type: PaneType,
    },
}
