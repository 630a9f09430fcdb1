mod client;
pub mod format;
pub mod heuristics;

pub use client::{Multiplexer, TmuxClient, TmuxError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A live tmux session as reported by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session name
    pub name: String,
    /// Session working directory
    pub path: String,
    /// When the server created the session, if it reported a sane value
    pub created_at: Option<DateTime<Utc>>,
    /// Whether any client is attached
    pub attached: bool,
    /// Panes of the first window, in index order
    pub panes: Vec<Pane>,
}

/// A live tmux pane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pane {
    /// Pane ID (e.g., "%3"); only unique for one server lifetime
    pub id: String,
    pub index: u32,
    pub title: String,
    pub current_command: String,
    pub current_path: String,
    /// PID of the pane's shell; 0 when tmux gave nothing usable
    pub pid: i64,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: String::new(),
            created_at: None,
            attached: false,
            panes: Vec::new(),
        }
    }
}

impl Pane {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            index: 0,
            title: title.into(),
            current_command: String::new(),
            current_path: String::new(),
            pid: 0,
        }
    }
}
