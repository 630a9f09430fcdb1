use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use super::format::{parse_panes, parse_sessions, PANE_FORMAT, SESSION_FORMAT};
use super::{Pane, Session};

/// Upper bound on any single tmux invocation
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("tmux not found in PATH")]
    NotFound,

    #[error("tmux {command} timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("tmux {command} failed: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to run tmux: {0}")]
    Io(#[from] std::io::Error),
}

impl TmuxError {
    fn exit_code(&self) -> Option<i32> {
        match self {
            TmuxError::CommandFailed { code, .. } => *code,
            _ => None,
        }
    }
}

/// What the refresh cycle needs from the terminal multiplexer.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// Sessions with their panes filled in.
    async fn list_sessions(&self) -> Result<Vec<Session>, TmuxError>;
    async fn capture_pane_tail(&self, pane_id: &str, lines: usize) -> Result<String, TmuxError>;
    async fn set_pane_title(&self, pane_id: &str, title: &str) -> Result<(), TmuxError>;
    async fn kill_pane(&self, pane_id: &str) -> Result<(), TmuxError>;
    async fn get_global_env(&self, name: &str) -> Result<Option<String>, TmuxError>;
    async fn set_global_env(&self, name: &str, value: &str) -> Result<(), TmuxError>;
    /// Split the session's first window. Returns the new pane's id.
    async fn split_window(&self, session: &str, cwd: &str) -> Result<String, TmuxError>;
    /// Type `command` into a pane and press Enter.
    async fn send_command(&self, pane_id: &str, command: &str) -> Result<(), TmuxError>;
}

/// Client for interacting with tmux via CLI
pub struct TmuxClient {
    /// Path to tmux binary
    tmux_path: String,
    /// Arguments prepended to every call (socket selection)
    base_args: Vec<String>,
}

impl TmuxClient {
    pub fn new() -> Self {
        Self {
            tmux_path: "tmux".to_string(),
            base_args: Vec::new(),
        }
    }

    /// Talk to the server on a named socket (`tmux -L <socket>`)
    pub fn with_socket(socket: Option<String>) -> Self {
        let mut client = Self::new();
        if let Some(socket) = socket {
            client.base_args = vec!["-L".to_string(), socket];
        }
        client
    }

    /// Check if tmux server is running
    pub async fn is_server_running(&self) -> bool {
        Command::new(&self.tmux_path)
            .args(&self.base_args)
            .arg("list-sessions")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        let command = args.first().copied().unwrap_or_default().to_string();
        debug!("tmux {}", args.join(" "));

        let mut cmd = Command::new(&self.tmux_path);
        cmd.args(&self.base_args).args(args).kill_on_drop(true);

        let output = match tokio::time::timeout(COMMAND_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TmuxError::NotFound)
            }
            Ok(Err(e)) => return Err(TmuxError::Io(e)),
            Err(_) => {
                return Err(TmuxError::Timeout {
                    command,
                    secs: COMMAND_TIMEOUT.as_secs(),
                })
            }
        };

        if !output.status.success() {
            return Err(TmuxError::CommandFailed {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// List sessions without their panes
    pub async fn list_session_rows(&self) -> Result<Vec<Session>, TmuxError> {
        match self.run(&["list-sessions", "-F", SESSION_FORMAT]).await {
            Ok(stdout) => Ok(parse_sessions(&stdout)),
            Err(TmuxError::CommandFailed { stderr, .. })
                if stderr.contains("no server running") || stderr.contains("no sessions") =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// List panes of the session's first window
    pub async fn list_panes(&self, session: &str) -> Result<Vec<Pane>, TmuxError> {
        let target = format!("{}:0", session);
        let stdout = self
            .run(&["list-panes", "-t", &target, "-F", PANE_FORMAT])
            .await?;
        Ok(parse_panes(&stdout))
    }

    /// Kill a session
    pub async fn kill_session(&self, name: &str) -> Result<(), TmuxError> {
        self.run(&["kill-session", "-t", name]).await.map(|_| ())
    }

    /// Get the command to attach to a session (for external execution)
    pub fn attach_command(&self, session: &str) -> Vec<String> {
        let mut cmd = vec![self.tmux_path.clone()];
        cmd.extend(self.base_args.iter().cloned());
        cmd.extend([
            "attach-session".to_string(),
            "-t".to_string(),
            session.to_string(),
        ]);
        cmd
    }
}

#[async_trait]
impl Multiplexer for TmuxClient {
    async fn list_sessions(&self) -> Result<Vec<Session>, TmuxError> {
        let mut sessions = self.list_session_rows().await?;
        for session in &mut sessions {
            session.panes = self.list_panes(&session.name).await?;
        }
        Ok(sessions)
    }

    async fn capture_pane_tail(&self, pane_id: &str, lines: usize) -> Result<String, TmuxError> {
        let start = format!("-{}", lines);
        self.run(&["capture-pane", "-p", "-J", "-t", pane_id, "-S", &start])
            .await
    }

    async fn set_pane_title(&self, pane_id: &str, title: &str) -> Result<(), TmuxError> {
        self.run(&["select-pane", "-t", pane_id, "-T", title])
            .await
            .map(|_| ())
    }

    async fn kill_pane(&self, pane_id: &str) -> Result<(), TmuxError> {
        self.run(&["kill-pane", "-t", pane_id]).await.map(|_| ())
    }

    async fn get_global_env(&self, name: &str) -> Result<Option<String>, TmuxError> {
        let stdout = match self.run(&["show-environment", "-g", name]).await {
            Ok(stdout) => stdout,
            // Exit status 1 means the variable is not set
            Err(e) if e.exit_code() == Some(1) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(parse_env_line(&stdout))
    }

    async fn set_global_env(&self, name: &str, value: &str) -> Result<(), TmuxError> {
        self.run(&["set-environment", "-g", name, value])
            .await
            .map(|_| ())
    }

    async fn split_window(&self, session: &str, cwd: &str) -> Result<String, TmuxError> {
        let target = format!("{}:0", session);
        let mut args = vec!["split-window", "-t", target.as_str(), "-P", "-F", "#{pane_id}"];
        if !cwd.is_empty() {
            args.extend(["-c", cwd]);
        }

        let stdout = self.run(&args).await?;
        parse_pane_id(&stdout).ok_or_else(|| TmuxError::CommandFailed {
            command: "split-window".to_string(),
            code: None,
            stderr: format!("unexpected output {:?}", stdout.trim()),
        })
    }

    async fn send_command(&self, pane_id: &str, command: &str) -> Result<(), TmuxError> {
        self.run(&["send-keys", "-t", pane_id, "-l", command]).await?;
        self.run(&["send-keys", "-t", pane_id, "Enter"])
            .await
            .map(|_| ())
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `NAME=value` from `show-environment`. A leading `-` marks a removed
/// variable.
fn parse_env_line(output: &str) -> Option<String> {
    let line = output.trim();
    if line.is_empty() || line.starts_with('-') {
        return None;
    }
    let (_, value) = line.split_once('=')?;
    Some(value.to_string()).filter(|v| !v.is_empty())
}

/// The `%N` id printed by `split-window -P`.
fn parse_pane_id(output: &str) -> Option<String> {
    let id = output.trim();
    (id.starts_with('%') && id.len() > 1).then(|| id.to_string())
}
