use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of program a pane was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaneType {
    Codex,
    Claude,
    Shell,
    #[default]
    #[serde(other)]
    Unknown,
}

impl PaneType {
    /// Next concrete type, for cycling through assignments.
    pub fn next(self) -> Self {
        match self {
            PaneType::Codex => PaneType::Claude,
            PaneType::Claude => PaneType::Shell,
            PaneType::Shell | PaneType::Unknown => PaneType::Codex,
        }
    }

    /// Guess the pane type from the foreground command, falling back to the
    /// title prefix.
    pub fn infer(command: &str, title: &str) -> Self {
        let cmd = command.to_lowercase();
        if cmd.contains("codex") {
            return PaneType::Codex;
        }
        if cmd.contains("claude") {
            return PaneType::Claude;
        }

        let title = title.trim().to_lowercase();
        if title.starts_with("codex") {
            PaneType::Codex
        } else if title.starts_with("claude") {
            PaneType::Claude
        } else if title.starts_with("shell") {
            PaneType::Shell
        } else {
            PaneType::Unknown
        }
    }

    /// Executable name expected somewhere below the pane's shell.
    pub fn executable(self) -> Option<&'static str> {
        match self {
            PaneType::Codex => Some("codex"),
            PaneType::Claude => Some("claude"),
            PaneType::Shell | PaneType::Unknown => None,
        }
    }

    pub fn is_agent(self) -> bool {
        self.executable().is_some()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaneType::Codex => "codex",
            PaneType::Claude => "claude",
            PaneType::Shell => "shell",
            PaneType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PaneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the expected agent process is still alive inside a pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Liveness {
    Active,
    Exited,
    #[default]
    Unknown,
}

/// Whether the agent in a pane is currently doing work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AgentStatus {
    Running,
    #[default]
    Idle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_cycles_concrete_types() {
        assert_eq!(PaneType::Unknown.next(), PaneType::Codex);
        assert_eq!(PaneType::Codex.next(), PaneType::Claude);
        assert_eq!(PaneType::Claude.next(), PaneType::Shell);
        assert_eq!(PaneType::Shell.next(), PaneType::Codex);
    }

    #[test]
    fn test_infer_pane_type() {
        assert_eq!(PaneType::infer("codex", ""), PaneType::Codex);
        assert_eq!(PaneType::infer("node-claude", "shell-1"), PaneType::Claude);
        assert_eq!(PaneType::infer("zsh", "claude-1"), PaneType::Claude);
        assert_eq!(PaneType::infer("zsh", "  Shell-2"), PaneType::Shell);
        assert_eq!(PaneType::infer("zsh", "random"), PaneType::Unknown);
    }

    #[test]
    fn test_unknown_type_string_deserializes() {
        let t: PaneType = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(t, PaneType::Unknown);
        assert_eq!(serde_json::to_string(&PaneType::Codex).unwrap(), "\"codex\"");
    }
}
