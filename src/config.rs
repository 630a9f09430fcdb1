use std::path::PathBuf;
use std::time::Duration;

use crate::tmux::heuristics::OutputMatcher;

const DEFAULT_TTL_SECONDS: u64 = 30;
const DEFAULT_IDLE_SECONDS: u64 = 20;
const DEFAULT_OUTPUT_LINES: usize = 40;
const DEFAULT_REFRESH_MS: u64 = 1000;

pub const ENV_PREFIX: &str = "AGENT_DECK_";

/// Everything the status pipeline reads from the environment.
///
/// Built once at startup and handed down by reference.
#[derive(Debug, Clone)]
pub struct StatusConfig {
    /// How long a self-reported state file stays trustworthy.
    pub state_ttl: Duration,
    /// Quiet time after which a pane counts as idle.
    pub idle_threshold: Duration,
    /// Lines of pane output captured for heuristics.
    pub output_lines: usize,
    /// Directory holding `<pane-id>.json` state files.
    pub agent_state_dir: PathBuf,
    pub matcher: OutputMatcher,
}

impl StatusConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Keys are unprefixed (`IDLE_SECONDS`).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(&format!("{ENV_PREFIX}{key}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let secs = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(default))
        };

        let output_lines = get("STATUS_LINES")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_OUTPUT_LINES);

        let agent_state_dir = get("AGENT_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let runtime = lookup("XDG_RUNTIME_DIR")
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(runtime).join("agent-deck").join("agent-state")
            });

        let matcher = OutputMatcher::new(
            get("STATUS_REGEX_RUNNING").as_deref(),
            get("STATUS_REGEX_PROMPT").as_deref(),
        );

        Self {
            state_ttl: secs("AGENT_STATE_TTL_SECONDS", DEFAULT_TTL_SECONDS),
            idle_threshold: secs("IDLE_SECONDS", DEFAULT_IDLE_SECONDS),
            output_lines,
            agent_state_dir,
            matcher,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Settings for the outer application shell.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_path: PathBuf,
    pub log_path: PathBuf,
    pub tmux_socket: Option<String>,
    pub refresh_interval: Duration,
    pub status: StatusConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let get = |key: &str| {
            std::env::var(format!("{ENV_PREFIX}{key}"))
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir = dirs::data_local_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .unwrap_or_default()
            .join("agent-deck");

        let refresh_ms = get("REFRESH_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_REFRESH_MS);

        Self {
            store_path: get("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("state.json")),
            log_path: data_dir.join("agent-deck.log"),
            tmux_socket: get("TMUX_SOCKET"),
            refresh_interval: Duration::from_millis(refresh_ms),
            status: StatusConfig::from_env(),
        }
    }
}
