use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::domain::AgentStatus;

const DEFAULT_RUNNING_PATTERN: &str = "(?i)running|in progress|building|installing|processing|thinking|working|generating|executing|planning|▶";

// Codex draws › or ❯, Claude draws >
const DEFAULT_PROMPT_PATTERN: &str = r"(?m)^\s*(?:›|❯|>)\s*.*$";

/// Non-empty lines inspected for a visible prompt.
const PROMPT_LINES_TO_CHECK: usize = 4;

/// Non-empty lines inspected for running keywords. Older output is ignored.
const RUNNING_LINES_TO_CHECK: usize = 8;

static RE_DEFAULT_RUNNING: Lazy<Regex> = Lazy::new(|| Regex::new(DEFAULT_RUNNING_PATTERN).unwrap());

static RE_DEFAULT_PROMPT: Lazy<Regex> = Lazy::new(|| Regex::new(DEFAULT_PROMPT_PATTERN).unwrap());

/// Compiled patterns for reading agent state out of terminal text.
#[derive(Debug, Clone)]
pub struct OutputMatcher {
    running: Regex,
    prompt: Regex,
}

impl OutputMatcher {
    /// Compile the given overrides. A pattern that fails to compile is
    /// replaced by the built-in one.
    pub fn new(running: Option<&str>, prompt: Option<&str>) -> Self {
        Self {
            running: compile_or(running, &RE_DEFAULT_RUNNING),
            prompt: compile_or(prompt, &RE_DEFAULT_PROMPT),
        }
    }

    /// Look for an idle prompt, then for running keywords.
    ///
    /// A visible prompt wins even when a progress word appears above it.
    pub fn analyze(&self, content: &str) -> Option<AgentStatus> {
        self.match_prompt(content)
            .or_else(|| self.match_running(content))
    }

    pub fn match_prompt(&self, content: &str) -> Option<AgentStatus> {
        recent_lines(content)
            .take(PROMPT_LINES_TO_CHECK)
            .any(|line| is_context_line(line) || is_send_hint(line) || self.prompt.is_match(line))
            .then_some(AgentStatus::Idle)
    }

    pub fn match_running(&self, content: &str) -> Option<AgentStatus> {
        recent_lines(content)
            .take(RUNNING_LINES_TO_CHECK)
            .any(|line| self.is_running_line(line))
            .then_some(AgentStatus::Running)
    }

    pub fn is_running_line(&self, line: &str) -> bool {
        self.running.is_match(line)
    }
}

impl Default for OutputMatcher {
    fn default() -> Self {
        Self::new(None, None)
    }
}

fn compile_or(pattern: Option<&str>, fallback: &Regex) -> Regex {
    match pattern.map(Regex::new) {
        Some(Ok(re)) => re,
        Some(Err(e)) => {
            debug!("Ignoring invalid status pattern: {}", e);
            fallback.clone()
        }
        None => fallback.clone(),
    }
}

/// Trimmed, non-empty lines from the bottom up. Handles `\r\n` endings.
fn recent_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .split('\n')
        .rev()
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

/// Codex status bar, e.g. "Context left: 40%".
fn is_context_line(line: &str) -> bool {
    line.to_lowercase().contains("context left")
}

/// Claude input hint, e.g. "↵ send".
fn is_send_hint(line: &str) -> bool {
    if line.contains("↵ send") || line.contains("⏎ send") {
        return true;
    }
    line.ends_with("send") && (line.contains('↵') || line.contains('⏎'))
}
