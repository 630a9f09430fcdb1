use chrono::{DateTime, Utc};

use super::agent_state::AgentStateFile;
use crate::config::StatusConfig;
use crate::domain::{AgentStatus, PaneType};

/// Everything gathered about one pane for a single classification.
#[derive(Debug, Clone, Copy)]
pub struct PaneObservation<'a> {
    pub pane_id: &'a str,
    pub pane_type: PaneType,
    pub state_file: Option<&'a AgentStateFile>,
    /// Tail of the pane's visible output
    pub output: Option<&'a str>,
    /// Last time the pane's output was seen to change
    pub last_active: Option<DateTime<Utc>>,
}

/// Running or idle for one pane. Signals are tried in order and the first
/// one with an opinion wins; with no opinion at all the pane is idle.
pub fn classify(
    obs: &PaneObservation<'_>,
    now: DateTime<Utc>,
    config: &StatusConfig,
) -> AgentStatus {
    from_state_file(obs, now, config)
        .or_else(|| from_output(obs, config))
        .or_else(|| from_activity(obs, now, config))
        .unwrap_or(AgentStatus::Idle)
}

/// Trust a self-reported state if it is about this pane, from the right
/// tool, and recent.
pub fn from_state_file(
    obs: &PaneObservation<'_>,
    now: DateTime<Utc>,
    config: &StatusConfig,
) -> Option<AgentStatus> {
    let file = obs.state_file?;
    if !file.matches_pane(obs.pane_id) || !file.matches_tool(obs.pane_type) {
        return None;
    }
    if !file.is_fresh(now, config.state_ttl) {
        return None;
    }
    file.status()
}

/// Prompt and keyword heuristics over the captured output. Agent panes only.
pub fn from_output(obs: &PaneObservation<'_>, config: &StatusConfig) -> Option<AgentStatus> {
    if !obs.pane_type.is_agent() {
        return None;
    }
    config.matcher.analyze(obs.output?)
}

pub fn from_activity(
    obs: &PaneObservation<'_>,
    now: DateTime<Utc>,
    config: &StatusConfig,
) -> Option<AgentStatus> {
    let last_active = obs.last_active?;
    let quiet = (now - last_active).to_std().unwrap_or_default();
    if quiet >= config.idle_threshold {
        Some(AgentStatus::Idle)
    } else {
        Some(AgentStatus::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn obs<'a>(pane_type: PaneType) -> PaneObservation<'a> {
        PaneObservation {
            pane_id: "%1",
            pane_type,
            state_file: None,
            output: None,
            last_active: None,
        }
    }

    fn state(state: &str, age_secs: i64) -> AgentStateFile {
        AgentStateFile {
            state: state.to_string(),
            tool: "codex".to_string(),
            updated_at_unix_ms: (now() - Duration::seconds(age_secs)).timestamp_millis(),
            pane_id: "%1".to_string(),
        }
    }

    #[test]
    fn test_default_is_idle() {
        let cfg = StatusConfig::default();
        assert_eq!(classify(&obs(PaneType::Codex), now(), &cfg), AgentStatus::Idle);
    }

    #[test]
    fn test_fresh_state_file_wins_over_output() {
        let cfg = StatusConfig::default();
        let file = state("running", 5);
        let o = PaneObservation {
            state_file: Some(&file),
            output: Some("› "),
            ..obs(PaneType::Codex)
        };
        assert_eq!(classify(&o, now(), &cfg), AgentStatus::Running);
    }

    #[test]
    fn test_stale_state_file_falls_through_to_output() {
        let cfg = StatusConfig::default();
        let file = state("running", 31);
        let o = PaneObservation {
            state_file: Some(&file),
            output: Some("all done\n› "),
            ..obs(PaneType::Codex)
        };
        assert_eq!(from_state_file(&o, now(), &cfg), None);
        assert_eq!(classify(&o, now(), &cfg), AgentStatus::Idle);
    }

    #[test]
    fn test_state_file_for_other_pane_or_tool_ignored() {
        let cfg = StatusConfig::default();
        let mut file = state("running", 1);
        file.pane_id = "%7".to_string();
        let o = PaneObservation {
            state_file: Some(&file),
            ..obs(PaneType::Codex)
        };
        assert_eq!(from_state_file(&o, now(), &cfg), None);

        let file = state("running", 1);
        let o = PaneObservation {
            state_file: Some(&file),
            ..obs(PaneType::Claude)
        };
        assert_eq!(from_state_file(&o, now(), &cfg), None);
    }

    #[test]
    fn test_unrecognised_state_falls_through() {
        let cfg = StatusConfig::default();
        let file = state("compacting", 1);
        let o = PaneObservation {
            state_file: Some(&file),
            output: Some("Generating patch"),
            ..obs(PaneType::Codex)
        };
        assert_eq!(classify(&o, now(), &cfg), AgentStatus::Running);
    }

    #[test]
    fn test_failed_state_is_idle() {
        let cfg = StatusConfig::default();
        let file = state("failed", 1);
        let o = PaneObservation {
            state_file: Some(&file),
            output: Some("thinking"),
            ..obs(PaneType::Codex)
        };
        assert_eq!(classify(&o, now(), &cfg), AgentStatus::Idle);
    }

    #[test]
    fn test_prompt_beats_keyword() {
        let cfg = StatusConfig::default();
        let o = PaneObservation {
            output: Some("working on it\nstill thinking...\nContext left: 40%\n"),
            last_active: Some(now()),
            ..obs(PaneType::Codex)
        };
        assert_eq!(classify(&o, now(), &cfg), AgentStatus::Idle);
    }

    #[test]
    fn test_output_ignored_for_shell_panes() {
        let cfg = StatusConfig::default();
        let o = PaneObservation {
            output: Some("cargo build\nBuilding [=====> ]"),
            ..obs(PaneType::Shell)
        };
        assert_eq!(from_output(&o, &cfg), None);
        assert_eq!(classify(&o, now(), &cfg), AgentStatus::Idle);
    }

    #[test]
    fn test_inconclusive_output_uses_activity() {
        let cfg = StatusConfig::default();
        let o = PaneObservation {
            output: Some("wrote 3 files"),
            last_active: Some(now() - Duration::seconds(3)),
            ..obs(PaneType::Claude)
        };
        assert_eq!(classify(&o, now(), &cfg), AgentStatus::Running);
    }

    #[test]
    fn test_idle_threshold_boundary() {
        let cfg = StatusConfig::default();
        let threshold = Duration::from_std(cfg.idle_threshold).unwrap();
        let at = |last: DateTime<Utc>| {
            let o = PaneObservation {
                last_active: Some(last),
                ..obs(PaneType::Unknown)
            };
            classify(&o, now(), &cfg)
        };

        assert_eq!(at(now() - threshold), AgentStatus::Idle);
        assert_eq!(at(now() - threshold - Duration::seconds(1)), AgentStatus::Idle);
        assert_eq!(at(now() - threshold + Duration::seconds(1)), AgentStatus::Running);
        assert_eq!(at(now() + Duration::seconds(5)), AgentStatus::Running);
    }
}
