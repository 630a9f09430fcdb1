use chrono::{DateTime, TimeZone, Utc};

use super::{Pane, Session};

/// Unit separator. Survives titles and paths that contain spaces or `|`.
pub const DELIM: &str = "\x1f";

/// tmux may print the separator as an octal escape.
const ESCAPED_DELIM: &str = "\\037";

pub const SESSION_FORMAT: &str =
    "#{session_name}\x1f#{session_path}\x1f#{session_created}\x1f#{session_attached}";

pub const PANE_FORMAT: &str = "#{pane_id}\x1f#{pane_index}\x1f#{pane_title}\x1f#{pane_current_command}\x1f#{pane_current_path}\x1f#{pane_pid}";

fn parse_table(output: &str, expected_fields: usize) -> Vec<Vec<&str>> {
    output
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let sep = if line.contains(ESCAPED_DELIM) {
                ESCAPED_DELIM
            } else {
                DELIM
            };
            let parts: Vec<&str> = line.split(sep).collect();
            (parts.len() >= expected_fields).then_some(parts)
        })
        .collect()
}

/// Parse `list-sessions` output. Panes are filled in separately.
pub fn parse_sessions(output: &str) -> Vec<Session> {
    parse_table(output, 4)
        .into_iter()
        .map(|r| Session {
            name: r[0].to_string(),
            path: r[1].to_string(),
            created_at: parse_created_at(r[2]),
            attached: r[3].trim().parse::<u32>().map(|n| n > 0).unwrap_or(false),
            panes: Vec::new(),
        })
        .collect()
}

/// Parse `list-panes` output.
pub fn parse_panes(output: &str) -> Vec<Pane> {
    parse_table(output, 6)
        .into_iter()
        .map(|r| Pane {
            id: r[0].to_string(),
            index: r[1].trim().parse().unwrap_or(0),
            title: r[2].to_string(),
            current_command: r[3].to_string(),
            current_path: r[4].to_string(),
            pid: r[5].trim().parse().unwrap_or(0),
        })
        .collect()
}

fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    let secs = raw.trim().parse::<i64>().ok().filter(|s| *s > 0)?;
    Utc.timestamp_opt(secs, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_panes_escaped_delimiter() {
        let output = "%0\\0370\\037codex-1\\037zsh\\037/Users/test\\037123\n";
        let panes = parse_panes(output);
        assert_eq!(panes.len(), 1);
        assert_eq!(panes[0].id, "%0");
        assert_eq!(panes[0].title, "codex-1");
        assert_eq!(panes[0].pid, 123);
    }

    #[test]
    fn test_parse_sessions_escaped_delimiter() {
        let output = "repo\\037/Users/test\\0371700000000\\0371\n";
        let sessions = parse_sessions(output);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].name, "repo");
        assert_eq!(sessions[0].path, "/Users/test");
        assert_eq!(sessions[0].created_at.map(|t| t.timestamp()), Some(1_700_000_000));
        assert!(sessions[0].attached);
    }

    #[test]
    fn test_parse_raw_delimiter_and_crlf() {
        let output = "%1\x1f2\x1fmy | title\x1fclaude\x1f/tmp\x1f99\r\n\r\n";
        let panes = parse_panes(output);
        assert_eq!(panes.len(), 1);
        assert_eq!(panes[0].index, 2);
        assert_eq!(panes[0].title, "my | title");
        assert_eq!(panes[0].current_path, "/tmp");
    }

    #[test]
    fn test_short_rows_skipped() {
        let output = "repo\x1f/tmp\n";
        assert!(parse_sessions(output).is_empty());
        let sessions = parse_sessions("repo\x1f/tmp\x1fnope\x1f0\n");
        assert_eq!(sessions[0].created_at, None);
        assert!(!sessions[0].attached);
    }
}
