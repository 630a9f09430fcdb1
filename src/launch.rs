use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::domain::PaneType;

/// What a new pane will actually run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub pane_type: PaneType,
    /// Typed into the pane after it opens. `None` leaves the shell prompt.
    pub command: Option<&'static str>,
    /// The requested agent was not installed
    pub fell_back_to_shell: bool,
}

/// Pick the launch for `requested`, falling back to a plain shell when the
/// agent's executable is not on `search_path`.
pub fn plan_launch(requested: PaneType, search_path: Option<&OsStr>) -> LaunchPlan {
    let Some(executable) = requested.executable() else {
        return LaunchPlan {
            pane_type: PaneType::Shell,
            command: None,
            fell_back_to_shell: requested != PaneType::Shell,
        };
    };

    if find_executable(executable, search_path).is_some() {
        LaunchPlan {
            pane_type: requested,
            command: Some(executable),
            fell_back_to_shell: false,
        }
    } else {
        LaunchPlan {
            pane_type: PaneType::Shell,
            command: None,
            fell_back_to_shell: true,
        }
    }
}

/// Look `name` up in a `PATH`-style list of directories.
pub fn find_executable(name: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    std::env::split_paths(search_path?)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
