use std::collections::{HashMap, HashSet};

use sysinfo::{ProcessRefreshKind, System, UpdateKind};
use tracing::{debug, warn};

use crate::domain::{Liveness, PaneType};

/// One row of the system process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub ppid: u32,
    /// Short command name
    pub name: String,
    /// Full argument string
    pub args: String,
}

/// Point-in-time process table indexed by parent.
///
/// Taken once per refresh and shared read-only by every pane.
#[derive(Debug, Default)]
pub struct ProcessSnapshot {
    records: HashMap<u32, ProcessRecord>,
    children: HashMap<u32, Vec<u32>>,
}

impl ProcessSnapshot {
    pub fn from_records(records: impl IntoIterator<Item = ProcessRecord>) -> Self {
        let mut snapshot = Self::default();
        for record in records {
            snapshot
                .children
                .entry(record.ppid)
                .or_default()
                .push(record.pid);
            snapshot.records.insert(record.pid, record);
        }
        snapshot
    }

    /// Read the OS process table. `None` when nothing could be listed.
    pub fn capture() -> Option<Self> {
        let mut sys = System::new();
        sys.refresh_processes_specifics(ProcessRefreshKind::new().with_cmd(UpdateKind::Always));

        let snapshot = Self::from_records(sys.processes().iter().map(|(pid, process)| {
            ProcessRecord {
                pid: pid.as_u32(),
                ppid: process.parent().map(|p| p.as_u32()).unwrap_or(0),
                name: process.name().to_string(),
                args: process.cmd().join(" "),
            }
        }));

        if snapshot.is_empty() {
            warn!("Process table came back empty");
            return None;
        }
        debug!("Captured {} processes", snapshot.len());
        Some(snapshot)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether any process below `root` (not `root` itself) mentions `needle`
    /// in its name or arguments.
    pub fn has_descendant_matching(&self, root: u32, needle: &str) -> bool {
        let mut stack: Vec<u32> = self.children_of(root).to_vec();
        let mut seen: HashSet<u32> = HashSet::from([root]);

        while let Some(pid) = stack.pop() {
            if !seen.insert(pid) {
                continue;
            }
            let Some(record) = self.records.get(&pid) else {
                continue;
            };
            if record.name.contains(needle) || record.args.contains(needle) {
                return true;
            }
            stack.extend_from_slice(self.children_of(pid));
        }
        false
    }

    fn children_of(&self, pid: u32) -> &[u32] {
        self.children.get(&pid).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Decide whether the pane's agent process is still running.
///
/// Shell panes have nothing to look for and are always `Active`. Panes of
/// unknown type are `Unknown`. The agent runs under the pane's shell, so only
/// descendants are checked.
pub fn detect_liveness(
    snapshot: Option<&ProcessSnapshot>,
    pane_pid: i64,
    pane_type: PaneType,
) -> Liveness {
    let executable = match (pane_type, pane_type.executable()) {
        (_, Some(executable)) => executable,
        (PaneType::Shell, None) => return Liveness::Active,
        (_, None) => return Liveness::Unknown,
    };
    let Ok(pid) = u32::try_from(pane_pid) else {
        return Liveness::Unknown;
    };
    if pid == 0 {
        return Liveness::Unknown;
    }
    let Some(snapshot) = snapshot else {
        return Liveness::Unknown;
    };

    if snapshot.has_descendant_matching(pid, executable) {
        Liveness::Active
    } else {
        Liveness::Exited
    }
}
