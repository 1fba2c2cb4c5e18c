use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::process::{Pid, Process, ProcessTable};
use super::snapshot::Snapshot;

const FIELDS_PER_ROW: usize = 5;

#[derive(Debug, Error)]
#[error("cannot write snapshot cache {path}: {source}")]
pub struct StoreWriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Keeps the previous run's snapshot in a plain text file.
///
/// The first line holds the capture time, every following line one process
/// as `pid,parent,user_time,system_time,memory_bytes`.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored snapshot, keeping only processes in `known_pids`.
    ///
    /// A missing or unreadable file is the normal first-run state and gives
    /// an empty snapshot.
    pub fn load(&self, known_pids: &HashSet<Pid>) -> Snapshot {
        match fs::read_to_string(&self.path) {
            Ok(contents) => parse(&contents, known_pids),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no previous snapshot");
                Snapshot::default()
            }
        }
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StoreWriteError> {
        let wrap = |source| StoreWriteError {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(wrap)?;
        }
        fs::write(&self.path, render(snapshot)).map_err(wrap)
    }
}

pub fn render(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", snapshot.captured_at);
    for p in snapshot.processes.sorted() {
        let _ = writeln!(
            out,
            "{},{},{:.6},{:.6},{}",
            p.pid, p.parent, p.user_time, p.system_time, p.memory_bytes
        );
    }
    out
}

pub fn parse(contents: &str, known_pids: &HashSet<Pid>) -> Snapshot {
    let mut lines = contents.lines();
    let Some(captured_at) = lines.next().and_then(|l| l.trim().parse::<u64>().ok()) else {
        debug!("snapshot cache header is missing or corrupt");
        return Snapshot::default();
    };

    let mut processes = Vec::new();
    let mut skipped = 0usize;
    for line in lines {
        let parts: Vec<&str> = line.trim_end().split(',').collect();
        if parts.len() != FIELDS_PER_ROW {
            skipped += 1;
            continue;
        }

        let pid: Pid = field(parts[0]);
        if !known_pids.contains(&pid) {
            continue;
        }

        processes.push(Process {
            pid,
            name: String::new(),
            parent: field(parts[1]),
            user_time: field(parts[2]),
            system_time: field(parts[3]),
            memory_bytes: field(parts[4]),
        });
    }

    if skipped > 0 {
        debug!(skipped, "ignored malformed snapshot cache rows");
    }
    Snapshot::new(captured_at, ProcessTable::from_flat(processes))
}

fn field<T: std::str::FromStr + Default>(raw: &str) -> T {
    raw.parse().unwrap_or_default()
}
