use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use super::process::{Pid, ProcessTable};

#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    /// Nanoseconds since the Unix epoch; 0 when there is no prior data.
    pub captured_at: u64,
    pub processes: ProcessTable,
}

impl Snapshot {
    pub fn new(captured_at: u64, processes: ProcessTable) -> Self {
        Snapshot {
            captured_at,
            processes,
        }
    }

    pub fn pids(&self) -> HashSet<Pid> {
        self.processes.pids()
    }
}

pub fn now_unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
