use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use thiserror::Error;
use tracing::{debug, warn};

use super::process::{Pid, Process, ProcessTable};
use super::procfs::ProcFs;
use super::snapshot::{Snapshot, now_unix_nanos};

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Error)]
#[error("cannot list process root {path}")]
pub struct EnumerationError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Sequential,
    /// One blocking read task per pid, at most `workers` in flight.
    Concurrent { workers: usize },
}

pub struct Collector {
    procfs: Arc<ProcFs>,
    strategy: Strategy,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new(ProcFs::default(), Strategy::Sequential)
    }
}

impl Collector {
    pub fn new(procfs: ProcFs, strategy: Strategy) -> Self {
        Collector {
            procfs: Arc::new(procfs),
            strategy,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Capture every readable process under the proc root.
    ///
    /// Processes that cannot be read are left out; only a root that cannot
    /// be listed at all is an error.
    pub async fn enumerate(&self) -> Result<Snapshot, EnumerationError> {
        let captured_at = now_unix_nanos();
        let pids = self.procfs.list_pids().map_err(|source| EnumerationError {
            path: self.procfs.root().to_path_buf(),
            source,
        })?;
        let candidates = pids.len();

        let processes = match self.strategy {
            Strategy::Sequential => self.gather_sequential(pids).await,
            Strategy::Concurrent { workers } => self.gather_concurrent(pids, workers).await,
        };

        debug!(
            candidates,
            collected = processes.len(),
            strategy = ?self.strategy,
            "enumerated processes"
        );
        Ok(Snapshot::new(captured_at, processes))
    }

    /// One blocking task reads every pid in order.
    async fn gather_sequential(&self, pids: Vec<Pid>) -> ProcessTable {
        let procfs = Arc::clone(&self.procfs);
        let pass = tokio::task::spawn_blocking(move || {
            let processes = pids
                .into_iter()
                .filter_map(|pid| read_or_skip(&procfs, pid));
            ProcessTable::from_flat(processes)
        });

        match pass.await {
            Ok(processes) => processes,
            Err(e) => {
                warn!(error = %e, "process read task failed");
                ProcessTable::default()
            }
        }
    }

    async fn gather_concurrent(&self, pids: Vec<Pid>, workers: usize) -> ProcessTable {
        let reads = stream::iter(pids).map(|pid| {
            let procfs = Arc::clone(&self.procfs);
            tokio::task::spawn_blocking(move || read_or_skip(&procfs, pid))
        });

        let results: Vec<Option<Process>> = reads
            .buffer_unordered(workers.max(1))
            .map(|joined| match joined {
                Ok(process) => process,
                Err(e) => {
                    warn!(error = %e, "process read task failed");
                    None
                }
            })
            .collect()
            .await;

        ProcessTable::from_flat(results.into_iter().flatten())
    }
}

fn read_or_skip(procfs: &ProcFs, pid: Pid) -> Option<Process> {
    match procfs.read_process(pid) {
        Ok(process) => Some(process),
        Err(e) => {
            debug!(pid, error = %e, "skipping process");
            None
        }
    }
}
