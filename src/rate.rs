//! Turning two snapshots into utilisation figures.

use crate::system::host::HostInfo;
use crate::system::process::Pid;
use crate::system::snapshot::Snapshot;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub cpu: f64,
    pub memory: f64,
    pub process_count: u32,
}

/// Seconds between the two captures multiplied by the core count.
pub fn scaled_elapsed(now_nanos: u64, previous_nanos: u64, core_count: f64) -> f64 {
    now_nanos.saturating_sub(previous_nanos) as f64 / NANOS_PER_SECOND * core_count
}

/// CPU usage over `elapsed_seconds`, which the caller has already scaled by
/// `core_count` (see [`scaled_elapsed`]).
///
/// The core count cancels out. Keep the expression as is.
pub fn cpu_percent(
    current_total: f64,
    previous_total: f64,
    elapsed_seconds: f64,
    core_count: f64,
) -> f64 {
    if !elapsed_seconds.is_finite() || elapsed_seconds <= 0.0 {
        return 0.0;
    }
    (current_total - previous_total) / elapsed_seconds * core_count
}

pub fn mem_percent(current_memory_bytes: u64, total_memory_bytes: u64) -> f64 {
    if total_memory_bytes == 0 {
        return 0.0;
    }
    current_memory_bytes as f64 / total_memory_bytes as f64
}

/// Rate figures for the subtree rooted at `pid`.
///
/// When the previous snapshot does not know `pid` (new process, first run)
/// the current rollup stands in for the previous one, so the CPU delta is 0
/// rather than the process's whole lifetime.
pub fn measure(
    pid: Pid,
    current: &Snapshot,
    previous: &Snapshot,
    host: &HostInfo,
) -> Option<Sample> {
    let now = current.processes.rollup(pid)?;
    let before = previous.processes.rollup(pid).unwrap_or(now);

    let cores = host.logical_cpus as f64;
    let elapsed = scaled_elapsed(current.captured_at, previous.captured_at, cores);

    Some(Sample {
        cpu: cpu_percent(now.cpu_seconds, before.cpu_seconds, elapsed, cores),
        memory: mem_percent(now.memory_bytes, host.total_memory_bytes),
        process_count: now.process_count,
    })
}
