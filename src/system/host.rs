use sysinfo::System;
use tracing::warn;

/// Machine-wide figures the rate calculation normalizes against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HostInfo {
    pub total_memory_bytes: u64,
    pub logical_cpus: usize,
}

impl HostInfo {
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();

        let total_memory_bytes = sys.total_memory();
        if total_memory_bytes == 0 {
            warn!("total system memory is unknown, memory usage will read as 0");
        }

        let logical_cpus = match sys.cpus().len() {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        };

        HostInfo {
            total_memory_bytes,
            logical_cpus,
        }
    }
}
