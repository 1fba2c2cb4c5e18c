use std::collections::{HashMap, HashSet, VecDeque};

pub type Pid = u32;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Process {
    pub pid: Pid,
    pub name: String,
    /// 0 (or the process's own pid) when there is no known parent.
    pub parent: Pid,
    /// Seconds spent in user mode since the process started.
    pub user_time: f64,
    /// Seconds spent in kernel mode since the process started.
    pub system_time: f64,
    pub memory_bytes: u64,
}

impl Process {
    pub fn cpu_seconds(&self) -> f64 {
        self.user_time + self.system_time
    }
}

/// Resource usage of a process together with all of its descendants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rollup {
    pub cpu_seconds: f64,
    pub memory_bytes: u64,
    /// Number of processes in the subtree, the root included.
    pub process_count: u32,
}

impl Rollup {
    fn of(process: &Process) -> Self {
        Rollup {
            cpu_seconds: process.cpu_seconds(),
            memory_bytes: process.memory_bytes,
            process_count: 1,
        }
    }

    fn absorb(&mut self, process: &Process) {
        self.cpu_seconds += process.cpu_seconds();
        self.memory_bytes = self.memory_bytes.saturating_add(process.memory_bytes);
        self.process_count += 1;
    }
}

#[derive(Clone, Debug, Default)]
pub struct ProcessTable {
    processes: HashMap<Pid, Process>,
}

impl ProcessTable {
    /// Later entries replace earlier ones with the same pid.
    pub fn from_flat(processes: impl IntoIterator<Item = Process>) -> Self {
        let processes = processes.into_iter().map(|p| (p.pid, p)).collect();
        ProcessTable { processes }
    }

    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.processes.get(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.processes.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    pub fn pids(&self) -> HashSet<Pid> {
        self.processes.keys().copied().collect()
    }

    /// Processes sorted by pid.
    pub fn sorted(&self) -> Vec<&Process> {
        let mut rows: Vec<&Process> = self.processes.values().collect();
        rows.sort_unstable_by_key(|p| p.pid);
        rows
    }

    /// Sum the usage of `root` and every transitive descendant.
    ///
    /// Children are found through their `parent` field, so a parent that has
    /// already exited simply has no subtree here. Every pid is visited at
    /// most once: parent links that form a cycle (possible when pids are
    /// recycled while /proc is being walked) cannot loop, and the root is
    /// never counted as its own descendant.
    pub fn rollup(&self, root: Pid) -> Option<Rollup> {
        let root_process = self.processes.get(&root)?;
        let children = self.children_index();

        let mut total = Rollup::of(root_process);
        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);

        while let Some(pid) = queue.pop_front() {
            let Some(kids) = children.get(&pid) else {
                continue;
            };
            for &child in kids {
                if !visited.insert(child) {
                    continue;
                }
                if let Some(process) = self.processes.get(&child) {
                    total.absorb(process);
                    queue.push_back(child);
                }
            }
        }

        Some(total)
    }

    fn children_index(&self) -> HashMap<Pid, Vec<Pid>> {
        let mut index: HashMap<Pid, Vec<Pid>> = HashMap::new();
        for process in self.processes.values() {
            if process.parent == process.pid {
                continue;
            }
            index.entry(process.parent).or_default().push(process.pid);
        }
        index
    }
}
