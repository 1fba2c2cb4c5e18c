#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const PAGE_SIZE: u64 = 4096;

/// A throwaway procfs-shaped directory under the system temp dir.
pub struct FakeProc {
    root: PathBuf,
}

impl FakeProc {
    pub fn new(label: &str) -> Self {
        let root = std::env::temp_dir().join(format!("psstat-{}-{label}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        FakeProc { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Add a process with CPU time in ticks and memory in pages.
    pub fn add(&self, pid: u32, name: &str, ppid: u32, utime: u64, stime: u64, rss_pages: u64) {
        self.add_raw(
            pid,
            &format!(
                "{pid} ({name}) S {ppid} {pid} {pid} 0 -1 4194304 100 0 0 0 {utime} {stime} 0 0 20 0 1 0 100 1000000 {rss_pages} 18446744073709551615"
            ),
            Some(&format!("2000 {rss_pages} 300 10 0 200 0\n")),
        );
    }

    pub fn add_raw(&self, pid: u32, stat: &str, statm: Option<&str>) {
        self.add_bytes(pid, stat.as_bytes(), statm);
    }

    /// Like `add_raw`, for a `stat` that is not valid UTF-8.
    pub fn add_bytes(&self, pid: u32, stat: &[u8], statm: Option<&str>) {
        let dir = self.root.join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stat"), stat).unwrap();
        if let Some(statm) = statm {
            fs::write(dir.join("statm"), statm).unwrap();
        }
    }

    pub fn add_file(&self, name: &str, contents: &str) {
        fs::write(self.root.join(name), contents).unwrap();
    }

    pub fn add_dir(&self, name: &str) {
        fs::create_dir_all(self.root.join(name)).unwrap();
    }
}

impl Drop for FakeProc {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

pub fn temp_path(label: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("psstat-{}-{label}", std::process::id()));
    let _ = fs::remove_file(&path);
    path
}
