use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::platform;
use super::process::{Pid, Process};

/// Scheduler ticks per second (`USER_HZ`).
pub const CLOCK_TICKS: f64 = 100.0;

pub const DEFAULT_PROC_ROOT: &str = "/proc";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cannot read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("stat record has no parenthesized name")]
    MissingName,
    #[error("stat record has no `{field}` field")]
    MissingField { field: &'static str },
    #[error("stat field `{field}` is not a number: {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("stat record of {expected} names pid {found}")]
    PidMismatch { expected: Pid, found: Pid },
}

/// The fields of `/proc/<pid>/stat` this crate uses.
#[derive(Clone, Debug, PartialEq)]
pub struct StatRecord {
    pub pid: Pid,
    pub name: String,
    pub parent: Pid,
    pub user_ticks: u64,
    pub system_ticks: u64,
}

// Offsets of the fields that follow the closing `)` of the name.
const PPID: usize = 1;
const UTIME: usize = 11;
const STIME: usize = 12;

/// Parse a `stat` record.
///
/// The name sits between the first `(` and the last `)`; it may contain
/// spaces and parentheses of its own, so everything after it is indexed
/// relative to the closing `)` rather than by absolute column.
pub fn parse_stat(contents: &str) -> Result<StatRecord, ParseError> {
    let open = contents.find('(').ok_or(ParseError::MissingName)?;
    let close = contents.rfind(')').ok_or(ParseError::MissingName)?;
    if close < open {
        return Err(ParseError::MissingName);
    }

    let pid = required(contents[..open].trim(), "pid")?;
    let name = contents[open + 1..close].to_string();

    let fields: Vec<&str> = contents[close + 1..].split_whitespace().collect();
    let parent = required(fields.get(PPID).copied().unwrap_or_default(), "ppid")?;

    Ok(StatRecord {
        pid,
        name,
        parent,
        user_ticks: lenient(fields.get(UTIME)),
        system_ticks: lenient(fields.get(STIME)),
    })
}

/// Resident page count, the second field of `statm`.
pub fn parse_statm(contents: &str) -> u64 {
    lenient(contents.split_whitespace().nth(1).as_ref())
}

fn required(value: &str, field: &'static str) -> Result<u32, ParseError> {
    if value.is_empty() {
        return Err(ParseError::MissingField { field });
    }
    value.parse().map_err(|_| ParseError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn lenient(value: Option<&&str>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// A procfs-style directory tree.
#[derive(Clone, Debug)]
pub struct ProcFs {
    root: PathBuf,
    page_size: u64,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_page_size(root, platform::page_size())
    }

    pub fn with_page_size(root: impl Into<PathBuf>, page_size: u64) -> Self {
        ProcFs {
            root: root.into(),
            page_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pids of every numeric directory under the root.
    pub fn list_pids(&self) -> io::Result<Vec<Pid>> {
        let mut pids = Vec::new();
        for entry in fs::read_dir(&self.root)?.flatten() {
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<Pid>().ok())
            else {
                continue;
            };
            if pid == 0 {
                continue;
            }
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                pids.push(pid);
            }
        }
        Ok(pids)
    }

    pub fn read_process(&self, pid: Pid) -> Result<Process, ParseError> {
        let stat = parse_stat(&self.read(pid, "stat")?)?;
        if stat.pid != pid {
            return Err(ParseError::PidMismatch {
                expected: pid,
                found: stat.pid,
            });
        }
        let resident_pages = parse_statm(&self.read(pid, "statm")?);

        Ok(Process {
            pid: stat.pid,
            name: stat.name,
            parent: stat.parent,
            user_time: stat.user_ticks as f64 / CLOCK_TICKS,
            system_time: stat.system_ticks as f64 / CLOCK_TICKS,
            memory_bytes: resident_pages.saturating_mul(self.page_size),
        })
    }

    /// Names are raw bytes cut at 15 by the kernel, so invalid UTF-8 is
    /// replaced rather than rejected.
    fn read(&self, pid: Pid, file: &str) -> Result<String, ParseError> {
        let path = self.root.join(pid.to_string()).join(file);
        let bytes = fs::read(&path).map_err(|source| ParseError::Read { path, source })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASH_STAT: &str = "1234 (bash) S 1000 1234 1234 34816 1300 4194304 2245 12007 0 2 \
        150 42 21 9 20 0 1 0 5567 9613312 1339 18446744073709551615 0 0 0 0 0 0 65536 \
        3670020 1266777851 0 0 0 17 3 0 0 0 0 0";

    #[test]
    fn parses_simple_record() {
        let stat = parse_stat(BASH_STAT).unwrap();
        assert_eq!(stat.pid, 1234);
        assert_eq!(stat.name, "bash");
        assert_eq!(stat.parent, 1000);
        assert_eq!(stat.user_ticks, 150);
        assert_eq!(stat.system_ticks, 42);
    }

    #[test]
    fn name_with_spaces_and_parens() {
        let record = "77 (my (odd) name) ) R 5 77 77 0 -1 0 0 0 0 0 300 200 0 0 20 0 1 0 1 0 0";
        let stat = parse_stat(record).unwrap();
        assert_eq!(stat.name, "my (odd) name) ");
        assert_eq!(stat.parent, 5);
        assert_eq!(stat.user_ticks, 300);
        assert_eq!(stat.system_ticks, 200);
    }

    #[test]
    fn empty_name() {
        let stat = parse_stat("3 () S 2 0 0 0 0 0 0 0 0 0 1 1").unwrap();
        assert_eq!(stat.name, "");
        assert_eq!(stat.parent, 2);
    }

    #[test]
    fn malformed_times_default_to_zero() {
        let stat = parse_stat("9 (x) S 1 0 0 0 0 0 0 0 0 0 abc").unwrap();
        assert_eq!(stat.user_ticks, 0);
        assert_eq!(stat.system_ticks, 0);
    }

    #[test]
    fn malformed_parent_is_an_error() {
        let err = parse_stat("9 (x) S zz 0 0 0 0 0 0 0 0 0 1 1").unwrap_err();
        assert!(matches!(err, ParseError::InvalidField { field: "ppid", .. }));
    }

    #[test]
    fn truncated_record_is_an_error() {
        let err = parse_stat("9 (x) S").unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "ppid" }));
    }

    #[test]
    fn missing_name_is_an_error() {
        assert!(matches!(
            parse_stat("9 x S 1").unwrap_err(),
            ParseError::MissingName
        ));
        assert!(matches!(
            parse_stat("9 )x( S 1").unwrap_err(),
            ParseError::MissingName
        ));
    }

    #[test]
    fn malformed_pid_is_an_error() {
        let err = parse_stat("abc (x) S 1 0 0 0 0 0 0 0 0 0 1 1").unwrap_err();
        assert!(matches!(err, ParseError::InvalidField { field: "pid", .. }));
    }

    #[test]
    fn statm_resident_pages() {
        assert_eq!(parse_statm("2347 1339 840 215 0 432 0\n"), 1339);
        assert_eq!(parse_statm("2347"), 0);
        assert_eq!(parse_statm("2347 lots"), 0);
    }

    #[test]
    fn read_current_process() {
        let procfs = ProcFs::default();
        if !procfs.root().exists() {
            return;
        }
        let pid = std::process::id();
        let process = procfs.read_process(pid).unwrap();
        assert_eq!(process.pid, pid);
        assert!(!process.name.is_empty());
        assert!(process.memory_bytes > 0);
    }
}
