//! Resolving which processes to report on.
//!
//! Every target is written as `[alias:]value`. Without an alias the process
//! name (or the service unit name) is used in the output.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::Command;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::system::process::{Pid, ProcessTable};

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("invalid pid {0:?}")]
    InvalidPid(String),
    #[error("cannot read pid file {path}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid pattern {pattern:?}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("`systemctl {args}` failed: {reason}")]
    ServiceManager { args: String, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    Pid,
    PidFile,
    Pattern,
    Systemd,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetSpec {
    pub kind: TargetKind,
    pub value: String,
    pub alias: Option<String>,
}

impl TargetSpec {
    pub fn parse(kind: TargetKind, raw: &str) -> Self {
        let (alias, value) = match raw.split_once(':') {
            Some((alias, value)) => (Some(alias.to_string()).filter(|a| !a.is_empty()), value),
            None => (None, raw),
        };
        TargetSpec {
            kind,
            value: value.to_string(),
            alias,
        }
    }
}

/// Looks up the main pid of service units.
pub trait ServiceManager {
    /// `(unit id, main pid)` for every service unit matching `pattern`.
    /// Units without a running main process are left out.
    fn main_pids(&self, pattern: &str) -> Result<Vec<(String, Pid)>, SelectError>;
}

pub struct Systemctl;

impl Systemctl {
    fn run(args: &[&str]) -> Result<String, SelectError> {
        let failed = |reason: String| SelectError::ServiceManager {
            args: args.join(" "),
            reason,
        };
        let output = Command::new("systemctl")
            .args(args)
            .output()
            .map_err(|e| failed(e.to_string()))?;
        if !output.status.success() {
            return Err(failed(output.status.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ServiceManager for Systemctl {
    fn main_pids(&self, pattern: &str) -> Result<Vec<(String, Pid)>, SelectError> {
        let units = Self::run(&[
            "list-units",
            pattern,
            "--type=service",
            "--full",
            "--no-legend",
            "--no-pager",
            "--no-ask-password",
        ])?;

        let mut found = Vec::new();
        for unit in units.lines().filter_map(unit_id) {
            let show = match Self::run(&["show", unit, "--property=MainPID"]) {
                Ok(show) => show,
                Err(e) => {
                    warn!(unit, error = %e, "cannot show service unit");
                    continue;
                }
            };
            match main_pid(&show) {
                Ok(Some(pid)) => found.push((unit.to_string(), pid)),
                Ok(None) => debug!(unit, "service unit has no main process"),
                Err(e) => warn!(unit, error = %e, "unexpected MainPID"),
            }
        }
        Ok(found)
    }
}

/// First column of a `systemctl list-units` row; failed units carry a
/// leading status marker.
fn unit_id(line: &str) -> Option<&str> {
    line.trim_start_matches(|c: char| c == '●' || c == '*' || c.is_whitespace())
        .split_whitespace()
        .next()
}

fn main_pid(show: &str) -> Result<Option<Pid>, SelectError> {
    for line in show.lines() {
        let Some(value) = line.strip_prefix("MainPID=") else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() || value == "0" {
            return Ok(None);
        }
        return value
            .parse()
            .map(Some)
            .map_err(|_| SelectError::InvalidPid(value.to_string()));
    }
    Ok(None)
}

fn parse_pid(raw: &str) -> Result<Pid, SelectError> {
    match raw.trim().parse::<Pid>() {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(SelectError::InvalidPid(raw.to_string())),
    }
}

fn read_pid_file(path: &str) -> Result<Pid, SelectError> {
    let contents = fs::read_to_string(path).map_err(|source| SelectError::PidFile {
        path: PathBuf::from(path),
        source,
    })?;
    parse_pid(&contents)
}

/// Resolve `specs` against the current process table.
///
/// A spec that cannot be resolved is logged and skipped. When several specs
/// select the same pid the later one decides the alias.
pub fn resolve_targets(
    specs: &[TargetSpec],
    processes: &ProcessTable,
    services: &dyn ServiceManager,
) -> BTreeMap<Pid, Option<String>> {
    let mut targets = BTreeMap::new();

    for spec in specs {
        match resolve_one(spec, processes, services) {
            Ok(found) => {
                for (pid, alias) in found {
                    targets.insert(pid, alias);
                }
            }
            Err(e) => warn!(spec = %spec.value, error = %e, "skipping target"),
        }
    }

    targets
}

fn resolve_one(
    spec: &TargetSpec,
    processes: &ProcessTable,
    services: &dyn ServiceManager,
) -> Result<Vec<(Pid, Option<String>)>, SelectError> {
    let alias = spec.alias.clone();
    match spec.kind {
        TargetKind::Pid => Ok(vec![(parse_pid(&spec.value)?, alias)]),
        TargetKind::PidFile => Ok(vec![(read_pid_file(&spec.value)?, alias)]),
        TargetKind::Pattern => {
            let re = Regex::new(&spec.value).map_err(|source| SelectError::Pattern {
                pattern: spec.value.clone(),
                source,
            })?;
            Ok(processes
                .iter()
                .filter(|p| re.is_match(&p.name))
                .map(|p| (p.pid, alias.clone()))
                .collect())
        }
        TargetKind::Systemd => Ok(services
            .main_pids(&spec.value)?
            .into_iter()
            .map(|(unit, pid)| {
                let name = alias
                    .clone()
                    .unwrap_or_else(|| unit.replace(".service", ""));
                (pid, Some(name))
            })
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_split_at_first_colon() {
        let spec = TargetSpec::parse(TargetKind::Pid, "kernel:1");
        assert_eq!(spec.alias.as_deref(), Some("kernel"));
        assert_eq!(spec.value, "1");

        let spec = TargetSpec::parse(TargetKind::Pattern, "db:^postgres: .*");
        assert_eq!(spec.alias.as_deref(), Some("db"));
        assert_eq!(spec.value, "^postgres: .*");

        let spec = TargetSpec::parse(TargetKind::PidFile, "/run/nginx.pid");
        assert_eq!(spec.alias, None);
        assert_eq!(spec.value, "/run/nginx.pid");
    }

    #[test]
    fn empty_alias_is_none() {
        let spec = TargetSpec::parse(TargetKind::Pid, ":12");
        assert_eq!(spec.alias, None);
        assert_eq!(spec.value, "12");
    }

    #[test]
    fn pid_must_be_positive() {
        assert_eq!(parse_pid(" 42\n").unwrap(), 42);
        assert!(parse_pid("0").is_err());
        assert!(parse_pid("-3").is_err());
        assert!(parse_pid("four").is_err());
    }

    #[test]
    fn list_units_rows() {
        assert_eq!(
            unit_id("nginx.service loaded active running A high performance web server"),
            Some("nginx.service")
        );
        assert_eq!(
            unit_id("● php-fpm.service loaded failed failed PHP FastCGI"),
            Some("php-fpm.service")
        );
        assert_eq!(unit_id("   "), None);
    }

    #[test]
    fn main_pid_values() {
        assert_eq!(main_pid("MainPID=812\n").unwrap(), Some(812));
        assert_eq!(main_pid("MainPID=0\n").unwrap(), None);
        assert_eq!(main_pid("").unwrap(), None);
        assert!(main_pid("MainPID=x").is_err());
    }
}
