use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::logging::LogFormat;
use crate::select::TargetSpec;
use crate::system::collector::{DEFAULT_WORKERS, Strategy};
use crate::system::procfs::DEFAULT_PROC_ROOT;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub cache: CacheConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub multi_threaded: bool,
    pub workers: usize,
    pub proc_root: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            multi_threaded: false,
            workers: DEFAULT_WORKERS,
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            dir: PathBuf::from("/tmp"),
            name: "psstat".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            measurement: "psstat".to_string(),
            tags: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("psstat").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}

/// Everything one run needs, fixed before any process is read.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub targets: Vec<TargetSpec>,
    pub tags: BTreeMap<String, String>,
    pub measurement: String,
    pub cache_path: PathBuf,
    pub proc_root: PathBuf,
    pub strategy: Strategy,
}

impl RunConfig {
    pub fn new(config: &Config, targets: Vec<TargetSpec>) -> Self {
        let strategy = if config.general.multi_threaded {
            Strategy::Concurrent {
                workers: config.general.workers.max(1),
            }
        } else {
            Strategy::Sequential
        };

        RunConfig {
            targets,
            tags: config.output.tags.clone(),
            measurement: config.output.measurement.clone(),
            cache_path: config.cache.dir.join(&config.cache.name),
            proc_root: config.general.proc_root.clone(),
            strategy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert!(!config.general.multi_threaded);
        assert_eq!(config.general.workers, 4);
        assert_eq!(config.general.proc_root, Path::new("/proc"));
        assert_eq!(config.cache.dir, Path::new("/tmp"));
        assert_eq!(config.cache.name, "psstat");
        assert_eq!(config.output.measurement, "psstat");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn parse_partial_toml() {
        let toml_str = r#"
[cache]
dir = "/var/cache/psstat"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.cache.dir, Path::new("/var/cache/psstat"));
        // Other fields should be defaults
        assert_eq!(config.cache.name, "psstat");
        assert_eq!(config.general.workers, 4);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[general]
multi_threaded = true
workers = 8
proc_root = "/host/proc"

[cache]
dir = "/run/psstat"
name = "web"

[output]
measurement = "procs"
tags = { env = "production", dc = "ams1" }

[logging]
level = "debug"
format = "json"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.general.multi_threaded);
        assert_eq!(config.general.workers, 8);
        assert_eq!(config.general.proc_root, Path::new("/host/proc"));
        assert_eq!(config.output.measurement, "procs");
        assert_eq!(config.output.tags["env"], "production");
        assert_eq!(config.output.tags["dc"], "ams1");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);

        let run = RunConfig::new(&config, Vec::new());
        assert_eq!(run.cache_path, Path::new("/run/psstat/web"));
        assert_eq!(run.strategy, Strategy::Concurrent { workers: 8 });
    }

    #[test]
    fn zero_workers_still_runs() {
        let mut config = Config::default();
        config.general.multi_threaded = true;
        config.general.workers = 0;
        let run = RunConfig::new(&config, Vec::new());
        assert_eq!(run.strategy, Strategy::Concurrent { workers: 1 });
    }

    #[test]
    fn single_threaded_by_default() {
        let run = RunConfig::new(&Config::default(), Vec::new());
        assert_eq!(run.strategy, Strategy::Sequential);
        assert_eq!(run.cache_path, Path::new("/tmp/psstat"));
    }

    #[test]
    fn missing_file_returns_default() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.toml"));
        assert_eq!(config.cache.name, "psstat");
    }

    #[test]
    fn invalid_toml_returns_default() {
        let temp = std::env::temp_dir().join("psstat_test_invalid.toml");
        std::fs::write(&temp, "this is not valid toml {{{{").unwrap();
        let config = load_config_from_path(&temp);
        assert_eq!(config.general.workers, 4);
        let _ = std::fs::remove_file(&temp);
    }
}
