use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use tracing::{debug, error};

use psstat::config::{Config, RunConfig, load_config, load_config_from_path};
use psstat::format::render_line;
use psstat::logging::{self, LogFormat};
use psstat::rate::measure;
use psstat::select::{Systemctl, TargetKind, TargetSpec, resolve_targets};
use psstat::system::cache::SnapshotStore;
use psstat::system::collector::Collector;
use psstat::system::host::HostInfo;
use psstat::system::procfs::ProcFs;

#[derive(Parser)]
#[command(
    name = "psstat",
    version,
    about = "Gather resource usage of processes and their children",
    after_help = "When a target is given as <name>:<value>, <name> is used as the \
                  process_name tag instead of the name read from the process."
)]
struct Cli {
    /// PID of a process to gather stats of, as [<name>:]<pid>
    #[arg(long = "pid", value_name = "[NAME:]PID")]
    pids: Vec<String>,

    /// File containing the PID of a process, as [<name>:]<path>
    #[arg(long = "pid-file", value_name = "[NAME:]PATH")]
    pid_files: Vec<String>,

    /// Regex matched against process names (all matches are used)
    #[arg(long = "pattern", value_name = "[NAME:]REGEX")]
    patterns: Vec<String>,

    /// Systemd unit pattern to take main PIDs from (all matches are used)
    #[arg(long = "systemd", value_name = "[NAME:]PATTERN")]
    systemd: Vec<String>,

    /// Tag to add to every line, e.g. env=production
    #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_tag)]
    tags: Vec<(String, String)>,

    /// Directory holding the stats cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// File name of the stats cache inside the cache directory
    #[arg(long)]
    cache_name: Option<String>,

    /// Read processes on several threads
    #[arg(long, default_value_t = false)]
    multi_threaded: bool,

    /// Maximum concurrent reads with --multi-threaded
    #[arg(long)]
    workers: Option<usize>,

    /// Root of the procfs tree
    #[arg(long)]
    proc_root: Option<PathBuf>,

    /// Measurement name of the output lines
    #[arg(long)]
    measurement: Option<String>,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level written to stderr: error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<String>,

    /// Log format written to stderr
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn targets(&self) -> Vec<TargetSpec> {
        let groups = [
            (TargetKind::Pid, &self.pids),
            (TargetKind::PidFile, &self.pid_files),
            (TargetKind::Pattern, &self.patterns),
            (TargetKind::Systemd, &self.systemd),
        ];
        groups
            .into_iter()
            .flat_map(|(kind, raws)| raws.iter().map(move |raw| TargetSpec::parse(kind, raw)))
            .collect()
    }
}

fn parse_tag(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);
    logging::init(&config.logging.level, config.logging.format)?;

    let run_config = RunConfig::new(&config, cli.targets());
    run(&run_config).await
}

async fn run(config: &RunConfig) -> Result<()> {
    let host = HostInfo::detect();

    let collector = Collector::new(ProcFs::new(&config.proc_root), config.strategy);
    let current = collector
        .enumerate()
        .await
        .wrap_err("failed to gather process information")?;

    let targets = resolve_targets(&config.targets, &current.processes, &Systemctl);

    let store = SnapshotStore::new(&config.cache_path);
    let previous = store.load(&current.pids());
    if let Err(e) = store.save(&current) {
        error!(error = %e, "snapshot cache not updated");
    }

    for (pid, alias) in targets {
        let Some(process) = current.processes.get(pid) else {
            debug!(pid, "target is not running");
            continue;
        };
        let Some(sample) = measure(pid, &current, &previous, &host) else {
            continue;
        };
        let name = alias.as_deref().unwrap_or(&process.name);
        println!(
            "{}",
            render_line(&config.measurement, &config.tags, name, &sample)
        );
    }

    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if cli.multi_threaded {
        config.general.multi_threaded = true;
    }
    if let Some(workers) = cli.workers {
        config.general.workers = workers;
    }
    if let Some(ref root) = cli.proc_root {
        config.general.proc_root = root.clone();
    }
    if let Some(ref dir) = cli.cache_dir {
        config.cache.dir = dir.clone();
    }
    if let Some(ref name) = cli.cache_name {
        config.cache.name = name.clone();
    }
    if let Some(ref measurement) = cli.measurement {
        config.output.measurement = measurement.clone();
    }
    for (key, value) in &cli.tags {
        config.output.tags.insert(key.clone(), value.clone());
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    config
}
