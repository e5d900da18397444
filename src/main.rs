// LogPump - main.rs
//
// Console entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading, then logging initialisation (debug mode support)
// 3. Root selection (CLI > config > the game's default log directories)
// 4. Running the pump and printing the ordered entry stream until `exit`

use clap::Parser;
use logpump::platform::config::{self, AppConfig, PlatformPaths};
use logpump::util::constants;
use logpump::{Entry, EntryReceiver, Pump, PumpConfig};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// LogPump - tails rotating game client logs and prints a sequence-ordered
/// entry stream.
#[derive(Parser, Debug)]
#[command(name = "logpump", version, about)]
struct Cli {
    /// Log directories to watch (default: the game's log folders under Documents).
    roots: Vec<PathBuf>,

    /// Path to config.toml (default: the platform config directory).
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Enable debug logging (overrides config level; RUST_LOG still wins).
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Print entries as JSON lines instead of text.
    #[arg(long = "json")]
    json: bool,

    /// Seconds of writer time to wait for a missing sequence number.
    #[arg(
        long = "gap-threshold",
        value_parser = clap::value_parser!(i64).range(
            constants::MIN_GAP_THRESHOLD_SECS..=constants::MAX_GAP_THRESHOLD_SECS
        )
    )]
    gap_threshold: Option<i64>,

    /// Milliseconds between directory scans.
    #[arg(
        long = "scan-interval",
        value_parser = clap::value_parser!(u64).range(
            constants::MIN_SCAN_INTERVAL_MS..=constants::MAX_SCAN_INTERVAL_MS
        )
    )]
    scan_interval: Option<u64>,
}

fn main() {
    let cli = Cli::parse();

    // Config comes first so its [logging] section can shape the subscriber.
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PlatformPaths::resolve().config_file);
    let (mut app_config, config_warnings) = config::load_config(&config_path);

    logpump::util::logging::init(
        cli.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    );

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        config = %config_path.display(),
        "LogPump starting"
    );
    for warning in &config_warnings {
        tracing::warn!("{}", warning);
    }

    apply_overrides(&cli, &mut app_config);

    let roots = select_roots(&cli, &app_config);
    if roots.is_empty() {
        tracing::error!("No log directories to watch");
        eprintln!(
            "Error: no log directories found. Pass one or more directories, or set [watch] roots in {}.",
            config_path.display()
        );
        std::process::exit(1);
    }

    let (mut pump, mut receiver) = Pump::with_channel(roots, PumpConfig::from(&app_config));
    if pump.group_count() == 0 {
        for e in pump.open_errors() {
            eprintln!("Error: {e}");
        }
        std::process::exit(1);
    }

    let quit = Arc::new(AtomicBool::new(false));
    spawn_stdin_watcher(Arc::clone(&quit));

    pump.start();
    eprintln!("Watching for log entries. Type \"exit\" to stop.");

    let interval = Duration::from_millis(app_config.consumer_interval_ms);
    let mut printed: u64 = 0;
    let mut output_ok = true;

    while output_ok && !quit.load(Ordering::SeqCst) && !receiver.is_closed() {
        let entries = next_batch(&mut receiver, interval);
        output_ok = print_entries(&entries, cli.json);
        printed += entries.len() as u64;
    }

    pump.stop();

    // Whatever the worker flushed on the way out is still queued.
    loop {
        let entries = receiver.drain(constants::MAX_ENTRIES_PER_DRAIN);
        if entries.is_empty() || !output_ok {
            break;
        }
        output_ok = print_entries(&entries, cli.json);
        printed += entries.len() as u64;
    }

    tracing::info!(entries = printed, "LogPump exiting");
}

/// Block up to `interval` for the first entry, then take whatever else is
/// already queued within the per-tick budget.
fn next_batch(receiver: &mut EntryReceiver, interval: Duration) -> Vec<Entry> {
    let Some(first) = receiver.recv_timeout(interval) else {
        return Vec::new();
    };
    let mut entries = vec![first];
    entries.extend(receiver.drain(constants::MAX_ENTRIES_PER_DRAIN - 1));
    entries
}

/// Apply CLI flags on top of the file configuration.
fn apply_overrides(cli: &Cli, app_config: &mut AppConfig) {
    if let Some(secs) = cli.gap_threshold {
        app_config.gap_threshold_secs = secs;
    }
    if let Some(ms) = cli.scan_interval {
        app_config.scan_interval_ms = ms;
    }
}

/// Roots from the command line, else from config.toml, else the game's
/// default log directories that exist.
fn select_roots(cli: &Cli, app_config: &AppConfig) -> Vec<PathBuf> {
    if !cli.roots.is_empty() {
        return cli.roots.clone();
    }
    if !app_config.roots.is_empty() {
        return app_config.roots.clone();
    }
    let defaults = config::default_roots();
    tracing::debug!(count = defaults.len(), "Using default game log directories");
    defaults
}

/// Watch stdin for an `exit` line. End of input also stops the pump.
fn spawn_stdin_watcher(quit: Arc<AtomicBool>) {
    let spawned = std::thread::Builder::new()
        .name("stdin-watcher".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) if line.trim().eq_ignore_ascii_case("exit") => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Cannot read stdin");
                        break;
                    }
                }
            }
            quit.store(true, Ordering::SeqCst);
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "Failed to spawn stdin watcher; stop with Ctrl+C");
    }
}

/// Print `entries` to stdout. Returns false once stdout is gone.
fn print_entries(entries: &[Entry], json: bool) -> bool {
    if entries.is_empty() {
        return true;
    }
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for entry in entries {
        let written = if json {
            match serde_json::to_string(entry) {
                Ok(line) => writeln!(out, "{line}"),
                Err(e) => {
                    tracing::warn!(error = %e, sequence = entry.sequence(), "Cannot serialise entry");
                    continue;
                }
            }
        } else {
            writeln!(out, "{entry}")
        };
        if let Err(e) = written {
            tracing::error!(error = %e, "Cannot write to stdout");
            return false;
        }
    }
    if let Err(e) = out.flush() {
        tracing::error!(error = %e, "Cannot flush stdout");
        return false;
    }
    true
}
