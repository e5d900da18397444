// LogPump - app/pump.rs
//
// The pump: drives periodic scanning of every source group on one
// background thread and hands ordered entries to the consumer.
//
// Design:
//   - One worker thread owns all group state; nothing is shared with the
//     caller except the stop flag (`Arc<AtomicBool>`) and whatever the
//     entry callback captures (an `mpsc` sender for `with_channel`).
//   - The worker sleeps in `STOP_CHECK_INTERVAL_MS` slices between scans so
//     a stop request is noticed promptly. A scan in progress always
//     completes.
//   - On stop, every group flushes its reorder buffer, so nothing read from
//     disk is lost, and the worker hands its state back to the `Pump` so it
//     can be started again.
//   - A group whose directory cannot be listed is logged and dropped; the
//     others keep running.

use crate::app::group::SourceGroup;
use crate::app::handoff::EntryReceiver;
use crate::app::segment::ReaderConfig;
use crate::core::model::Entry;
use crate::platform::config::AppConfig;
use crate::util::constants::{
    DEFAULT_GAP_THRESHOLD_SECS, DEFAULT_INCLUDE_PATTERN, DEFAULT_SCAN_INTERVAL_MS,
    STOP_CHECK_INTERVAL_MS,
};
use crate::util::error::SourceError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

/// Callback receiving each entry released by a source group.
type EntrySink = Box<dyn FnMut(Entry) + Send>;

/// Settings for a pump and its source groups.
#[derive(Debug, Clone)]
pub struct PumpConfig {
    /// Pause between scans of all groups.
    pub scan_interval: Duration,
    /// Writer-time span that makes the reorder buffer give up on a gap.
    pub gap_threshold_secs: i64,
    /// Wall-clock wait after which buffered entries are released anyway.
    /// `None` keeps entries until the gap threshold or a restart.
    pub idle_flush: Option<Duration>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub reader: ReaderConfig,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(DEFAULT_SCAN_INTERVAL_MS),
            gap_threshold_secs: DEFAULT_GAP_THRESHOLD_SECS,
            idle_flush: None,
            include_patterns: vec![DEFAULT_INCLUDE_PATTERN.to_string()],
            exclude_patterns: Vec::new(),
            reader: ReaderConfig::default(),
        }
    }
}

impl From<&AppConfig> for PumpConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            scan_interval: Duration::from_millis(config.scan_interval_ms),
            gap_threshold_secs: config.gap_threshold_secs,
            idle_flush: config.idle_flush_ms.map(Duration::from_millis),
            include_patterns: config.include_patterns.clone(),
            exclude_patterns: config.exclude_patterns.clone(),
            reader: ReaderConfig {
                retry_attempts: config.retry_attempts,
                retry_delay: Duration::from_millis(config.retry_delay_ms),
                ..ReaderConfig::default()
            },
        }
    }
}

/// State owned by whichever thread is currently driving the groups.
struct WorkerState {
    groups: Vec<SourceGroup>,
    sink: EntrySink,
}

/// Tails every configured root and delivers ordered entries.
pub struct Pump {
    config: PumpConfig,
    /// Present while stopped; moved into the worker while running.
    state: Option<WorkerState>,
    open_errors: Vec<SourceError>,
    stop_flag: Arc<AtomicBool>,
    worker: Option<JoinHandle<WorkerState>>,
}

impl Pump {
    /// Open one source group per root. Roots that cannot be opened are
    /// logged and reported by [`Pump::open_errors`]; the rest are used.
    ///
    /// `on_entry` is called on the worker thread for every released entry.
    pub fn new<I, F>(roots: I, config: PumpConfig, on_entry: F) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
        F: FnMut(Entry) + Send + 'static,
    {
        let mut groups = Vec::new();
        let mut open_errors = Vec::new();

        for root in roots {
            match SourceGroup::open(root, &config) {
                Ok(group) => groups.push(group),
                Err(e) => {
                    tracing::error!(error = %e, "Cannot watch log directory");
                    open_errors.push(e);
                }
            }
        }

        if groups.is_empty() {
            tracing::warn!("No log directory could be opened; the pump has nothing to watch");
        }

        Self {
            config,
            state: Some(WorkerState {
                groups,
                sink: Box::new(on_entry),
            }),
            open_errors,
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Like [`Pump::new`], delivering entries through a FIFO queue that the
    /// returned receiver drains.
    pub fn with_channel<I>(roots: I, config: PumpConfig) -> (Self, EntryReceiver)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let (tx, rx) = mpsc::channel();
        let pump = Self::new(roots, config, move |entry| {
            if tx.send(entry).is_err() {
                tracing::trace!("Entry receiver dropped; discarding entry");
            }
        });
        (pump, EntryReceiver::new(rx))
    }

    /// Spawn the background worker. Does nothing if it is already running.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            tracing::debug!("Pump already running");
            return;
        }
        let Some(state) = self.state.take() else {
            tracing::warn!("Pump state lost after a worker failure; cannot start");
            return;
        };

        self.stop_flag.store(false, Ordering::SeqCst);
        let stop = Arc::clone(&self.stop_flag);
        let interval = self.config.scan_interval;
        let groups = state.groups.len();

        let spawned = std::thread::Builder::new()
            .name("logpump-worker".to_string())
            .spawn(move || run_worker(state, interval, stop));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                tracing::info!(groups, interval_ms = interval.as_millis() as u64, "Pump started");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn pump worker");
            }
        }
    }

    /// Stop the worker and wait for it to exit. Buffered entries are
    /// flushed to the callback before this returns.
    pub fn stop(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.stop_flag.store(true, Ordering::SeqCst);
        match handle.join() {
            Ok(state) => {
                self.state = Some(state);
                tracing::info!("Pump stopped");
            }
            Err(_) => {
                tracing::error!("Pump worker panicked; its source groups are lost");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Number of source groups, while the pump is stopped.
    pub fn group_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.groups.len())
    }

    /// Roots that failed to open.
    pub fn open_errors(&self) -> &[SourceError] {
        &self.open_errors
    }
}

impl Drop for Pump {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Pump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pump")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("open_errors", &self.open_errors.len())
            .finish()
    }
}

// =============================================================================
// Background worker
// =============================================================================

fn run_worker(mut state: WorkerState, interval: Duration, stop: Arc<AtomicBool>) -> WorkerState {
    let slice = Duration::from_millis(STOP_CHECK_INTERVAL_MS).min(interval);
    let slices = (interval.as_millis() / slice.as_millis().max(1)).max(1);

    'run: loop {
        scan_all(&mut state);

        for _ in 0..slices {
            if stop.load(Ordering::SeqCst) {
                break 'run;
            }
            std::thread::sleep(slice);
        }
    }

    let mut flushed = 0;
    for group in &mut state.groups {
        flushed += group.finish(&mut state.sink);
    }
    tracing::debug!(flushed, "Pump worker exiting");
    state
}

fn scan_all(state: &mut WorkerState) {
    let sink = &mut state.sink;
    state.groups.retain_mut(|group| match group.scan(&mut *sink) {
        Ok(count) => {
            if count > 0 {
                tracing::trace!(root = %group.root().display(), count, "Entries delivered");
            }
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Log directory lost; no longer watching it");
            false
        }
    });
}
