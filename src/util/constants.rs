// LogPump - util/constants.rs
//
// Single source of truth for named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "LogPump";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "LogPump";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Log file layout (upstream writer)
// =============================================================================

/// File name glob a log file must match to be tracked.
pub const DEFAULT_INCLUDE_PATTERN: &str = "*Log*.txt";

/// UTF-16LE byte-order mark written at the start of every log file.
pub const UTF16LE_BOM: [u8; 2] = [0xFF, 0xFE];

/// Number of characters in the fixed-width `YYYY-MM-DDTHH:MM:SS` timestamp.
pub const TIMESTAMP_WIDTH: usize = 19;

/// Log directories, relative to the user's Documents folder, that the game
/// client writes to. Only those that exist on this machine are watched.
pub const DEFAULT_ROOT_SUBPATHS: &[&str] = &[
    "SEGA/PHANTASYSTARONLINE2/log",
    "SEGA/PHANTASYSTARONLINE2_NGS/log",
    "SEGA/PHANTASYSTARONLINE2_NGS/log_ngs",
    "SEGA/PHANTASYSTARONLINE2_NGS_CBT/log",
    "SEGA/PHANTASYSTARONLINE2_NGS_CBT/log_ngs",
];

// =============================================================================
// Segment reader
// =============================================================================

/// Maximum bytes read from a single file in one scan.
/// A record larger than this extends the read, up to `MAX_TAIL_PARTIAL_BYTES`.
pub const MAX_TAIL_READ_BYTES_PER_TICK: usize = 512 * 1_024; // 512 KiB

/// Largest unfinished record kept waiting for its end.
/// Past this the open record is given up: its first line is delivered on
/// its own, or an unterminated line is skipped, and the offset moves on.
pub const MAX_TAIL_PARTIAL_BYTES: usize = MAX_TAIL_READ_BYTES_PER_TICK * 4; // 2 MiB

/// Pause before re-reading a file whose tail is an unfinished line (ms).
pub const DEFAULT_RETRY_DELAY_MS: u64 = 200;

/// Maximum user-configurable retry delay (ms).
pub const MAX_RETRY_DELAY_MS: u64 = 2_000;

/// Re-reads attempted within one scan when the tail is unfinished.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 1;

/// Upper bound on retry attempts; keeps one scan from stalling the worker.
pub const MAX_RETRY_ATTEMPTS: u32 = 5;

// =============================================================================
// Timestamp cache
// =============================================================================

/// Raw timestamp strings remembered per source group.
/// Consecutive records usually share the same second.
pub const TIMESTAMP_CACHE_CAPACITY: usize = 8;

// =============================================================================
// Reorder buffer
// =============================================================================

/// Timestamp span (seconds) across buffered entries that triggers a
/// force-flush of a sequence gap.
pub const DEFAULT_GAP_THRESHOLD_SECS: i64 = 3;

/// Minimum configurable gap threshold (seconds).
pub const MIN_GAP_THRESHOLD_SECS: i64 = 1;

/// Maximum configurable gap threshold (seconds).
pub const MAX_GAP_THRESHOLD_SECS: i64 = 300;

// The idle flush (entries force-flushed after waiting with no newer
// arrivals) is off unless `[pump] idle_flush_ms` is set.

/// Minimum configurable idle flush interval (ms).
pub const MIN_IDLE_FLUSH_MS: u64 = 500;

/// Maximum configurable idle flush interval (ms).
pub const MAX_IDLE_FLUSH_MS: u64 = 300_000;

// =============================================================================
// Pump
// =============================================================================

/// How often the worker scans every source group (ms).
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 300;

/// Minimum configurable scan interval (ms).
pub const MIN_SCAN_INTERVAL_MS: u64 = 50;

/// Maximum configurable scan interval (ms).
pub const MAX_SCAN_INTERVAL_MS: u64 = 10_000;

/// How often the stop flag is checked within each scan sleep (ms).
pub const STOP_CHECK_INTERVAL_MS: u64 = 50;

/// How often the console consumer drains the hand-off queue (ms).
pub const DEFAULT_CONSUMER_INTERVAL_MS: u64 = 500;

/// Maximum configurable consumer interval (ms).
pub const MAX_CONSUMER_INTERVAL_MS: u64 = 10_000;

/// Maximum entries the consumer handles per drain; the rest wait one tick.
pub const MAX_ENTRIES_PER_DRAIN: usize = 5_000;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a raw record quoted in a warning.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
