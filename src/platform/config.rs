// LogPump - platform/config.rs
//
// Platform directory resolution, default game log roots, and config.toml
// loading with startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::util::constants;
use crate::util::error::ConfigError;
use directories::{ProjectDirs, UserDirs};
use std::path::{Path, PathBuf};

/// Resolved platform paths for LogPump configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/logpump/ or %APPDATA%\LogPump\config\)
    pub config_dir: PathBuf,

    /// Default location of config.toml.
    pub config_file: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        let config_dir = match ProjectDirs::from("", "", constants::APP_ID) {
            Some(proj_dirs) => proj_dirs.config_dir().to_path_buf(),
            None => {
                tracing::warn!("Could not determine platform directories, using current directory");
                PathBuf::from(".")
            }
        };
        let config_file = config_dir.join(constants::CONFIG_FILE_NAME);
        tracing::debug!(
            config = %config_dir.display(),
            file = %config_file.display(),
            "Platform paths resolved"
        );
        Self {
            config_dir,
            config_file,
        }
    }
}

/// The game's log directories under the user's Documents folder that exist
/// on this machine.
pub fn default_roots() -> Vec<PathBuf> {
    let Some(user_dirs) = UserDirs::new() else {
        tracing::warn!("Could not determine the user's home directory");
        return Vec::new();
    };
    let Some(documents) = user_dirs.document_dir() else {
        tracing::warn!("Could not determine the user's Documents directory");
        return Vec::new();
    };
    existing_roots(documents)
}

fn existing_roots(documents: &Path) -> Vec<PathBuf> {
    constants::DEFAULT_ROOT_SUBPATHS
        .iter()
        .map(|sub| documents.join(sub))
        .filter(|path| path.is_dir())
        .collect()
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored so a newer config file still loads.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[watch]` section.
    pub watch: WatchSection,
    /// `[pump]` section.
    pub pump: PumpSection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[watch]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct WatchSection {
    /// Directories to watch, one source group each.
    pub roots: Option<Vec<String>>,
    /// File name globs a log file must match.
    pub include_patterns: Option<Vec<String>>,
    /// File name globs that exclude a log file.
    pub exclude_patterns: Option<Vec<String>>,
}

/// `[pump]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct PumpSection {
    pub scan_interval_ms: Option<u64>,
    pub gap_threshold_secs: Option<i64>,
    pub idle_flush_ms: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub consumer_interval_ms: Option<u64>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration.
///
/// Every value has been checked against the bounds in `util::constants`;
/// invalid values were replaced by defaults and reported as warnings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Watch --
    /// Configured roots; empty means "use the default game directories".
    pub roots: Vec<PathBuf>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,

    // -- Pump --
    pub scan_interval_ms: u64,
    pub gap_threshold_secs: i64,
    /// Idle flush interval; `None` leaves the idle flush off.
    pub idle_flush_ms: Option<u64>,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub consumer_interval_ms: u64,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
    /// Log file path.
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            include_patterns: vec![constants::DEFAULT_INCLUDE_PATTERN.to_string()],
            exclude_patterns: Vec::new(),
            scan_interval_ms: constants::DEFAULT_SCAN_INTERVAL_MS,
            gap_threshold_secs: constants::DEFAULT_GAP_THRESHOLD_SECS,
            idle_flush_ms: None,
            retry_attempts: constants::DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: constants::DEFAULT_RETRY_DELAY_MS,
            consumer_interval_ms: constants::DEFAULT_CONSUMER_INTERVAL_MS,
            log_level: None,
            log_file: None,
        }
    }
}

/// Accept `value` if it lies in `min..=max`, otherwise keep the default and
/// record a warning.
fn in_range<T>(
    field: &str,
    value: Option<T>,
    min: T,
    max: T,
    target: &mut T,
    warnings: &mut Vec<String>,
) where
    T: PartialOrd + Copy + std::fmt::Display,
{
    let Some(value) = value else { return };
    if (min..=max).contains(&value) {
        *target = value;
    } else {
        let err = ConfigError::ValueOutOfRange {
            field: field.to_string(),
            value: value.to_string(),
            expected: format!("{min}-{max}, using default {target}"),
        };
        warnings.push(err.to_string());
    }
}

/// Keep the valid glob patterns from `patterns`, warning about the rest.
fn valid_patterns(
    field: &str,
    patterns: Vec<String>,
    warnings: &mut Vec<String>,
) -> Vec<String> {
    patterns
        .into_iter()
        .filter(|p| match glob::Pattern::new(p) {
            Ok(_) => true,
            Err(e) => {
                warnings.push(format!("{field}: \"{p}\" is not a valid glob ({e}); ignored."));
                false
            }
        })
        .collect()
}

/// Parse and validate config.toml content.
///
/// A TOML syntax error is fatal for the file (`ConfigError::TomlParse`);
/// individual bad values only produce warnings.
pub fn parse_config(content: &str, path: &Path) -> Result<(AppConfig, Vec<String>), ConfigError> {
    let raw: RawConfig = toml::from_str(content).map_err(|e| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config = AppConfig::default();
    let mut warnings = Vec::new();

    // -- Watch --
    if let Some(roots) = raw.watch.roots {
        config.roots = roots
            .into_iter()
            .filter(|r| !r.trim().is_empty())
            .map(PathBuf::from)
            .collect();
    }
    if let Some(include) = raw.watch.include_patterns {
        let include = valid_patterns("[watch] include_patterns", include, &mut warnings);
        if include.is_empty() {
            warnings.push(format!(
                "[watch] include_patterns has no valid pattern. Using default (\"{}\").",
                constants::DEFAULT_INCLUDE_PATTERN
            ));
        } else {
            config.include_patterns = include;
        }
    }
    if let Some(exclude) = raw.watch.exclude_patterns {
        config.exclude_patterns = valid_patterns("[watch] exclude_patterns", exclude, &mut warnings);
    }

    // -- Pump --
    let pump = raw.pump;
    in_range(
        "[pump] scan_interval_ms",
        pump.scan_interval_ms,
        constants::MIN_SCAN_INTERVAL_MS,
        constants::MAX_SCAN_INTERVAL_MS,
        &mut config.scan_interval_ms,
        &mut warnings,
    );
    in_range(
        "[pump] gap_threshold_secs",
        pump.gap_threshold_secs,
        constants::MIN_GAP_THRESHOLD_SECS,
        constants::MAX_GAP_THRESHOLD_SECS,
        &mut config.gap_threshold_secs,
        &mut warnings,
    );
    if let Some(ms) = pump.idle_flush_ms {
        if (constants::MIN_IDLE_FLUSH_MS..=constants::MAX_IDLE_FLUSH_MS).contains(&ms) {
            config.idle_flush_ms = Some(ms);
        } else {
            let err = ConfigError::ValueOutOfRange {
                field: "[pump] idle_flush_ms".to_string(),
                value: ms.to_string(),
                expected: format!(
                    "{}-{}, idle flush stays off",
                    constants::MIN_IDLE_FLUSH_MS,
                    constants::MAX_IDLE_FLUSH_MS
                ),
            };
            warnings.push(err.to_string());
        }
    }
    in_range(
        "[pump] retry_attempts",
        pump.retry_attempts,
        0,
        constants::MAX_RETRY_ATTEMPTS,
        &mut config.retry_attempts,
        &mut warnings,
    );
    in_range(
        "[pump] retry_delay_ms",
        pump.retry_delay_ms,
        1,
        constants::MAX_RETRY_DELAY_MS,
        &mut config.retry_delay_ms,
        &mut warnings,
    );
    in_range(
        "[pump] consumer_interval_ms",
        pump.consumer_interval_ms,
        constants::STOP_CHECK_INTERVAL_MS,
        constants::MAX_CONSUMER_INTERVAL_MS,
        &mut config.consumer_interval_ms,
        &mut warnings,
    );

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default ({}).",
                constants::DEFAULT_LOG_LEVEL
            ));
        }
    }

    // -- Logging: file --
    if let Some(file) = raw.logging.file {
        if !file.is_empty() {
            config.log_file = Some(PathBuf::from(file));
        }
    }

    Ok((config, warnings))
}

/// Load and validate config.toml from `path`.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// If the file does not exist, returns defaults with no warnings (first run).
/// If the file cannot be read or parsed, returns defaults with a warning so
/// the pump still starts and the user is told why their settings were ignored.
///
/// Called before logging is initialised; the caller reports the warnings.
pub fn load_config(path: &Path) -> (AppConfig, Vec<String>) {
    if !path.exists() {
        return (AppConfig::default(), Vec::new());
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            let err = ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            };
            return (AppConfig::default(), vec![format!("{err}. Using defaults.")]);
        }
    };

    match parse_config(&content, path) {
        Ok(parsed) => parsed,
        Err(e) => (AppConfig::default(), vec![format!("{e}. Using defaults.")]),
    }
}
