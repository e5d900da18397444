// LogPump - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// Every error keeps its cause reachable through `source()` so the log
// line written for it carries the full chain.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all LogPump operations.
#[derive(Debug)]
pub enum LogPumpError {
    /// A raw record could not be turned into an entry.
    Record(RecordError),

    /// A watched directory could not be opened or listed.
    Source(SourceError),

    /// Configuration loading or validation failed.
    Config(ConfigError),
}

impl fmt::Display for LogPumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(e) => write!(f, "Malformed record: {e}"),
            Self::Source(e) => write!(f, "Source error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
        }
    }
}

impl std::error::Error for LogPumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Record(e) => Some(e),
            Self::Source(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Record errors
// ---------------------------------------------------------------------------

/// A record that cannot become an `Entry`. Always non-fatal: the record is
/// discarded and the scan moves on.
#[derive(Debug)]
pub enum RecordError {
    /// Fewer than the two leading columns (timestamp, sequence).
    TooFewFields { count: usize },

    /// The first column is not a fixed-width `YYYY-MM-DDTHH:MM:SS` stamp.
    BadTimestamp { raw: String },

    /// The second column is not an unsigned integer.
    BadSequence { raw: String },

    /// The column splitter rejected the record text.
    Csv { source: csv::Error },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewFields { count } => {
                write!(f, "expected at least 2 columns, found {count}")
            }
            Self::BadTimestamp { raw } => {
                write!(f, "cannot parse timestamp '{raw}'")
            }
            Self::BadSequence { raw } => {
                write!(f, "cannot parse sequence number '{raw}'")
            }
            Self::Csv { source } => write!(f, "cannot split columns: {source}"),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Csv { source } => Some(source),
            _ => None,
        }
    }
}

impl From<RecordError> for LogPumpError {
    fn from(e: RecordError) -> Self {
        Self::Record(e)
    }
}

// ---------------------------------------------------------------------------
// Source errors
// ---------------------------------------------------------------------------

/// Failure of a whole source group. Nothing inside the engine can recover
/// from these; other groups keep running.
#[derive(Debug)]
pub enum SourceError {
    /// The watched directory does not exist.
    RootNotFound { path: PathBuf },

    /// The watched path exists but is not a directory.
    NotADirectory { path: PathBuf },

    /// The directory exists but cannot be listed.
    Unreadable { path: PathBuf, source: io::Error },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNotFound { path } => {
                write!(f, "Log directory '{}' does not exist", path.display())
            }
            Self::NotADirectory { path } => {
                write!(f, "Log path '{}' is not a directory", path.display())
            }
            Self::Unreadable { path, source } => {
                write!(
                    f,
                    "Cannot list log directory '{}': {source}",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unreadable { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<SourceError> for LogPumpError {
    fn from(e: SourceError) -> Self {
        Self::Source(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for LogPumpError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_source_error_chain_preserved() {
        let inner = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: LogPumpError = SourceError::Unreadable {
            path: PathBuf::from("/logs"),
            source: inner,
        }
        .into();

        assert!(err.to_string().contains("/logs"));
        let source = err.source().expect("source error");
        let io_cause = source.source().expect("io cause");
        assert_eq!(io_cause.to_string(), "denied");
    }

    #[test]
    fn test_record_error_display() {
        let e = RecordError::TooFewFields { count: 1 };
        assert_eq!(e.to_string(), "expected at least 2 columns, found 1");
        let e = RecordError::BadSequence {
            raw: "abc".to_string(),
        };
        assert!(e.to_string().contains("'abc'"));
    }

    #[test]
    fn test_config_error_wraps_into_top_level() {
        let err: LogPumpError = ConfigError::ValueOutOfRange {
            field: "pump.scan_interval_ms".to_string(),
            value: "5".to_string(),
            expected: "50-60000".to_string(),
        }
        .into();

        assert!(matches!(err, LogPumpError::Config(_)));
        assert!(err.to_string().starts_with("Configuration error: "));
        assert!(err.source().is_some());
    }
}
