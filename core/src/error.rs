//! Typed error surfaces.
//!
//! Protocol-level uncertainty (a duplicate segment, a method that
//! doesn't parse, an orphan response) is absorbed locally by
//! [`crate::assembler`] and [`crate::flow`] — those paths return `bool`/
//! `Option`, not `Result`. Only I/O failures that a caller must react to
//! get a typed error: loading a [`crate::config::FileSinkConfig`] and
//! writing through a [`crate::sink::FileSink`].

use thiserror::Error;

/// Errors from loading a TOML configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors from [`crate::sink::FileSink`].
///
/// File-open failure is fatal per the sink's error policy; callers
/// that want to terminate on it may simply propagate with `?` and exit.
/// Flush/gzip errors are surfaced for the caller to decide; a stat
/// failure during the flush cycle is deliberately not representable
/// here because it is not fatal (the cycle is just skipped).
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to open output file {path}: {source}")]
    Open {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("sink has been closed")]
    Closed,
}
