//! Configuration options.
//!
//! Applications embedding `wiretap-core` are free to define their own
//! command line arguments and configuration loading, but the two
//! config structs below mirror the knobs each component actually reads:
//! [`FlowTrackerConfig`] (age-out cadence) and [`FileSinkConfig`]
//! (rollover/template/flush settings). Both implement [`Default`] so a
//! caller can start from sane values and override only what matters.
//!
//! `MessageAssembler` takes no config of its own: out-of-order packets
//! are handled by sorted insertion (`assembler::MessageAssembler::add`),
//! not a bounded out-of-order buffer, so there is no per-assembler limit
//! to expose here.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Loads a [`FileSinkConfig`] from a TOML file at `path`.
pub fn load_sink_config<P: AsRef<Path>>(path: P) -> Result<FileSinkConfig, ConfigError> {
    let config_str = fs::read_to_string(path)?;
    let config: FileSinkConfig = toml::from_str(&config_str)?;
    Ok(config)
}

/* --------------------------------------------------------------------------------- */

/// [`crate::flow::FlowTracker`] settings.
///
/// ## Example
/// ```toml
/// [flow_tracker]
///     quiescence_ms = 2000
///     check_interval_ms = 1000
/// ```
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FlowTrackerConfig {
    /// A message can go this long (in milliseconds) without a new
    /// packet before it is aged out: discarded if incomplete, emitted
    /// best-effort if complete. Defaults to `2000` (2 seconds).
    #[serde(default = "default_quiescence_ms")]
    pub quiescence_ms: u64,

    /// How often the age-out scan runs, in milliseconds. Defaults to
    /// `1000` (1 second).
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
}

impl Default for FlowTrackerConfig {
    fn default() -> Self {
        FlowTrackerConfig {
            quiescence_ms: default_quiescence_ms(),
            check_interval_ms: default_check_interval_ms(),
        }
    }
}

fn default_quiescence_ms() -> u64 {
    2000
}

fn default_check_interval_ms() -> u64 {
    1000
}

/* --------------------------------------------------------------------------------- */

/// [`crate::sink::FileSink`] settings.
///
/// ## Example
/// ```toml
/// [sink]
///     template = "out_%Y%m%d.log"
///     queue_limit = 10_000
///     size_limit = 104_857_600
///     flush_interval_ms = 1000
///     name_refresh_interval_ms = 1000
///     append = false
/// ```
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FileSinkConfig {
    /// Output path template. Supports `%Y %m %d %H %M %S %NS`
    /// placeholders, expanded from wall-clock time at each name
    /// refresh. A trailing `.gz` extension switches the writer to a
    /// gzip stream.
    pub template: String,

    /// Rollover threshold: roll to the next index once this many
    /// records have been written to the current file. Defaults to
    /// `10_000`.
    #[serde(default = "default_queue_limit")]
    pub queue_limit: usize,

    /// Rollover threshold: roll to the next index once the current
    /// file reaches this many bytes. Defaults to `100 MiB`.
    #[serde(default = "default_size_limit")]
    pub size_limit: u64,

    /// Background flush cadence, in milliseconds. Defaults to `1000`.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Filename-selection re-evaluation cadence, in milliseconds.
    /// Defaults to `1000`.
    #[serde(default = "default_name_refresh_interval_ms")]
    pub name_refresh_interval_ms: u64,

    /// Byte sequence appended after every record. Defaults to a single
    /// newline.
    #[serde(default = "default_payload_separator")]
    pub payload_separator: Vec<u8>,

    /// Disables rollover entirely: every write appends to the
    /// template's literal expansion with no index suffix. Defaults to
    /// `false`.
    #[serde(default = "default_append")]
    pub append: bool,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        FileSinkConfig {
            template: default_template(),
            queue_limit: default_queue_limit(),
            size_limit: default_size_limit(),
            flush_interval_ms: default_flush_interval_ms(),
            name_refresh_interval_ms: default_name_refresh_interval_ms(),
            payload_separator: default_payload_separator(),
            append: default_append(),
        }
    }
}

fn default_template() -> String {
    "out_%Y%m%d.log".to_string()
}

fn default_queue_limit() -> usize {
    10_000
}

fn default_size_limit() -> u64 {
    100 * 1024 * 1024
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_name_refresh_interval_ms() -> u64 {
    1000
}

fn default_payload_separator() -> Vec<u8> {
    vec![b'\n']
}

fn default_append() -> bool {
    false
}
