//! Rotating file sink.
//!
//! Template placeholders expand against wall-clock time, rollover picks
//! the next index once a queue or size threshold is hit, and two
//! background threads (flush, name refresh) keep the open file fresh
//! between writes. Shaped after the worker-thread-plus-explicit-
//! shutdown-channel pattern in this crate's `multicore` lineage
//! (`SharedWorkerHandle::shutdown`), but scaled down to a single mutex
//! guarding one writer rather than a pool of dispatchers.

mod template;
mod writer;

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{select, tick, unbounded, Receiver, Sender};
use log::warn;

use crate::config::FileSinkConfig;
use crate::error::SinkError;

pub use writer::Writer;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

struct SinkInner {
    writer: Option<Writer>,
    current_path: Option<PathBuf>,
    record_count: usize,
    chunk_size: u64,
    closed: bool,
}

impl Default for SinkInner {
    fn default() -> Self {
        SinkInner {
            writer: None,
            current_path: None,
            record_count: 0,
            chunk_size: 0,
            closed: false,
        }
    }
}

/// A rotating file writer with background flush and name-refresh
/// threads.
///
/// All mutations go through a single mutex; the critical section
/// covers filename selection, file swap, and flush, matching the
/// concurrency model described for this sink — it does not attempt
/// the lock-free-after-swap micro-optimization the model allows, since
/// under the caller's own single-producer invariant the two are
/// behaviorally equivalent and the simpler form is far easier to get
/// right.
pub struct FileSink {
    config: Arc<FileSinkConfig>,
    inner: Arc<Mutex<SinkInner>>,
    shutdown_tx: Sender<()>,
    flush_handle: Option<JoinHandle<()>>,
    refresh_handle: Option<JoinHandle<()>>,
    closed: bool,
}

impl FileSink {
    /// Opens a sink for `config`, spawning its background flush and
    /// name-refresh threads. The underlying file is opened lazily, on
    /// the first `write`.
    pub fn new(config: FileSinkConfig) -> Self {
        let config = Arc::new(config);
        let inner = Arc::new(Mutex::new(SinkInner::default()));
        let (shutdown_tx, shutdown_rx) = unbounded();

        let flush_handle = {
            let inner = Arc::clone(&inner);
            let config = Arc::clone(&config);
            let shutdown_rx = shutdown_rx.clone();
            thread::spawn(move || flush_loop(inner, config, shutdown_rx))
        };
        let refresh_handle = {
            let inner = Arc::clone(&inner);
            let config = Arc::clone(&config);
            thread::spawn(move || refresh_loop(inner, config, shutdown_rx))
        };

        FileSink {
            config,
            inner,
            shutdown_tx,
            flush_handle: Some(flush_handle),
            refresh_handle: Some(refresh_handle),
            closed: false,
        }
    }

    /// Writes `bytes` followed by the configured record separator,
    /// rolling to a new file first if the current one has crossed a
    /// threshold or none is open yet. Returns the number of payload
    /// bytes written (excluding the separator) on success.
    pub fn write(&self, bytes: &[u8]) -> Result<usize, SinkError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(SinkError::Closed);
        }
        let desired = desired_filename(&self.config, &inner);
        if inner.current_path.as_ref() != Some(&desired) {
            swap_file(&mut inner, desired)?;
        }
        let writer = inner
            .writer
            .as_mut()
            .expect("swap_file always leaves a writer open");
        writer.write_all(bytes)?;
        writer.write_all(&self.config.payload_separator)?;
        inner.record_count += 1;
        Ok(bytes.len())
    }

    /// Flushes and closes the current file, and stops the background
    /// threads. Idempotent: a second call is a no-op.
    pub fn close(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.flush_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.refresh_handle.take() {
            let _ = handle.join();
        }
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        if let Some(writer) = inner.writer.take() {
            writer.close()?;
        }
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("error while closing file sink: {err}");
        }
    }
}

fn flush_loop(inner: Arc<Mutex<SinkInner>>, config: Arc<FileSinkConfig>, shutdown: Receiver<()>) {
    let ticker = tick(Duration::from_millis(config.flush_interval_ms));
    loop {
        select! {
            recv(ticker) -> _ => {
                let mut guard = inner.lock().unwrap();
                if let Some(writer) = guard.writer.as_mut() {
                    if let Err(err) = writer.flush() {
                        warn!("flush failed: {err}");
                    }
                }
                if let Some(path) = guard.current_path.clone() {
                    if let Ok(meta) = fs::metadata(&path) {
                        guard.chunk_size = meta.len();
                    }
                    // stat failure: chunk_size keeps its last known value,
                    // this cycle's rollover check just runs on stale data.
                }
            }
            recv(shutdown) -> _ => break,
        }
    }
}

fn refresh_loop(inner: Arc<Mutex<SinkInner>>, config: Arc<FileSinkConfig>, shutdown: Receiver<()>) {
    let ticker = tick(Duration::from_millis(config.name_refresh_interval_ms));
    loop {
        select! {
            recv(ticker) -> _ => {
                let mut guard = inner.lock().unwrap();
                if guard.writer.is_none() {
                    // nothing open yet; the first write() opens it.
                    continue;
                }
                let desired = desired_filename(&config, &guard);
                if guard.current_path.as_ref() != Some(&desired) {
                    if let Err(err) = swap_file(&mut guard, desired) {
                        warn!("rollover failed: {err}");
                    }
                }
            }
            recv(shutdown) -> _ => break,
        }
    }
}

/// Selects the path the sink should be writing to right now: the
/// template expanded against wall-clock time, with an index suffix
/// chosen by the rollover rule (non-append mode only).
fn desired_filename(config: &FileSinkConfig, inner: &SinkInner) -> PathBuf {
    let expanded = template::expand(&config.template, chrono::Local::now());
    if config.append {
        return PathBuf::from(expanded);
    }
    let (dir, stem, ext) = template::split(&expanded);
    let max_index = template::glob_indices(&dir, &stem, &ext).into_iter().max();
    let full_or_missing = inner.writer.is_none()
        || inner.record_count >= config.queue_limit
        || inner.chunk_size >= config.size_limit;
    let index = match max_index {
        None => 0,
        Some(n) => {
            if full_or_missing {
                n + 1
            } else {
                n
            }
        }
    };
    template::indexed_path(&dir, &stem, &ext, index)
}

fn swap_file(inner: &mut SinkInner, path: PathBuf) -> Result<(), SinkError> {
    if let Some(writer) = inner.writer.take() {
        writer.close()?;
    }
    let writer = open_file(&path)?;
    inner.writer = Some(writer);
    inner.current_path = Some(path);
    inner.record_count = 0;
    inner.chunk_size = 0;
    Ok(())
}

fn open_file(path: &Path) -> Result<Writer, SinkError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = fs::create_dir_all(parent);
        }
    }
    let file = open_truncated(path).map_err(|source| SinkError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let is_gzip = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    Ok(Writer::open(file, is_gzip))
}

#[cfg(unix)]
fn open_truncated(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o660)
        .open(path)
}

#[cfg(not(unix))]
fn open_truncated(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s7_rollover_index_monotonicity() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("out_%Y.log");
        let config = FileSinkConfig {
            template: template.to_string_lossy().into_owned(),
            queue_limit: 2,
            size_limit: u64::MAX,
            flush_interval_ms: 60_000,
            name_refresh_interval_ms: 60_000,
            payload_separator: b"\n".to_vec(),
            append: false,
        };
        let sink = FileSink::new(config);
        sink.write(b"one").unwrap();
        sink.write(b"two").unwrap();
        sink.write(b"three").unwrap();
        drop(sink);

        let mut entries: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].ends_with("_0.log"));
        assert!(entries[1].ends_with("_1.log"));

        let first = fs::read_to_string(dir.path().join(&entries[0])).unwrap();
        assert_eq!(first.matches('\n').count(), 2);
        let second = fs::read_to_string(dir.path().join(&entries[1])).unwrap();
        assert_eq!(second.matches('\n').count(), 1);
    }

    #[test]
    fn append_mode_never_rolls_over() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("out_%Y.log");
        let config = FileSinkConfig {
            template: template.to_string_lossy().into_owned(),
            queue_limit: 1,
            size_limit: 1,
            flush_interval_ms: 60_000,
            name_refresh_interval_ms: 60_000,
            payload_separator: b"\n".to_vec(),
            append: true,
        };
        let sink = FileSink::new(config);
        sink.write(b"one").unwrap();
        sink.write(b"two").unwrap();
        drop(sink);

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn write_after_close_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("out_%Y.log");
        let config = FileSinkConfig {
            template: template.to_string_lossy().into_owned(),
            ..FileSinkConfig::default()
        };
        let mut sink = FileSink::new(config);
        sink.write(b"one").unwrap();
        sink.close().unwrap();
        assert!(matches!(sink.write(b"two"), Err(SinkError::Closed)));
    }
}
