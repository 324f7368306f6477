//! The two writer shapes a [`super::FileSink`] can hold.
//!
//! §9 models this as "dynamic dispatch on writer type ... a capability
//! `{ write, flush, close }` with two variants; the sink stores the
//! variant tag and dispatches through it." `Writer` is exactly that: an
//! enum rather than a `Box<dyn Write>`, since there are only ever the two
//! shapes and a plain match avoids a vtable for a hot per-record path.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

/// A buffered file writer, optionally wrapped in a gzip stream.
pub enum Writer {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Writer {
    /// Opens `file` as a plain buffered writer, or as a gzip stream over
    /// one if `gzip` is set (chosen by the caller from the `.gz`
    /// extension on the selected filename).
    pub fn open(file: File, gzip: bool) -> Self {
        if gzip {
            Writer::Gzip(GzEncoder::new(BufWriter::new(file), Compression::default()))
        } else {
            Writer::Plain(BufWriter::new(file))
        }
    }

    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Writer::Plain(w) => w.write_all(buf),
            Writer::Gzip(w) => w.write_all(buf),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self {
            Writer::Plain(w) => w.flush(),
            Writer::Gzip(w) => w.flush(),
        }
    }

    /// Flushes and finalizes the writer, closing the underlying file.
    /// For the gzip variant this writes the trailing CRC/size footer.
    pub fn close(self) -> io::Result<()> {
        match self {
            Writer::Plain(mut w) => w.flush(),
            Writer::Gzip(w) => w.finish().map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn plain_writer_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.log");
        let file = File::create(&path).unwrap();
        let mut writer = Writer::open(file, false);
        writer.write_all(b"hello\n").unwrap();
        writer.close().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "hello\n");
    }

    #[test]
    fn gzip_writer_produces_valid_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log.gz");
        let file = File::create(&path).unwrap();
        let mut writer = Writer::open(file, true);
        writer.write_all(b"hello, gzip\n").unwrap();
        writer.close().unwrap();

        let file = File::open(&path).unwrap();
        let mut decoder = flate2::read::GzDecoder::new(file);
        let mut out = String::new();
        decoder.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello, gzip\n");
    }
}
