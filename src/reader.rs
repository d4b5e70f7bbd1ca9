// src/reader.rs
// Streaming decoder for zstd-compressed PGN dumps. Tracks compressed-byte
// progress independent of how many decompressed lines have been produced,
// so a progress bar can key off the on-disk file size.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::PipelineError;

/// Wraps a `Read` and counts bytes as they pass through, independent of the
/// decoder sitting on top of it.
struct CountingReader<R> {
    inner: R,
    count: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Reads a zstd-compressed PGN file line by line, replacing invalid UTF-8
/// sequences rather than failing (mirrors Python's `errors="replace"`).
pub struct CompressedLineReader {
    lines: Box<dyn BufRead>,
    compressed_bytes_read: Arc<AtomicU64>,
    total_compressed_bytes: u64,
}

impl CompressedLineReader {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path).map_err(|e| PipelineError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let total_compressed_bytes = file.metadata().map(|m| m.len()).unwrap_or(0);

        let count = Arc::new(AtomicU64::new(0));
        let counting = CountingReader {
            inner: file,
            count: count.clone(),
        };

        let decoder = zstd::stream::read::Decoder::new(counting).map_err(|e| PipelineError::Decompress {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(CompressedLineReader {
            lines: Box::new(BufReader::new(decoder)),
            compressed_bytes_read: count,
            total_compressed_bytes,
        })
    }

    pub fn compressed_bytes_read(&self) -> u64 {
        self.compressed_bytes_read.load(Ordering::Relaxed)
    }

    pub fn total_compressed_bytes(&self) -> u64 {
        self.total_compressed_bytes
    }

    /// Pulls the next decoded line, stripping the trailing newline. Returns
    /// `Ok(None)` at end of stream.
    pub fn next_line(&mut self) -> Result<Option<String>, PipelineError> {
        let mut buf = Vec::new();
        let n = self
            .lines
            .read_until(b'\n', &mut buf)
            .map_err(|e| PipelineError::Decompress {
                path: Path::new("<stream>").to_path_buf(),
                source: e,
            })?;
        if n == 0 {
            return Ok(None);
        }
        while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') {
            buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }
}

impl Iterator for CompressedLineReader {
    type Item = Result<String, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
