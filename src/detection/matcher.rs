//! Content matching engine.
//!
//! Small files are read whole and matched once. Files above the size
//! threshold are read in fixed-size chunks; each chunk is matched together
//! with the trailing bytes of the previous one (the carry window), so a
//! signature that straddles a chunk boundary is still found.
//!
//! The carry window is at least as long as the longest literal signature.
//! Regex signatures have no static length bound: a regex match longer than
//! the window that spans a boundary can be missed.

use crate::core::config::{
    ScanConfig, DEFAULT_CARRY_WINDOW, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FILE_SIZE,
};
use crate::core::error::{Error, Result};
use crate::detection::signature::SignatureSet;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Size thresholds for the two matching modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Files larger than this are streamed
    pub max_file_size: u64,
    /// Bytes read per streaming chunk
    pub chunk_size: usize,
    /// Requested carry window; may be widened to fit literal signatures
    pub carry_window: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            carry_window: DEFAULT_CARRY_WINDOW,
        }
    }
}

impl From<&ScanConfig> for StreamOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            chunk_size: config.chunk_size.max(1),
            carry_window: config.carry_window,
        }
    }
}

/// Applies a signature set to file content.
pub struct ContentScanner {
    signatures: Arc<SignatureSet>,
    options: StreamOptions,
    carry_window: usize,
    cancelled: Option<Arc<AtomicBool>>,
}

impl ContentScanner {
    /// Create a content scanner.
    pub fn new(signatures: Arc<SignatureSet>, options: StreamOptions) -> Self {
        let carry_window = options.carry_window.max(signatures.longest_literal());
        if carry_window > options.carry_window {
            log::debug!(
                "Carry window widened from {} to {} bytes to fit the longest literal signature",
                options.carry_window,
                carry_window
            );
        }

        Self {
            signatures,
            options,
            carry_window,
            cancelled: None,
        }
    }

    /// Share a cancel flag, checked before every streaming chunk.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(cancelled);
        self
    }

    /// The signature set in use.
    pub fn signatures(&self) -> &Arc<SignatureSet> {
        &self.signatures
    }

    /// Effective carry window in bytes.
    pub fn carry_window(&self) -> usize {
        self.carry_window
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Whether a file of `size` bytes is matched in streaming mode.
    pub fn uses_streaming(&self, size: u64) -> bool {
        size > self.options.max_file_size
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Scan a byte source of known size, picking the mode by size.
    ///
    /// `path` is used for error context and logging only.
    pub fn scan<R: Read>(&self, reader: R, size: u64, path: &Path) -> Result<Option<usize>> {
        if self.uses_streaming(size) {
            log::debug!("Processing large file: {:?} ({} bytes)", path, size);
            self.scan_stream(reader, path)
        } else {
            self.scan_whole(reader, size, path)
        }
    }

    /// Whole-file mode: read everything, match once.
    ///
    /// At most `max_file_size + 1` bytes are buffered. A source that turns
    /// out longer than its reported size is finished in streaming mode.
    pub fn scan_whole<R: Read>(&self, mut reader: R, size: u64, path: &Path) -> Result<Option<usize>> {
        let limit = self.options.max_file_size;
        let capacity = usize::try_from(size.min(limit)).unwrap_or(0);
        let mut content = Vec::with_capacity(capacity);
        (&mut reader)
            .take(limit.saturating_add(1))
            .read_to_end(&mut content)
            .map_err(|e| Error::file_read(path, e))?;

        if content.len() as u64 > limit {
            log::debug!(
                "{:?} is larger than its reported {} bytes; switching to streaming",
                path,
                size
            );
            return self.scan_stream(io::Cursor::new(content).chain(reader), path);
        }

        Ok(self.scan_bytes(&content))
    }

    /// Match an in-memory buffer.
    pub fn scan_bytes(&self, content: &[u8]) -> Option<usize> {
        self.signatures.first_match(content)
    }

    /// Streaming mode: chunked reads with a carry window.
    pub fn scan_stream<R: Read>(&self, mut reader: R, path: &Path) -> Result<Option<usize>> {
        let chunk_size = self.options.chunk_size.max(1);
        let mut chunk = vec![0u8; chunk_size];
        let mut buffer: Vec<u8> = Vec::with_capacity(self.carry_window + chunk_size);
        let mut chunks = 0u64;

        loop {
            if self.is_cancelled() {
                return Err(Error::ScanCancelled);
            }

            let read = fill_chunk(&mut reader, &mut chunk).map_err(|e| Error::file_read(path, e))?;
            if read == 0 {
                break;
            }
            chunks += 1;

            buffer.extend_from_slice(&chunk[..read]);
            if let Some(index) = self.signatures.first_match(&buffer) {
                log::trace!("Signature {} matched in chunk {} of {:?}", index, chunks, path);
                return Ok(Some(index));
            }

            if buffer.len() > self.carry_window {
                let excess = buffer.len() - self.carry_window;
                buffer.drain(..excess);
            }

            if read < chunk_size {
                break;
            }
        }

        log::trace!("Streamed {} chunks of {:?} without a match", chunks, path);
        Ok(None)
    }
}

/// Read until `buf` is full or the stream ends. Returns the bytes read.
fn fill_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
