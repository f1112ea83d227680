use std::io;

use byteorder::{LittleEndian, WriteBytesExt};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::Lsn;
use crate::transaction::wal::log_record::{LogRecord, LogRecordError};

/// Error type for log buffer operations
#[derive(Error, Debug)]
pub enum LogBufferError {
    #[error("Log record of {0} bytes does not fit in the buffer")]
    RecordTooLarge(usize),

    #[error("Log record error: {0}")]
    LogRecordError(#[from] LogRecordError),

    #[error("Failed to write buffer: {0}")]
    WriteError(#[from] io::Error),
}

/// Result type for log buffer operations
pub type Result<T> = std::result::Result<T, LogBufferError>;

/// Configuration for log buffer behavior
#[derive(Debug, Clone)]
pub struct LogBufferConfig {
    /// Size of the buffer in bytes
    pub buffer_size: usize,

    /// Flush threshold as a fraction of buffer capacity
    pub flush_threshold: f32,
}

impl Default for LogBufferConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024 * 1024, // 1 MB default
            flush_threshold: 0.75,
        }
    }
}

#[derive(Debug, Default)]
struct BufferSegment {
    /// Length-prefixed serialized records
    data: Vec<u8>,
    /// Highest LSN appended since the last flush
    max_lsn: Lsn,
}

/// In-memory staging area for log records not yet on disk
#[derive(Debug)]
pub struct LogBuffer {
    segment: Mutex<BufferSegment>,
    config: LogBufferConfig,
}

impl LogBuffer {
    pub fn new(config: LogBufferConfig) -> Self {
        Self {
            segment: Mutex::new(BufferSegment {
                data: Vec::with_capacity(config.buffer_size),
                max_lsn: 0,
            }),
            config,
        }
    }

    /// Append a record. Returns true once the buffer has passed its flush threshold.
    pub fn append(&self, record: &LogRecord) -> Result<bool> {
        let data = record.serialize()?;
        let framed_len = data.len() + 4;
        if framed_len > self.config.buffer_size {
            return Err(LogBufferError::RecordTooLarge(data.len()));
        }

        let mut segment = self.segment.lock();
        segment.data.write_u32::<LittleEndian>(data.len() as u32)?;
        segment.data.extend_from_slice(&data);
        segment.max_lsn = segment.max_lsn.max(record.lsn);

        let threshold = (self.config.buffer_size as f32 * self.config.flush_threshold) as usize;
        Ok(segment.data.len() >= threshold)
    }

    /// Hand the buffered bytes to `writer` and reset the buffer.
    ///
    /// Returns the highest LSN written, or 0 when the buffer was empty. The
    /// buffer is only cleared if the writer succeeds.
    pub fn flush<F>(&self, mut writer: F) -> Result<Lsn>
    where
        F: FnMut(&[u8]) -> io::Result<()>,
    {
        let mut segment = self.segment.lock();
        if segment.data.is_empty() {
            return Ok(0);
        }

        writer(&segment.data)?;

        let max_lsn = segment.max_lsn;
        segment.data.clear();
        segment.max_lsn = 0;
        Ok(max_lsn)
    }

    pub fn is_empty(&self) -> bool {
        self.segment.lock().data.is_empty()
    }

    /// Current buffer utilization as a fraction of capacity
    pub fn utilization(&self) -> f32 {
        self.segment.lock().data.len() as f32 / self.config.buffer_size as f32
    }
}
