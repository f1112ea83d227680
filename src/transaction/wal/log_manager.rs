use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{Lsn, TxnId};
use crate::transaction::wal::log_buffer::{LogBuffer, LogBufferConfig, LogBufferError};
use crate::transaction::wal::log_record::{LogRecord, LogRecordContent, LogRecordError, LogRecordType};
use crate::transaction::wal::LogSink;

/// Error type for log manager operations
#[derive(Error, Debug)]
pub enum LogManagerError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Buffer error: {0}")]
    BufferError(#[from] LogBufferError),

    #[error("Log record error: {0}")]
    LogRecordError(#[from] LogRecordError),

    #[error("Invalid log file format")]
    InvalidFormat,
}

/// Result type for log manager operations
pub type Result<T> = std::result::Result<T, LogManagerError>;

/// Log file header structure
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogFileHeader {
    magic: u32,
    version: u32,
    /// LSN of the first record in the file
    first_lsn: Lsn,
}

impl LogFileHeader {
    /// Magic number for log files: "TWAL" in ASCII
    const MAGIC: u32 = 0x5457414C;
    const VERSION: u32 = 1;
    const HEADER_SIZE: u64 = 16;

    fn new(first_lsn: Lsn) -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            first_lsn,
        }
    }

    fn write_to(&self, file: &mut File) -> io::Result<()> {
        file.seek(SeekFrom::Start(0))?;
        file.write_u32::<LittleEndian>(self.magic)?;
        file.write_u32::<LittleEndian>(self.version)?;
        file.write_u64::<LittleEndian>(self.first_lsn)?;
        file.flush()
    }

    fn read_from(file: &mut File) -> io::Result<Self> {
        file.seek(SeekFrom::Start(0))?;
        Ok(Self {
            magic: file.read_u32::<LittleEndian>()?,
            version: file.read_u32::<LittleEndian>()?,
            first_lsn: file.read_u64::<LittleEndian>()?,
        })
    }

    fn validate(&self) -> bool {
        self.magic == Self::MAGIC && self.version == Self::VERSION
    }
}

/// Configuration for the log manager
#[derive(Debug, Clone)]
pub struct LogManagerConfig {
    /// Path to the log directory
    pub log_dir: PathBuf,

    /// File name of the log inside `log_dir`
    pub log_file_name: String,

    /// Log buffer configuration
    pub buffer_config: LogBufferConfig,

    /// Whether to fsync on every flush
    pub force_sync: bool,
}

impl Default for LogManagerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            log_file_name: "tessdb.wal".to_string(),
            buffer_config: LogBufferConfig::default(),
            force_sync: true,
        }
    }
}

/// Manager for write-ahead logging operations
pub struct LogManager {
    config: LogManagerConfig,

    log_file: Mutex<File>,

    /// Next LSN to assign
    current_lsn: AtomicU64,

    /// Highest LSN known to be on disk
    flushed_lsn: AtomicU64,

    log_buffer: LogBuffer,

    /// Keeps LSN assignment and buffer order in step
    append_latch: Mutex<()>,
}

impl LogManager {
    /// Open (or create) the log file described by `config`
    pub fn new(config: LogManagerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.log_dir)?;
        let path = config.log_dir.join(&config.log_file_name);

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        let next_lsn = if file.metadata()?.len() == 0 {
            LogFileHeader::new(1).write_to(&mut file)?;
            1
        } else {
            let header = LogFileHeader::read_from(&mut file)?;
            if !header.validate() {
                return Err(LogManagerError::InvalidFormat);
            }
            let records = Self::read_records(&mut file)?;
            records
                .last()
                .map(|record| record.lsn + 1)
                .unwrap_or(header.first_lsn)
        };

        debug!("Opened log {} at LSN {}", path.display(), next_lsn);

        let log_buffer = LogBuffer::new(config.buffer_config.clone());
        Ok(Self {
            config,
            log_file: Mutex::new(file),
            current_lsn: AtomicU64::new(next_lsn),
            flushed_lsn: AtomicU64::new(next_lsn - 1),
            log_buffer,
            append_latch: Mutex::new(()),
        })
    }

    /// Append a log record to the log buffer
    pub fn append_log_record(
        &self,
        txn_id: TxnId,
        prev_lsn: Lsn,
        record_type: LogRecordType,
        content: LogRecordContent,
    ) -> Result<Lsn> {
        let (lsn, should_flush) = {
            let _guard = self.append_latch.lock();
            let lsn = self.current_lsn.fetch_add(1, Ordering::SeqCst);
            let record = LogRecord::new(lsn, txn_id, prev_lsn, record_type, content);
            (lsn, self.log_buffer.append(&record)?)
        };

        if should_flush {
            self.flush()?;
        }

        Ok(lsn)
    }

    /// Write the log buffer to the log file. Returns the highest LSN on disk.
    pub fn flush(&self) -> Result<Lsn> {
        let mut file = self.log_file.lock();
        let force_sync = self.config.force_sync;

        let written = self.log_buffer.flush(|data| {
            file.seek(SeekFrom::End(0))?;
            file.write_all(data)?;
            if force_sync {
                file.sync_data()?;
            }
            Ok(())
        })?;

        if written > 0 {
            self.flushed_lsn.fetch_max(written, Ordering::SeqCst);
            debug!("Flushed log through LSN {}", written);
        }
        Ok(self.flushed_lsn())
    }

    /// Next LSN to be assigned
    pub fn current_lsn(&self) -> Lsn {
        self.current_lsn.load(Ordering::SeqCst)
    }

    pub fn flushed_lsn(&self) -> Lsn {
        self.flushed_lsn.load(Ordering::SeqCst)
    }

    /// Every record currently on disk, in file order
    pub fn read_all(&self) -> Result<Vec<LogRecord>> {
        let mut file = self.log_file.lock();
        Self::read_records(&mut file)
    }

    fn read_records(file: &mut File) -> Result<Vec<LogRecord>> {
        file.seek(SeekFrom::Start(LogFileHeader::HEADER_SIZE))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut cursor = Cursor::new(bytes.as_slice());
        let mut records = Vec::new();
        while (cursor.position() as usize) < bytes.len() {
            let len = cursor.read_u32::<LittleEndian>()? as usize;
            let start = cursor.position() as usize;
            let end = start + len;
            if end > bytes.len() {
                return Err(LogManagerError::InvalidFormat);
            }
            records.push(LogRecord::deserialize(&bytes[start..end])?);
            cursor.set_position(end as u64);
        }
        Ok(records)
    }
}

impl LogSink for LogManager {
    fn append(
        &self,
        txn_id: TxnId,
        prev_lsn: Lsn,
        record_type: LogRecordType,
        content: LogRecordContent,
    ) -> Result<Lsn> {
        self.append_log_record(txn_id, prev_lsn, record_type, content)
    }

    fn flush_to_disk(&self) -> Result<()> {
        self.flush().map(|_| ())
    }
}
