use thiserror::Error;

use crate::common::types::Rid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record {0} not found")]
    RecordNotFound(Rid),
    #[error("Slot {0} is already occupied")]
    SlotOccupied(Rid),
    #[error("Record size mismatch: expected {expected} bytes, got {actual}")]
    RecordSizeMismatch { expected: usize, actual: usize },
}
