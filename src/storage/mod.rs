// TessDB record storage
//
// The concurrency core only needs positional access to fixed-size rows; this
// module provides that contract and an in-memory implementation of it.

pub mod error;
pub mod heap;

pub use error::StorageError;
pub use heap::{TableHeap, TableHeapConfig};

use crate::common::types::{Rid, TableId};

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Positional record access used by executors and by transaction undo
pub trait RecordStore: Send + Sync {
    /// Handle used to name this table in lock requests
    fn table_id(&self) -> TableId;

    fn get(&self, rid: Rid) -> Result<Vec<u8>>;

    /// Store `buf` in any free slot
    fn insert(&self, buf: &[u8]) -> Result<Rid>;

    /// Claim the first free slot `skip` does not reject. The slot stays
    /// invisible and is not handed out again until it is filled with
    /// `insert_at` or given back with `cancel_reservation`.
    fn reserve(&self, skip: &dyn Fn(Rid) -> bool) -> Result<Rid>;

    fn cancel_reservation(&self, rid: Rid);

    /// Store `buf` in exactly `rid`, which must be free or reserved
    fn insert_at(&self, rid: Rid, buf: &[u8]) -> Result<()>;

    fn delete(&self, rid: Rid) -> Result<()>;

    fn update(&self, rid: Rid, buf: &[u8]) -> Result<()>;

    fn contains(&self, rid: Rid) -> bool {
        self.get(rid).is_ok()
    }

    /// Positions of every live record, in storage order
    fn scan(&self) -> Vec<Rid>;
}
