// Transaction concurrency module exports

pub mod lock_mode;
pub mod gap_lock;
pub mod lock_manager;
pub mod transaction;
pub mod transaction_manager;

// Public exports
pub use gap_lock::{GapLock, GapLockTable};
pub use lock_manager::{LockDataId, LockDataType, LockManager, LockRequest, LockRequestQueue};
pub use lock_mode::{GroupLockMode, LockMode};
pub use transaction::{
    AbortReason, Transaction, TransactionError, TransactionState, WriteRecord, WriteType,
};
pub use transaction_manager::TransactionManager;
