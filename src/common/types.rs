use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Transaction ID type
pub type TxnId = u32;

/// Table handle type (the open table file descriptor)
pub type TableId = u32;

/// LSN (Log Sequence Number) type
pub type Lsn = u64;

/// Position of a record inside a table file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rid {
    pub page_no: u32,
    pub slot_no: u32,
}

impl Rid {
    pub fn new(page_no: u32, slot_no: u32) -> Self {
        Self { page_no, slot_no }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_no, self.slot_no)
    }
}

/// Position in an index's key order.
///
/// Positions sit between entries: `Before(k)` precedes every entry with key
/// `k` and `After(k)` follows them. A position is named by a key rather than
/// a slot, so it does not move when other entries are inserted or removed.
/// `Min` and `Max` stand for the open ends of an unbounded range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Iid {
    Min,
    Before(Vec<u8>),
    After(Vec<u8>),
    Max,
}

impl Iid {
    pub fn before(key: &[u8]) -> Self {
        Iid::Before(key.to_vec())
    }

    pub fn after(key: &[u8]) -> Self {
        Iid::After(key.to_vec())
    }

    /// True iff `self <= Iid::before(key)`
    pub fn is_at_or_before(&self, key: &[u8]) -> bool {
        match self {
            Iid::Min => true,
            Iid::Before(k) => k.as_slice() <= key,
            Iid::After(k) => k.as_slice() < key,
            Iid::Max => false,
        }
    }

    /// True iff `Iid::before(key) < self`
    pub fn is_past(&self, key: &[u8]) -> bool {
        match self {
            Iid::Min => false,
            Iid::Before(k) => key < k.as_slice(),
            Iid::After(k) => key <= k.as_slice(),
            Iid::Max => true,
        }
    }
}

impl Ord for Iid {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Iid::Min, Iid::Min) | (Iid::Max, Iid::Max) => Ordering::Equal,
            (Iid::Min, _) | (_, Iid::Max) => Ordering::Less,
            (_, Iid::Min) | (Iid::Max, _) => Ordering::Greater,
            (Iid::Before(a), Iid::Before(b)) | (Iid::After(a), Iid::After(b)) => a.cmp(b),
            (Iid::Before(a), Iid::After(b)) => a.cmp(b).then(Ordering::Less),
            (Iid::After(a), Iid::Before(b)) => a.cmp(b).then(Ordering::Greater),
        }
    }
}

impl PartialOrd for Iid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Iid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Iid::Min => write!(f, "-inf"),
            Iid::Before(key) => write!(f, "<{}", hex::encode(key)),
            Iid::After(key) => write!(f, "{}>", hex::encode(key)),
            Iid::Max => write!(f, "+inf"),
        }
    }
}
