// TessDB ordered index
//
// Gap locks are expressed over index positions, so the only thing the
// concurrency core needs from an index is a position type whose order
// follows key order and a way to map keys onto it.

pub mod key_index;

pub use key_index::KeyIndex;

use std::ops::Bound;

use crate::common::types::{Iid, Rid};

pub trait OrderedIndex: Send + Sync {
    /// Position just ahead of every entry whose key is >= `key`
    fn lower_bound(&self, key: &[u8]) -> Iid;

    /// Position just ahead of every entry whose key is > `key`
    fn upper_bound(&self, key: &[u8]) -> Iid;

    /// Records whose entries lie in `[start, end)`, in key order
    fn rids_between(&self, start: &Iid, end: &Iid) -> Vec<Rid>;

    /// Half-open interval `[start, end)` holding exactly the keys within the
    /// given bounds. Open ends map to `Iid::Min` / `Iid::Max`.
    fn resolve_range(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> (Iid, Iid) {
        let start = match lower {
            Bound::Included(key) => self.lower_bound(key),
            Bound::Excluded(key) => self.upper_bound(key),
            Bound::Unbounded => Iid::Min,
        };
        let end = match upper {
            Bound::Included(key) => self.upper_bound(key),
            Bound::Excluded(key) => self.lower_bound(key),
            Bound::Unbounded => Iid::Max,
        };
        (start, end)
    }
}
