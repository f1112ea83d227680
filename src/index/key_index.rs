use std::ops::Bound;

use parking_lot::RwLock;

use crate::common::types::{Iid, Rid};
use crate::index::OrderedIndex;

/// Sorted in-memory index over byte-string keys
#[derive(Debug, Default)]
pub struct KeyIndex {
    entries: RwLock<Vec<(Vec<u8>, Rid)>>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_entry(&self, key: &[u8], rid: Rid) {
        let mut entries = self.entries.write();
        let ordinal = entries.partition_point(|(k, r)| (k.as_slice(), *r) < (key, rid));
        entries.insert(ordinal, (key.to_vec(), rid));
    }

    /// Remove the entry for `(key, rid)`; false if it was not present
    pub fn delete_entry(&self, key: &[u8], rid: Rid) -> bool {
        let mut entries = self.entries.write();
        match entries.binary_search_by(|(k, r)| (k.as_slice(), *r).cmp(&(key, rid))) {
            Ok(ordinal) => {
                entries.remove(ordinal);
                true
            }
            Err(_) => false,
        }
    }

    /// Records whose keys fall in `[lower, upper]`
    pub fn range(&self, lower: &[u8], upper: &[u8]) -> Vec<Rid> {
        self.scan(Bound::Included(lower), Bound::Included(upper))
    }

    /// Records whose keys fall between the given bounds, in key order
    pub fn scan(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> Vec<Rid> {
        let (start, end) = self.resolve_range(lower, upper);
        self.rids_between(&start, &end)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OrderedIndex for KeyIndex {
    fn lower_bound(&self, key: &[u8]) -> Iid {
        Iid::before(key)
    }

    fn upper_bound(&self, key: &[u8]) -> Iid {
        Iid::after(key)
    }

    fn rids_between(&self, start: &Iid, end: &Iid) -> Vec<Rid> {
        let entries = self.entries.read();
        let first = entries.partition_point(|(k, _)| !start.is_at_or_before(k));
        let last = entries.partition_point(|(k, _)| end.is_past(k));
        if first >= last {
            return Vec::new();
        }
        entries[first..last].iter().map(|(_, rid)| *rid).collect()
    }
}
