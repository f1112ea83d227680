use parking_lot::RwLock;

use crate::common::types::{Rid, TableId};
use crate::storage::error::StorageError;
use crate::storage::{RecordStore, Result};

/// Shape of a table file
#[derive(Debug, Clone, Copy)]
pub struct TableHeapConfig {
    /// Size in bytes of every row
    pub record_size: usize,
    /// Slots per page
    pub records_per_page: usize,
}

impl Default for TableHeapConfig {
    fn default() -> Self {
        Self {
            record_size: 16,
            records_per_page: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    /// Claimed by an insert that has not written its row yet
    Reserved,
    Used,
}

#[derive(Debug)]
struct HeapPage {
    slots: Vec<SlotState>,
    data: Vec<u8>,
    num_records: usize,
}

impl HeapPage {
    fn new(config: &TableHeapConfig) -> Self {
        Self {
            slots: vec![SlotState::Free; config.records_per_page],
            data: vec![0; config.record_size * config.records_per_page],
            num_records: 0,
        }
    }

    fn is_used(&self, slot: usize) -> bool {
        self.slots[slot] == SlotState::Used
    }

    fn slot_range(slot: usize, record_size: usize) -> std::ops::Range<usize> {
        slot * record_size..(slot + 1) * record_size
    }
}

/// Fixed-size-slot table file kept in memory
#[derive(Debug)]
pub struct TableHeap {
    table_id: TableId,
    config: TableHeapConfig,
    pages: RwLock<Vec<HeapPage>>,
}

impl TableHeap {
    pub fn new(table_id: TableId, config: TableHeapConfig) -> Self {
        Self {
            table_id,
            config,
            pages: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> TableHeapConfig {
        self.config
    }

    pub fn num_pages(&self) -> usize {
        self.pages.read().len()
    }

    pub fn num_records(&self) -> usize {
        self.pages.read().iter().map(|page| page.num_records).sum()
    }

    fn check_size(&self, buf: &[u8]) -> Result<()> {
        if buf.len() != self.config.record_size {
            return Err(StorageError::RecordSizeMismatch {
                expected: self.config.record_size,
                actual: buf.len(),
            });
        }
        Ok(())
    }

    fn check_slot(&self, rid: Rid) -> Result<()> {
        if rid.slot_no as usize >= self.config.records_per_page {
            return Err(StorageError::RecordNotFound(rid));
        }
        Ok(())
    }

    fn write_slot(&self, page: &mut HeapPage, slot: usize, buf: &[u8]) {
        page.data[HeapPage::slot_range(slot, self.config.record_size)].copy_from_slice(buf);
    }

    /// First free slot not rejected by `skip`, appending a page if none is left
    fn claim(&self, pages: &mut Vec<HeapPage>, skip: &dyn Fn(Rid) -> bool) -> (usize, usize) {
        let free = pages.iter().enumerate().find_map(|(page_no, page)| {
            page.slots
                .iter()
                .enumerate()
                .find(|(slot, state)| {
                    **state == SlotState::Free && !skip(Rid::new(page_no as u32, *slot as u32))
                })
                .map(|(slot, _)| (page_no, slot))
        });
        free.unwrap_or_else(|| {
            pages.push(HeapPage::new(&self.config));
            (pages.len() - 1, 0)
        })
    }
}

impl RecordStore for TableHeap {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn get(&self, rid: Rid) -> Result<Vec<u8>> {
        self.check_slot(rid)?;
        let pages = self.pages.read();
        let page = pages
            .get(rid.page_no as usize)
            .filter(|page| page.is_used(rid.slot_no as usize))
            .ok_or(StorageError::RecordNotFound(rid))?;
        Ok(page.data[HeapPage::slot_range(rid.slot_no as usize, self.config.record_size)].to_vec())
    }

    fn insert(&self, buf: &[u8]) -> Result<Rid> {
        self.check_size(buf)?;
        let mut pages = self.pages.write();
        let (page_no, slot) = self.claim(&mut pages, &|_| false);

        let page = &mut pages[page_no];
        self.write_slot(page, slot, buf);
        page.slots[slot] = SlotState::Used;
        page.num_records += 1;
        Ok(Rid::new(page_no as u32, slot as u32))
    }

    fn reserve(&self, skip: &dyn Fn(Rid) -> bool) -> Result<Rid> {
        let mut pages = self.pages.write();
        let (page_no, slot) = self.claim(&mut pages, skip);
        pages[page_no].slots[slot] = SlotState::Reserved;
        Ok(Rid::new(page_no as u32, slot as u32))
    }

    fn cancel_reservation(&self, rid: Rid) {
        let mut pages = self.pages.write();
        if let Some(state) = pages
            .get_mut(rid.page_no as usize)
            .and_then(|page| page.slots.get_mut(rid.slot_no as usize))
        {
            if *state == SlotState::Reserved {
                *state = SlotState::Free;
            }
        }
    }

    fn insert_at(&self, rid: Rid, buf: &[u8]) -> Result<()> {
        self.check_size(buf)?;
        self.check_slot(rid)?;
        let mut pages = self.pages.write();
        while pages.len() <= rid.page_no as usize {
            pages.push(HeapPage::new(&self.config));
        }

        let page = &mut pages[rid.page_no as usize];
        let slot = rid.slot_no as usize;
        if page.is_used(slot) {
            return Err(StorageError::SlotOccupied(rid));
        }
        self.write_slot(page, slot, buf);
        page.slots[slot] = SlotState::Used;
        page.num_records += 1;
        Ok(())
    }

    fn delete(&self, rid: Rid) -> Result<()> {
        self.check_slot(rid)?;
        let mut pages = self.pages.write();
        let page = pages
            .get_mut(rid.page_no as usize)
            .filter(|page| page.is_used(rid.slot_no as usize))
            .ok_or(StorageError::RecordNotFound(rid))?;
        page.slots[rid.slot_no as usize] = SlotState::Free;
        page.num_records -= 1;
        Ok(())
    }

    fn update(&self, rid: Rid, buf: &[u8]) -> Result<()> {
        self.check_size(buf)?;
        self.check_slot(rid)?;
        let mut pages = self.pages.write();
        let page = pages
            .get_mut(rid.page_no as usize)
            .filter(|page| page.is_used(rid.slot_no as usize))
            .ok_or(StorageError::RecordNotFound(rid))?;
        page.data[HeapPage::slot_range(rid.slot_no as usize, self.config.record_size)].copy_from_slice(buf);
        Ok(())
    }

    fn scan(&self) -> Vec<Rid> {
        let pages = self.pages.read();
        pages
            .iter()
            .enumerate()
            .flat_map(|(page_no, page)| {
                page.slots
                    .iter()
                    .enumerate()
                    .filter(|(_, state)| **state == SlotState::Used)
                    .map(move |(slot, _)| Rid::new(page_no as u32, slot as u32))
            })
            .collect()
    }
}
