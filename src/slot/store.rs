use alloc::boxed::Box;
use alloc::vec::Vec;

use crossbeam_epoch::Guard;

use crate::err::{PopError, SlotError};
use crate::slot::{compare_and_swap_cell, load_cell, pop_cell, store_cell, Base};
use crate::sync::AtomicUsize;
use crate::types::{SlotIndex, Word, EMPTY};

/// A fixed-size store of atomic words with bounds-checked slot operations.
///
/// Every slot starts out [EMPTY]. Individual slots can also be handed to the RDCSS engine through
/// [Slots::cell]; the slot operations finish any RDCSS operation in flight in a slot before acting
/// on it.
#[derive(Debug)]
pub struct Slots {
    cells: Box<[AtomicUsize]>,
}

impl Slots {
    pub fn new(len: usize) -> Self {
        let cells: Vec<AtomicUsize> = (0..len).map(|_| AtomicUsize::new(EMPTY)).collect();
        Self {
            cells: cells.into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Borrow the atomic cell backing slot `index`.
    pub fn cell(&self, index: SlotIndex) -> Result<&AtomicUsize, SlotError> {
        self.cells.get(index).ok_or(SlotError::IndexOutOfBounds {
            index,
            len: self.cells.len(),
        })
    }

    /// The base of this store, for use with [crate::slot::raw] and [crate::slot::ElementSize::WORD].
    pub fn base(&self) -> Base {
        Base::Array(self.cells.as_ptr())
    }

    pub fn load(&self, index: SlotIndex, guard: &Guard) -> Result<Word, SlotError> {
        Ok(load_cell(self.cell(index)?, guard)?)
    }

    pub fn store(&self, index: SlotIndex, value: Word, guard: &Guard) -> Result<(), SlotError> {
        Ok(store_cell(self.cell(index)?, value, guard)?)
    }

    /// Swap slot `index` from `expected` to `desired`. `Ok(true)` iff the slot held `expected`.
    pub fn compare_and_swap(
        &self,
        index: SlotIndex,
        expected: Word,
        desired: Word,
        guard: &Guard,
    ) -> Result<bool, SlotError> {
        Ok(compare_and_swap_cell(self.cell(index)?, expected, desired, guard)?)
    }

    pub fn set_if_empty(&self, index: SlotIndex, value: Word, guard: &Guard) -> Result<bool, SlotError> {
        self.compare_and_swap(index, EMPTY, value, guard)
    }

    pub fn pop_if_present(&self, index: SlotIndex, guard: &Guard) -> Result<Word, PopError> {
        pop_cell(self.cell(index)?, guard)
    }
}
