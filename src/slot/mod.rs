//! Atomic operations on the elements of contiguous stores.
//!
//! [raw] addresses a slot by `(base, index, element size)` arithmetic, the way a caller holding
//! nothing but an address would. [Slots] is a fixed-size store which performs the same operations
//! behind a bounds check. Both share the single-cell operations in this module, so they agree on
//! what "empty" means and on how a pop linearizes.
//!
//! Any slot may double as an RDCSS data address. Every operation here takes a [Guard] and finishes
//! an RDCSS descriptor it finds in the slot before acting, so slot values are always plain words.
use core::num::NonZeroUsize;

use crossbeam_epoch::Guard;
use tracing::{instrument, trace};

use crate::err::{Error, FatalError, PopError, SlotError};
use crate::rdcss::{compare_and_swap, read, swap_helping, verify_value_is_untagged};
use crate::sync::{AtomicUsize, Ordering};
use crate::types::{Word, EMPTY};

pub mod raw;
mod store;

pub use store::Slots;

/// The distance in bytes between two consecutive slots of a store. Never zero.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ElementSize(NonZeroUsize);

impl ElementSize {
    /// The stride of a store of atomic words.
    pub const WORD: ElementSize = ElementSize::new(core::mem::size_of::<AtomicUsize>());

    /// # Panics
    ///
    /// Panics if `size` is zero. A zero stride makes every index alias slot 0, which is a
    /// configuration mistake rather than a runtime condition.
    pub const fn new(size: usize) -> Self {
        match NonZeroUsize::new(size) {
            Some(size) => ElementSize(size),
            None => panic!("the element size of a slot cannot be zero"),
        }
    }

    pub fn try_new(size: usize) -> Result<Self, SlotError> {
        NonZeroUsize::new(size)
            .map(ElementSize)
            .ok_or(SlotError::ZeroElementSize)
    }

    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for ElementSize {
    fn default() -> Self {
        Self::WORD
    }
}

/// Where the buffer of a contiguous store begins.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Base {
    /// The address of the first slot.
    Array(*const AtomicUsize),
    /// The address of a word which holds the address of the first slot. The buffer can be
    /// replaced independently of whoever holds the base.
    Slice(*const *const AtomicUsize),
}

impl Base {
    /// Resolve the address of the first slot.
    ///
    /// # Safety
    ///
    /// For [Base::Slice], the base must point to a readable, initialized buffer address.
    pub(crate) unsafe fn buffer(self) -> *const u8 {
        match self {
            Base::Array(buffer) => buffer as *const u8,
            Base::Slice(header) => *header as *const u8,
        }
    }
}

/// Read `cell`, finishing any RDCSS operation in flight there first.
#[inline]
pub(crate) fn load_cell(cell: &AtomicUsize, guard: &Guard) -> Result<Word, FatalError> {
    read(cell, guard)
}

/// Overwrite `cell` with `value`.
///
/// A descriptor in the cell is resolved before it is overwritten, so its installer never finds its
/// operation silently discarded.
#[instrument(level = "trace", skip(guard))]
pub(crate) fn store_cell(cell: &AtomicUsize, value: Word, guard: &Guard) -> Result<(), FatalError> {
    verify_value_is_untagged(value)?;
    let mut current: Word = read(cell, guard)?;
    loop {
        match swap_helping(cell, current, value, guard) {
            Ok(()) => return Ok(()),
            Err(Error::ValueWasNotExpectedValue { actual }) => {
                trace!("cell changed to {actual} before the store; retrying");
                current = actual;
            }
            Err(Error::Fatal(fatal_error)) => return Err(fatal_error),
        }
    }
}

/// Swap `cell` from `expected` to `desired`, resolving any descriptor found in the way. `Ok(true)`
/// iff the cell held `expected`.
pub(crate) fn compare_and_swap_cell(
    cell: &AtomicUsize,
    expected: Word,
    desired: Word,
    guard: &Guard,
) -> Result<bool, FatalError> {
    match compare_and_swap(cell, expected, desired, guard) {
        Ok(()) => Ok(true),
        Err(Error::ValueWasNotExpectedValue { .. }) => Ok(false),
        Err(Error::Fatal(fatal_error)) => Err(fatal_error),
    }
}

/// Empty `cell` and return what it held.
///
/// The value is only returned if the CAS which empties the cell succeeds, so two concurrent pops
/// of the same occupant can never both succeed. A descriptor is never handed out as a value.
#[instrument(level = "trace", skip(guard))]
pub(crate) fn pop_cell(cell: &AtomicUsize, guard: &Guard) -> Result<Word, PopError> {
    let current: Word = read(cell, guard)?;
    if current == EMPTY {
        trace!("cell was empty");
        return Err(PopError::Empty);
    }
    take_cell(cell, current, guard)
}

/// Empty `cell` if it still holds `current`, which was read from it earlier.
fn take_cell(cell: &AtomicUsize, current: Word, guard: &Guard) -> Result<Word, PopError> {
    match cell.compare_exchange(current, EMPTY, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => Ok(current),
        Err(_) => {
            // whatever replaced `current` may itself be in flight
            let actual: Word = read(cell, guard)?;
            trace!("cell changed from {current} to {actual} before it could be popped");
            Err(PopError::Contended { actual })
        }
    }
}

#[cfg(all(test, feature = "std", not(feature = "shuttle"), not(loom)))]
mod tests {
    use crate::err::{FatalError, PopError, SlotError};
    use crate::rdcss::{Installed, Rdcss};
    use crate::slot::{load_cell, pop_cell, store_cell, take_cell, ElementSize};
    use crate::sync::{AtomicUsize, Ordering};
    use crate::types::{Word, EMPTY, WORD_SIZE};
    use crossbeam_epoch::Guard;
    use std::sync::Barrier;
    use std::thread;
    use test_log::test;

    #[test]
    fn test_element_size() {
        assert_eq!(ElementSize::WORD.get(), WORD_SIZE);
        assert_eq!(ElementSize::default(), ElementSize::WORD);
        assert_eq!(ElementSize::try_new(0), Err(SlotError::ZeroElementSize));
        assert_eq!(ElementSize::try_new(16).map(ElementSize::get), Ok(16));
    }

    #[test]
    #[should_panic]
    fn test_zero_element_size_panics() {
        ElementSize::new(0);
    }

    #[test]
    fn test_pop_cell() {
        let cell: AtomicUsize = AtomicUsize::new(64);
        let guard: Guard = crossbeam_epoch::pin();
        assert_eq!(pop_cell(&cell, &guard), Ok(64));
        assert_eq!(pop_cell(&cell, &guard), Err(PopError::Empty));
    }

    #[test]
    fn test_pop_reports_a_writer_between_load_and_cas() {
        let cell: AtomicUsize = AtomicUsize::new(8);
        let guard: Guard = crossbeam_epoch::pin();

        let current: Word = load_cell(&cell, &guard).unwrap();
        // another writer gets in before the emptying CAS
        store_cell(&cell, 16, &guard).unwrap();

        assert_eq!(
            take_cell(&cell, current, &guard),
            Err(PopError::Contended { actual: 16 })
        );
        assert_eq!(cell.load(Ordering::Acquire), 16);
    }

    #[test]
    fn test_store_resolves_before_overwriting() {
        let control: AtomicUsize = AtomicUsize::new(16);
        let cell: AtomicUsize = AtomicUsize::new(8);
        let guard: Guard = crossbeam_epoch::pin();

        let installed: Installed = Rdcss::new(&control, 16, &cell, 8, 24)
            .install(&guard)
            .unwrap();

        assert_eq!(store_cell(&cell, 32, &guard), Ok(()));
        assert_eq!(cell.load(Ordering::Acquire), 32);
        assert!(installed.resolve().unwrap().succeeded());
        assert_eq!(
            store_cell(&cell, 33, &guard),
            Err(FatalError::ValueWasTagged { value: 33 })
        );
    }

    #[test]
    fn test_concurrent_pops_succeed_at_most_once() {
        const NUM_THREADS: usize = 8;

        for round in 1..=200usize {
            let cell: AtomicUsize = AtomicUsize::new(round * 8);
            let barrier: Barrier = Barrier::new(NUM_THREADS);

            let successes: usize = thread::scope(|scope| {
                let handles: Vec<_> = (0..NUM_THREADS)
                    .map(|_| {
                        scope.spawn(|| {
                            let guard: Guard = crossbeam_epoch::pin();
                            barrier.wait();
                            pop_cell(&cell, &guard)
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| handle.join().expect("A thread panicked"))
                    .filter(|result| match result {
                        Ok(value) => {
                            assert_eq!(*value, round * 8);
                            true
                        }
                        Err(PopError::Empty) | Err(PopError::Contended { actual: EMPTY }) => false,
                        Err(error) => panic!("unexpected pop error: {error}"),
                    })
                    .count()
            });
            assert_eq!(successes, 1);
        }
    }
}
