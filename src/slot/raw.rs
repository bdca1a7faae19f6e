//! Slot operations addressed by raw pointer arithmetic.
//!
//! Nothing here checks bounds. Every function requires that the computed address
//! `buffer + index * element_size` points to a live, properly aligned [AtomicUsize] for the
//! duration of the call, and `guard` must pin the collector used by every RDCSS operation on the
//! store. Prefer [Slots](crate::slot::Slots) wherever the store is owned by Rust code.
use crossbeam_epoch::Guard;

use crate::err::{FatalError, PopError};
use crate::slot::{compare_and_swap_cell, load_cell, pop_cell, store_cell, Base, ElementSize};
use crate::sync::AtomicUsize;
use crate::types::{SlotIndex, Word, EMPTY};

/// Compute the address of slot `index`.
///
/// # Safety
///
/// `base` must satisfy [Base::buffer]. The returned pointer is only meaningful if `index` is
/// within the store.
#[inline]
pub unsafe fn offset(base: Base, index: SlotIndex, element_size: ElementSize) -> *const AtomicUsize {
    let slot: *const u8 = base.buffer().wrapping_add(index * element_size.get());
    debug_assert_eq!(
        slot as usize % core::mem::align_of::<AtomicUsize>(),
        0,
        "slot {index} is not aligned for atomic access"
    );
    slot as *const AtomicUsize
}

/// # Safety
///
/// See the [module documentation](self).
unsafe fn cell<'a>(base: Base, index: SlotIndex, element_size: ElementSize) -> &'a AtomicUsize {
    &*offset(base, index, element_size)
}

/// Atomically read slot `index`.
///
/// # Safety
///
/// See the [module documentation](self).
pub unsafe fn load(
    base: Base,
    index: SlotIndex,
    element_size: ElementSize,
    guard: &Guard,
) -> Result<Word, FatalError> {
    load_cell(cell(base, index, element_size), guard)
}

/// Atomically overwrite slot `index`.
///
/// # Safety
///
/// See the [module documentation](self).
pub unsafe fn store(
    base: Base,
    index: SlotIndex,
    element_size: ElementSize,
    value: Word,
    guard: &Guard,
) -> Result<(), FatalError> {
    store_cell(cell(base, index, element_size), value, guard)
}

/// Swap slot `index` from `expected` to `desired`. True iff the slot held `expected`.
///
/// # Safety
///
/// See the [module documentation](self).
pub unsafe fn compare_and_swap(
    base: Base,
    index: SlotIndex,
    element_size: ElementSize,
    expected: Word,
    desired: Word,
    guard: &Guard,
) -> Result<bool, FatalError> {
    compare_and_swap_cell(cell(base, index, element_size), expected, desired, guard)
}

/// Write `value` into slot `index` only if the slot is empty.
///
/// # Safety
///
/// See the [module documentation](self).
pub unsafe fn set_if_empty(
    base: Base,
    index: SlotIndex,
    element_size: ElementSize,
    value: Word,
    guard: &Guard,
) -> Result<bool, FatalError> {
    compare_and_swap(base, index, element_size, EMPTY, value, guard)
}

/// Empty slot `index` and return what it held.
///
/// # Safety
///
/// See the [module documentation](self).
pub unsafe fn pop_if_present(
    base: Base,
    index: SlotIndex,
    element_size: ElementSize,
    guard: &Guard,
) -> Result<Word, PopError> {
    pop_cell(cell(base, index, element_size), guard)
}

#[cfg(all(test, feature = "std", not(feature = "shuttle"), not(loom)))]
mod tests {
    use crate::err::PopError;
    use crate::slot::raw::{compare_and_swap, load, offset, pop_if_present, set_if_empty, store};
    use crate::slot::{Base, ElementSize};
    use crate::sync::{AtomicUsize, Ordering};
    use crate::types::{Word, EMPTY};
    use crossbeam_epoch::Guard;
    use test_log::test;

    struct Sample {
        value: usize,
    }

    #[test]
    fn test_array_slot_set_and_pop() {
        let nodes: [AtomicUsize; 16] = core::array::from_fn(|_| AtomicUsize::new(EMPTY));
        let base: Base = Base::Array(nodes.as_ptr());
        let sample: Box<Sample> = Box::new(Sample { value: 8 });
        let ptr: Word = Box::into_raw(sample) as Word;
        let guard: Guard = crossbeam_epoch::pin();

        unsafe {
            assert_eq!(set_if_empty(base, 6, ElementSize::WORD, ptr, &guard), Ok(true));
            // occupied now
            assert_eq!(set_if_empty(base, 6, ElementSize::WORD, 16, &guard), Ok(false));
            assert_eq!(load(base, 6, ElementSize::WORD, &guard), Ok(ptr));

            assert_eq!(pop_if_present(base, 6, ElementSize::WORD, &guard), Ok(ptr));
            assert_eq!(
                pop_if_present(base, 6, ElementSize::WORD, &guard),
                Err(PopError::Empty)
            );
        }
        assert_eq!(nodes[6].load(Ordering::Acquire), EMPTY);

        let sample: Box<Sample> = unsafe { Box::from_raw(ptr as *mut Sample) };
        assert_eq!(sample.value, 8);
    }

    #[test]
    fn test_slice_slot_goes_through_the_header() {
        let first: Box<[AtomicUsize]> = (0..4).map(|_| AtomicUsize::new(EMPTY)).collect();
        let second: Box<[AtomicUsize]> = (0..4).map(|_| AtomicUsize::new(EMPTY)).collect();
        let guard: Guard = crossbeam_epoch::pin();

        let mut header: *const AtomicUsize = first.as_ptr();
        let base: Base = Base::Slice(&header);
        unsafe {
            assert_eq!(set_if_empty(base, 0, ElementSize::WORD, 8, &guard), Ok(true));
        }
        assert_eq!(first[0].load(Ordering::Acquire), 8);

        // the same base now resolves to the other buffer
        header = second.as_ptr();
        let base: Base = Base::Slice(&header);
        unsafe {
            assert_eq!(offset(base, 3, ElementSize::WORD), &second[3] as *const AtomicUsize);
            assert_eq!(set_if_empty(base, 0, ElementSize::WORD, 16, &guard), Ok(true));
            assert_eq!(compare_and_swap(base, 0, ElementSize::WORD, 16, 24, &guard), Ok(true));
            assert_eq!(compare_and_swap(base, 0, ElementSize::WORD, 16, 32, &guard), Ok(false));
            assert_eq!(store(base, 1, ElementSize::WORD, 40, &guard), Ok(()));
            assert_eq!(pop_if_present(base, 0, ElementSize::WORD, &guard), Ok(24));
        }
        assert_eq!(first[0].load(Ordering::Acquire), 8);
        assert_eq!(second[1].load(Ordering::Acquire), 40);
    }

    #[test]
    fn test_wider_element_size() {
        #[repr(C)]
        struct Entry {
            key: AtomicUsize,
            _padding: usize,
        }

        let entries: [Entry; 4] = core::array::from_fn(|i| Entry {
            key: AtomicUsize::new(i * 8),
            _padding: 0,
        });
        let element_size: ElementSize = ElementSize::new(core::mem::size_of::<Entry>());
        let base: Base = Base::Array(&entries[0].key);
        let guard: Guard = crossbeam_epoch::pin();

        unsafe {
            assert_eq!(load(base, 2, element_size, &guard), Ok(16));
            assert_eq!(pop_if_present(base, 3, element_size, &guard), Ok(24));
        }
        assert_eq!(entries[3].key.load(Ordering::Acquire), EMPTY);
    }
}
