//! Word aliases and the platform constants the tagging scheme is derived from.

/// The unit stored in every cell this crate operates on. A word holds either a plain value, a
/// thin pointer, or a tagged pointer to an in-flight descriptor.
pub type Word = usize;

/// A small integer stored in the low-order bits of an aligned address. Always at most [MAX_TAG].
pub type Tag = usize;

/// An index into a contiguous store of cells.
pub type SlotIndex = usize;

/// The width of a machine address in bits. 64 on 64-bit targets, 32 on 32-bit targets.
pub const ADDRESS_SIZE: usize = usize::BITS as usize;

/// The width of a machine word in bytes.
pub const WORD_SIZE: usize = ADDRESS_SIZE >> 3;

/// The size of a thin pointer in bytes.
pub const POINTER_SIZE: usize = core::mem::size_of::<*const ()>();

/// The largest tag which fits into the low-order bits of a word-aligned address.
///
/// Allocations are aligned to at least [WORD_SIZE], so the bottom `log2(WORD_SIZE)` bits of any
/// such address are zero and free to carry a tag. On 64-bit targets this is 7.
pub const MAX_TAG: Tag = WORD_SIZE - 1;

/// A mask which clears the tag bits of a word, leaving only the address.
pub const PTR_MASK: Word = !MAX_TAG;

/// The tag attached to the address of an installed RDCSS descriptor.
pub const DESCRIPTOR_TAG: Tag = 1;

/// The word an unoccupied slot holds: the null address.
pub const EMPTY: Word = 0;

#[cfg(test)]
mod tests {
    use super::{ADDRESS_SIZE, DESCRIPTOR_TAG, MAX_TAG, POINTER_SIZE, PTR_MASK, WORD_SIZE};
    use test_log::test;
    use tracing::debug;

    #[test]
    fn test_constants_are_consistent() {
        debug!("address size {ADDRESS_SIZE}, word size {WORD_SIZE}, max tag {MAX_TAG}");
        assert_eq!(WORD_SIZE * 8, ADDRESS_SIZE);
        assert_eq!(POINTER_SIZE, WORD_SIZE);
        assert_eq!(MAX_TAG & PTR_MASK, 0);
        assert_eq!(MAX_TAG | PTR_MASK, usize::MAX);
        assert!(DESCRIPTOR_TAG <= MAX_TAG);
        assert!(core::mem::align_of::<usize>() > MAX_TAG);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_64_bit_constants() {
        assert_eq!(ADDRESS_SIZE, 64);
        assert_eq!(WORD_SIZE, 8);
        assert_eq!(MAX_TAG, 7);
    }
}
