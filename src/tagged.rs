//! Pointer tagging: small integers stored in the low-order bits of word-aligned addresses.
//!
//! Every allocation on the supported platforms is aligned to at least [WORD_SIZE] bytes, so the
//! bottom `log2(WORD_SIZE)` bits of an address are always zero. Those bits can carry a tag of at
//! most [MAX_TAG] without losing any information about the address. The RDCSS engine relies on
//! this to tell an installed descriptor apart from a plain value.
//!
//! [WORD_SIZE]: crate::types::WORD_SIZE
use core::fmt::{Debug, Formatter};
use core::marker::PhantomData;

use crate::err::TagError;
use crate::sync::{AtomicUsize, Ordering};
use crate::types::{Tag, Word, MAX_TAG, PTR_MASK};

use tracing::{instrument, trace};

/// Return the tag stored in the low-order bits of `ptr`.
#[inline]
pub fn get_tag(ptr: Word) -> Tag {
    ptr & MAX_TAG
}

/// Attach `tag` to `ptr`.
///
/// # Panics
///
/// Panics if `tag` is greater than [MAX_TAG]. Such a tag would overwrite address bits, which means
/// the caller's assumptions about alignment are wrong; there is nothing sensible to recover.
#[inline]
pub fn tag(ptr: Word, tag: Tag) -> Word {
    match try_tag(ptr, tag) {
        Ok(tagged) => tagged,
        Err(error) => panic!("{error}"),
    }
}

/// Attach `tag` to `ptr`, or return an error if `tag` is greater than [MAX_TAG].
#[inline]
pub fn try_tag(ptr: Word, tag: Tag) -> Result<Word, TagError> {
    if tag > MAX_TAG {
        return Err(TagError::TagOutOfRange {
            tag,
            max_tag: MAX_TAG,
        });
    }
    Ok(ptr | tag)
}

/// Clear the tag bits of `ptr`, leaving the bare address.
#[inline]
pub fn untag(ptr: Word) -> Word {
    ptr & PTR_MASK
}

/// Whether any tag bits of `ptr` are set.
#[inline]
pub fn has_tag(ptr: Word) -> bool {
    get_tag(ptr) & MAX_TAG > 0
}

/// Atomically change the tag of the address held in `cell` from `old_tag` to `new_tag`.
///
/// `current` is the word the caller last observed in `cell`; only its address bits are used. On
/// success the newly tagged word is returned. On failure the word actually found in `cell` is
/// returned, which happens when either the address or the tag changed concurrently.
///
/// # Panics
///
/// Panics if either tag is greater than [MAX_TAG].
#[instrument(level = "trace")]
pub fn compare_and_swap_tag(
    cell: &AtomicUsize,
    current: Word,
    old_tag: Tag,
    new_tag: Tag,
) -> Result<Word, Word> {
    let address: Word = untag(current);
    let expected: Word = tag(address, old_tag);
    let desired: Word = tag(address, new_tag);

    trace!("CAS tag of {address:#x} from {old_tag} to {new_tag}");
    cell.compare_exchange(expected, desired, Ordering::AcqRel, Ordering::Acquire)
        .map(|_| desired)
}

/// A thin pointer to `T` which may carry a tag in its low-order bits.
///
/// This is a plain value; it neither owns nor borrows the pointee.
pub struct TaggedPtr<T> {
    data: Word,
    _marker: PhantomData<*mut T>,
}

impl<T> TaggedPtr<T> {
    /// Wrap an untagged pointer.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` already has tag bits set, which means it is not aligned to a word.
    pub fn new(ptr: *mut T) -> Self {
        let data: Word = ptr as Word;
        assert!(!has_tag(data), "pointer {data:#x} is not aligned to a word");
        Self::from_usize(data)
    }

    /// Reinterpret a word, tag bits included, as a tagged pointer.
    pub fn from_usize(data: Word) -> Self {
        Self {
            data,
            _marker: PhantomData,
        }
    }

    /// The underlying word, tag bits included.
    pub fn into_usize(self) -> Word {
        self.data
    }

    /// Return the same address carrying `tag` instead of its current tag.
    ///
    /// # Panics
    ///
    /// Panics if `tag` is greater than [MAX_TAG].
    pub fn with_tag(self, tag: Tag) -> Self {
        Self::from_usize(self::tag(untag(self.data), tag))
    }

    /// The tag currently carried.
    pub fn tag(self) -> Tag {
        get_tag(self.data)
    }

    /// Whether any tag bits are set.
    pub fn is_tagged(self) -> bool {
        has_tag(self.data)
    }

    /// The address with its tag removed.
    pub fn as_raw(self) -> *mut T {
        untag(self.data) as *mut T
    }
}

impl<T> Clone for TaggedPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TaggedPtr<T> {}

impl<T> PartialEq for TaggedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl<T> Eq for TaggedPtr<T> {}

impl<T> Debug for TaggedPtr<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaggedPtr")
            .field("raw", &self.as_raw())
            .field("tag", &self.tag())
            .finish()
    }
}
