use crate::types::{SlotIndex, Tag, Word};
use displaydoc::Display;

/// Any error which can occur during an RDCSS operation.
#[derive(Debug, Display, Eq, PartialEq)]
pub enum Error {
    /// An unrecoverable error occurred and the descriptor may still be installed: {0}
    Fatal(FatalError),
    /// The value at the data address was {actual} rather than the expected value.
    ValueWasNotExpectedValue { actual: Word },
}

impl From<FatalError> for Error {
    fn from(fatal_error: FatalError) -> Self {
        Error::Fatal(fatal_error)
    }
}

/// An unrecoverable error. Each variant means an invariant of the protocol was broken, usually by
/// something writing to a data address without going through this crate.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum FatalError {
    /// Tried to deserialize a number as a decision, but it does not correlate to a valid decision: {0}
    DecisionOutOfBounds(usize),

    /// A descriptor's decision read back as Undecided after it had been decided.
    DecisionLost,

    /** The value {value} has tag bits set. Tagged words are reserved for in-flight descriptors and
        cannot be stored at a data address.
    */
    ValueWasTagged { value: Word },
}

impl From<DecisionOutOfBoundsError> for FatalError {
    fn from(decision_out_of_bounds_error: DecisionOutOfBoundsError) -> Self {
        FatalError::DecisionOutOfBounds(decision_out_of_bounds_error.0)
    }
}

/// Attempted to convert a usize into a Decision but it was out of bounds: {0}
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub struct DecisionOutOfBoundsError(pub usize);

/// An error produced while tagging an address.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum TagError {
    /// Tag {tag} does not fit into the low-order bits of an address; the largest tag is {max_tag}.
    TagOutOfRange { tag: Tag, max_tag: Tag },
}

/// An error produced while addressing a slot.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum SlotError {
    /// Index {index} is out of bounds for a store of {len} slots.
    IndexOutOfBounds { index: SlotIndex, len: usize },
    /// The element size of a slot cannot be zero.
    ZeroElementSize,
    /// Could not resolve a descriptor installed in the slot: {0}
    Fatal(FatalError),
}

impl From<FatalError> for SlotError {
    fn from(fatal_error: FatalError) -> Self {
        SlotError::Fatal(fatal_error)
    }
}

/// The reason popping a slot did not yield a value.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum PopError {
    /// The slot was empty.
    Empty,
    /// A concurrent writer changed the slot to {actual} before it could be emptied.
    Contended { actual: Word },
    /// {0}
    Slot(SlotError),
}

impl From<SlotError> for PopError {
    fn from(slot_error: SlotError) -> Self {
        PopError::Slot(slot_error)
    }
}

impl From<FatalError> for PopError {
    fn from(fatal_error: FatalError) -> Self {
        PopError::Slot(SlotError::Fatal(fatal_error))
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for FatalError {}

#[cfg(feature = "std")]
impl std::error::Error for DecisionOutOfBoundsError {}

#[cfg(feature = "std")]
impl std::error::Error for TagError {}

#[cfg(feature = "std")]
impl std::error::Error for SlotError {}

#[cfg(feature = "std")]
impl std::error::Error for PopError {}
