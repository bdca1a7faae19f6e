//! Restricted double-compare single-swap, after "A Practical Multi-Word Compare-and-Swap
//! Operation" by Harris, Fraser and Pratt.
//!
//! An RDCSS writes a new value to a data address only if the data address holds an expected value
//! *and* a separate control address holds an expected control value, as one atomic step:
//!
//! ```text
//! if *data == expected_data && *control == expected_control {
//!     *data = new_value;
//! }
//! ```
//!
//! It takes two phases. First a descriptor describing the whole operation is CASed into the data
//! address in place of `expected_data`, tagged with [DESCRIPTOR_TAG] so that anyone reading the
//! data address can tell it apart from a plain value. Then the descriptor is resolved: the control
//! address is read once, and the data address is swapped from the descriptor to either
//! `new_value` or back to `expected_data`.
//!
//! Any thread which finds a descriptor at a data address resolves it before carrying on with its
//! own work, so an installer which stalls between the phases never blocks anybody else. Because
//! several threads may resolve the same descriptor, the first one to read the control address
//! records a [Decision] in the descriptor and all the others follow it.
//!
//! # Memory reclamation
//!
//! Descriptors are heap allocated and reclaimed with [crossbeam_epoch]. Every function which may
//! dereference a descriptor takes a [Guard], and all threads touching the same data addresses must
//! pin the same collector (normally the default one through [crate::pin]). The installer retires
//! its descriptor only once the descriptor can no longer be reached from the data address.
//!
//! Data addresses must only ever hold untagged words, and both the control and the data address
//! must stay alive for as long as any thread may be resolving a descriptor which refers to them.
//!
//! [DESCRIPTOR_TAG]: crate::types::DESCRIPTOR_TAG
use crossbeam_epoch::Guard;

use crate::err::{Error, FatalError};
use crate::sync::AtomicUsize;
use crate::tagged::has_tag;
use crate::types::{Word, MAX_TAG};

mod decision;
mod install;
mod resolve;

pub use decision::Decision;
pub use install::Installed;
pub use resolve::{compare_and_swap, help_complete, read};
pub(crate) use resolve::swap_helping;

/// A structure containing all the information needed to perform a single RDCSS operation.
///
/// `expected_data` and `new_value` can be any untagged word, including a thin pointer to a
/// word-aligned allocation. `expected_control` is compared as-is.
#[derive(Debug)]
pub struct Rdcss<'a> {
    control: &'a AtomicUsize,
    expected_control: Word,
    data: &'a AtomicUsize,
    expected_data: Word,
    new_value: Word,
}

impl<'a> Rdcss<'a> {
    pub fn new(
        control: &'a AtomicUsize,
        expected_control: Word,
        data: &'a AtomicUsize,
        expected_data: Word,
        new_value: Word,
    ) -> Self {
        Self {
            control,
            expected_control,
            data,
            expected_data,
            new_value,
        }
    }

    /// Install and immediately resolve this operation.
    pub fn execute(self, guard: &Guard) -> Result<Resolution, Error> {
        let installed: Installed = self.install(guard)?;
        Ok(installed.resolve()?)
    }
}

/// The shared, heap-allocated form of an [Rdcss] which lives at the data address while the
/// operation is in flight.
#[derive(Debug)]
pub(crate) struct Descriptor {
    pub(crate) control: *const AtomicUsize,
    pub(crate) expected_control: Word,
    pub(crate) data: *const AtomicUsize,
    pub(crate) expected_data: Word,
    pub(crate) new_value: Word,

    /// The [Decision] every resolver of this descriptor follows, stored as a usize.
    pub(crate) decision: AtomicUsize,
}

// the tag bits of a descriptor's address must be free
const _: () = assert!(core::mem::align_of::<Descriptor>() > MAX_TAG);

impl<'a> From<&Rdcss<'a>> for Descriptor {
    fn from(rdcss: &Rdcss<'a>) -> Self {
        Self {
            control: rdcss.control,
            expected_control: rdcss.expected_control,
            data: rdcss.data,
            expected_data: rdcss.expected_data,
            new_value: rdcss.new_value,
            decision: AtomicUsize::new(Decision::Undecided as usize),
        }
    }
}

/// How a resolver's attempt to finalize a descriptor turned out.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
    /// This resolver swapped the new value into the data address.
    Committed,
    /// This resolver swapped the expected value back into the data address.
    RolledBack,
    /// Another thread finalized the descriptor first, following `decision`.
    ResolvedByOther { decision: Decision },
}

impl Resolution {
    /// The decision the descriptor was finalized with, whoever finalized it.
    pub fn decision(self) -> Decision {
        match self {
            Resolution::Committed => Decision::Commit,
            Resolution::RolledBack => Decision::RollBack,
            Resolution::ResolvedByOther { decision } => decision,
        }
    }

    /// Whether the new value was written to the data address.
    pub fn succeeded(self) -> bool {
        self.decision() == Decision::Commit
    }
}

/// Whether `word`, read from a data address, is an installed descriptor rather than a value.
#[inline]
pub fn is_descriptor(word: Word) -> bool {
    has_tag(word)
}

/// Perform a single RDCSS operation under `guard`.
///
/// Fails with [Error::ValueWasNotExpectedValue] if the data address held a plain value other
/// than `expected_data`. Descriptors of other operations found at the data address are resolved
/// first.
pub fn try_rdcss(
    control: &AtomicUsize,
    expected_control: Word,
    data: &AtomicUsize,
    expected_data: Word,
    new_value: Word,
    guard: &Guard,
) -> Result<Resolution, Error> {
    Rdcss::new(control, expected_control, data, expected_data, new_value).execute(guard)
}

/// Perform a single RDCSS operation, pinning the default collector.
///
/// Returns true iff `new_value` was written to `data`.
///
/// # Panics
///
/// Panics on a [FatalError], which means something wrote to `data` behind the protocol's back.
#[cfg(feature = "std")]
pub fn rdcss(
    control: &AtomicUsize,
    expected_control: Word,
    data: &AtomicUsize,
    expected_data: Word,
    new_value: Word,
) -> bool {
    let guard: Guard = crossbeam_epoch::pin();
    match try_rdcss(control, expected_control, data, expected_data, new_value, &guard) {
        Ok(resolution) => resolution.succeeded(),
        Err(Error::ValueWasNotExpectedValue { .. }) => false,
        Err(Error::Fatal(fatal_error)) => panic!("{fatal_error}"),
    }
}

/// Reject words which would be mistaken for descriptors.
pub(crate) fn verify_value_is_untagged(value: Word) -> Result<(), FatalError> {
    if has_tag(value) {
        return Err(FatalError::ValueWasTagged { value });
    }
    Ok(())
}
