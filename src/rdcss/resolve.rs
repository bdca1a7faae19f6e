use crossbeam_epoch::Guard;
use tracing::{instrument, trace};

use crate::err::{Error, FatalError};
use crate::rdcss::{is_descriptor, verify_value_is_untagged, Decision, Descriptor, Resolution};
use crate::sync::{AtomicUsize, Ordering};
use crate::tagged::untag;
use crate::types::Word;

/// Make sure `descriptor` has a [Decision], reading the control address if nobody has yet.
///
/// Whoever moves the decision away from [Decision::Undecided] first wins, so every resolver of
/// the same descriptor ends up following the same decision.
#[instrument(level = "trace")]
fn decide(descriptor: &Descriptor) -> Result<Decision, FatalError> {
    let current: Decision = Decision::try_from(descriptor.decision.load(Ordering::Acquire))?;
    if current != Decision::Undecided {
        trace!("already decided: {current}");
        return Ok(current);
    }

    // the control address outlives every descriptor which refers to it
    let control: &AtomicUsize = unsafe { &*descriptor.control };
    let actual_control: Word = control.load(Ordering::SeqCst);
    let proposed: Decision = if actual_control == descriptor.expected_control {
        Decision::Commit
    } else {
        Decision::RollBack
    };
    trace!(
        "control is {actual_control}, expected {}; proposing {proposed}",
        descriptor.expected_control
    );

    match descriptor.decision.compare_exchange(
        Decision::Undecided as usize,
        proposed as usize,
        Ordering::AcqRel,
        Ordering::Acquire,
    ) {
        Ok(_) => Ok(proposed),
        Err(actual) => {
            let decided: Decision = Decision::try_from(actual)?;
            trace!("another resolver decided {decided} first");
            Ok(decided)
        }
    }
}

/// Finalize `descriptor`, which was installed at its data address as `tagged`.
///
/// Exactly one resolver's CAS moves the data address off `tagged`; every other resolver reports
/// [Resolution::ResolvedByOther]. The data address only ever leaves `tagged` through this CAS and
/// the decision is written once, so a failed CAS always means another resolver finalized the
/// descriptor with the same decision.
#[instrument(level = "trace", skip(descriptor))]
pub(super) fn complete(descriptor: &Descriptor, tagged: Word) -> Result<Resolution, FatalError> {
    let decision: Decision = decide(descriptor)?;
    let (replacement, resolution): (Word, Resolution) = match decision {
        Decision::Commit => (descriptor.new_value, Resolution::Committed),
        Decision::RollBack => (descriptor.expected_data, Resolution::RolledBack),
        Decision::Undecided => return Err(FatalError::DecisionLost),
    };

    // the data address outlives every descriptor installed in it
    let data: &AtomicUsize = unsafe { &*descriptor.data };
    trace!("CAS data from {tagged:#x} to {replacement}");
    match data.compare_exchange(tagged, replacement, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => Ok(resolution),
        Err(actual) => {
            trace!("data was already {actual}; another resolver got there first");
            Ok(Resolution::ResolvedByOther { decision })
        }
    }
}

/// Resolve a descriptor installed by some other operation.
///
/// # Safety
///
/// `tagged` must have been loaded from a data address while `guard` was pinned, and the
/// descriptor's installer must pin the same collector. Otherwise the descriptor may already have
/// been freed.
#[instrument(level = "trace", skip(_guard))]
pub unsafe fn help_complete(tagged: Word, _guard: &Guard) -> Result<Resolution, FatalError> {
    let descriptor: &Descriptor = &*(untag(tagged) as *const Descriptor);
    complete(descriptor, tagged)
}

/// CAS `data` from `expected` to `desired`, resolving any descriptor found in the way.
///
/// Fails only if `data` holds a plain value other than `expected`.
#[instrument(level = "trace", skip(guard))]
pub(crate) fn swap_helping(
    data: &AtomicUsize,
    expected: Word,
    desired: Word,
    guard: &Guard,
) -> Result<(), Error> {
    loop {
        match data.compare_exchange(expected, desired, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return Ok(()),
            Err(actual) if is_descriptor(actual) => {
                trace!("found descriptor {actual:#x}; helping it before retrying");
                // loaded from `data` while pinned
                unsafe { help_complete(actual, guard) }?;
            }
            Err(actual) => return Err(Error::ValueWasNotExpectedValue { actual }),
        }
    }
}

/// Read the value at a data address, resolving any descriptor found there first.
#[instrument(level = "trace", skip(guard))]
pub fn read(data: &AtomicUsize, guard: &Guard) -> Result<Word, FatalError> {
    loop {
        let current: Word = data.load(Ordering::SeqCst);
        if !is_descriptor(current) {
            return Ok(current);
        }
        trace!("found descriptor {current:#x}; helping it before reading again");
        // loaded from `data` while pinned
        unsafe { help_complete(current, guard) }?;
    }
}

/// A single-word CAS on a data address which cooperates with in-flight RDCSS operations.
///
/// Plain `compare_exchange` on a data address would fail forever against a descriptor whose
/// installer stalled; this resolves such descriptors and retries.
pub fn compare_and_swap(
    data: &AtomicUsize,
    expected: Word,
    desired: Word,
    guard: &Guard,
) -> Result<(), Error> {
    verify_value_is_untagged(expected)?;
    verify_value_is_untagged(desired)?;
    swap_helping(data, expected, desired, guard)
}
