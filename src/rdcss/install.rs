use alloc::boxed::Box;
use core::ptr::NonNull;

use crossbeam_epoch::{Guard, Shared};
use tracing::{error, instrument, trace};

use crate::err::{Error, FatalError};
use crate::rdcss::resolve::{complete, swap_helping};
use crate::rdcss::{verify_value_is_untagged, Descriptor, Rdcss, Resolution};
use crate::sync::AtomicUsize;
use crate::tagged::tag;
use crate::types::{Word, DESCRIPTOR_TAG};

impl<'a> Rdcss<'a> {
    /// Publish this operation at the data address, replacing the expected data value with a
    /// tagged descriptor.
    ///
    /// Descriptors of other operations found at the data address are resolved first. If the data
    /// address holds some other plain value, nothing is published and
    /// [Error::ValueWasNotExpectedValue] is returned.
    #[instrument(skip(guard))]
    pub fn install<'g>(self, guard: &'g Guard) -> Result<Installed<'a, 'g>, Error> {
        verify_value_is_untagged(self.expected_data)?;
        verify_value_is_untagged(self.new_value)?;

        let descriptor: *mut Descriptor = Box::into_raw(Box::new(Descriptor::from(&self)));
        let tagged: Word = tag(descriptor as Word, DESCRIPTOR_TAG);

        trace!("installing descriptor {tagged:#x} in place of {}", self.expected_data);
        match swap_helping(self.data, self.expected_data, tagged, guard) {
            Ok(()) => {
                trace!("descriptor {tagged:#x} is installed");
                Ok(Installed {
                    // not null: it came out of a Box
                    descriptor: unsafe { NonNull::new_unchecked(descriptor) },
                    tagged,
                    data: self.data,
                    guard,
                    attempted: false,
                })
            }
            Err(error) => {
                trace!("descriptor {tagged:#x} was never published: {error}");
                // nobody else ever saw it, so it can go right away
                drop(unsafe { Box::from_raw(descriptor) });
                Err(error)
            }
        }
    }
}

/// An RDCSS operation whose descriptor is installed at the data address and still has to be
/// resolved.
///
/// Other threads may resolve it at any time. [Installed::resolve] finishes the operation if
/// nobody has yet and reports how it turned out. Dropping an `Installed` resolves it too.
#[derive(Debug)]
pub struct Installed<'a, 'g> {
    descriptor: NonNull<Descriptor>,
    tagged: Word,
    data: &'a AtomicUsize,
    guard: &'g Guard,
    /// Whether resolution has already been attempted.
    attempted: bool,
}

impl<'a, 'g> Installed<'a, 'g> {
    /// The tagged descriptor as it appears at the data address.
    pub fn tagged(&self) -> Word {
        self.tagged
    }

    /// The data address this operation targets.
    pub fn data(&self) -> &'a AtomicUsize {
        self.data
    }

    pub fn resolve(mut self) -> Result<Resolution, FatalError> {
        self.finish()
    }

    #[instrument(skip(self), fields(tagged = self.tagged))]
    fn finish(&mut self) -> Result<Resolution, FatalError> {
        self.attempted = true;

        // the installer is pinned and has not retired the descriptor yet
        let descriptor: &Descriptor = unsafe { self.descriptor.as_ref() };
        let resolution: Resolution = complete(descriptor, self.tagged)?;

        // the data address no longer holds the descriptor, so only threads which loaded it
        // earlier can still see it, and those are pinned
        trace!("retiring descriptor {:#x} after {resolution:?}", self.tagged);
        unsafe {
            self.guard
                .defer_destroy(Shared::from(self.descriptor.as_ptr() as *const Descriptor));
        }
        Ok(resolution)
    }
}

impl<'a, 'g> Drop for Installed<'a, 'g> {
    fn drop(&mut self) {
        if self.attempted {
            return;
        }
        if let Err(fatal_error) = self.finish() {
            // the descriptor may still be installed, so it is leaked rather than freed
            error!("could not resolve descriptor {:#x}: {fatal_error}", self.tagged);
        }
    }
}
