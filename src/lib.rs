//! Lock-free restricted double-compare single-swap (RDCSS) on top of single-word CAS.
//!
//! The crate has three layers:
//!
//! - [tagged]: small tags stored in the low-order bits of word-aligned addresses, which is how an
//!   in-flight descriptor is told apart from a plain value.
//! - [slot]: atomic load, CAS, set-if-empty and pop on the elements of contiguous stores, either
//!   through raw `(base, index, element size)` arithmetic or through the bounds-checked [Slots].
//! - [rdcss]: the two-phase RDCSS protocol with cooperative completion and epoch-based reclamation
//!   of descriptors.
//!
//! ```
//! use core::sync::atomic::Ordering;
//! use rdcss::AtomicUsize;
//!
//! let control = AtomicUsize::new(16);
//! let data = AtomicUsize::new(8);
//!
//! // data becomes 24 only because control is still 16
//! assert!(rdcss::rdcss(&control, 16, &data, 8, 24));
//! assert_eq!(data.load(Ordering::Acquire), 24);
//!
//! control.store(17, Ordering::Release);
//! assert!(!rdcss::rdcss(&control, 16, &data, 24, 32));
//! assert_eq!(data.load(Ordering::Acquire), 24);
//! ```
#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod err;
pub mod rdcss;
pub mod slot;
mod sync;
pub mod tagged;
pub mod types;

#[cfg(feature = "std")]
pub use crossbeam_epoch::pin;
pub use crossbeam_epoch::Guard;

#[cfg(feature = "std")]
pub use crate::rdcss::rdcss;
pub use crate::rdcss::{
    compare_and_swap, help_complete, is_descriptor, read, try_rdcss, Decision, Installed, Rdcss,
    Resolution,
};
pub use crate::slot::{Base, ElementSize, Slots};
pub use crate::sync::AtomicUsize;
pub use crate::tagged::{get_tag, has_tag, tag, try_tag, untag, TaggedPtr};
pub use crate::types::{
    Tag, Word, ADDRESS_SIZE, DESCRIPTOR_TAG, EMPTY, MAX_TAG, POINTER_SIZE, PTR_MASK, WORD_SIZE,
};
