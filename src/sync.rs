//! A module which decides which synchronization primitives to use throughout the rest of the crate
//! depending on features and configuration options

cfg_if::cfg_if! {
    if #[cfg(loom)] {
        pub use loom::sync::atomic::{AtomicUsize, Ordering};
    } else if #[cfg(feature = "shuttle")] {
        pub use shuttle::sync::atomic::{AtomicUsize, Ordering};
    } else {
        pub use core::sync::atomic::{AtomicUsize, Ordering};
    }
}
