use rdcss::err::Error;
use rdcss::types::{Word, EMPTY, WORD_SIZE};
use rdcss::{try_rdcss, Resolution};

cfg_if::cfg_if! {
    if #[cfg(loom)] {
        pub(crate) use loom::sync::atomic::{AtomicUsize, Ordering};
        pub(crate) use loom::sync::Arc;
        pub(crate) use loom::thread;
    } else if #[cfg(feature = "shuttle")] {
        pub(crate) use shuttle::sync::atomic::{AtomicUsize, Ordering};
        pub(crate) use shuttle::sync::Arc;
        pub(crate) use shuttle::thread;
    } else {
        pub(crate) use std::sync::atomic::{AtomicUsize, Ordering};
        pub(crate) use std::sync::Arc;
        pub(crate) use std::thread;
    }
}

/// The value thread `i` tries to install. Distinct per thread, never empty, never tagged.
pub(crate) fn value_for_thread(i: usize) -> Word {
    (i + 1) * WORD_SIZE
}

/// Race `NUM_THREADS` RDCSS operations which all expect an empty data address. Exactly one of
/// them can commit.
pub(crate) fn concurrency_test<const NUM_THREADS: usize>() {
    let control: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(16));
    let data: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(EMPTY));

    let join_handles: Vec<thread::JoinHandle<Result<Resolution, Error>>> = (0..NUM_THREADS)
        .map(|i| {
            let control: Arc<AtomicUsize> = control.clone();
            let data: Arc<AtomicUsize> = data.clone();
            thread::spawn(move || {
                let guard = rdcss::pin();
                try_rdcss(&control, 16, &data, EMPTY, value_for_thread(i), &guard)
            })
        })
        .collect();

    let winners: Vec<usize> = join_handles
        .into_iter()
        .map(|join_handle| join_handle.join().expect("A thread panicked"))
        .enumerate()
        .filter_map(|(i, result)| match result {
            Ok(resolution) => {
                // control never changes, so nothing can roll back
                assert!(resolution.succeeded(), "thread {i} saw {resolution:?}");
                Some(i)
            }
            Err(Error::ValueWasNotExpectedValue { actual }) => {
                assert_ne!(actual, EMPTY);
                None
            }
            Err(error) => panic!("thread {i} failed: {error}"),
        })
        .collect();

    assert_eq!(winners.len(), 1, "winners: {winners:?}");
    assert_eq!(data.load(Ordering::Acquire), value_for_thread(winners[0]));
}
