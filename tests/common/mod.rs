//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod consumers;

use crossbeam_channel::bounded;
use std::thread;
use std::time::Duration;

/// Upper bound for any run that is expected to terminate
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Run `f` on a thread and fail the test if it does not return in time
pub fn run_with_timeout<T, F>(timeout: Duration, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(timeout)
        .unwrap_or_else(|_| panic!("did not finish within {:?}", timeout))
}
