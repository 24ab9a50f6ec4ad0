//! Process-wide stop flag shared by all device workers
//!
//! The flag starts lowered and can only be raised. Every worker receives a
//! clone at construction and checks it once per loop iteration with a
//! lock-free atomic load. Raising the flag also closes every frame channel
//! registered with it, which wakes workers parked in a blocking receive on
//! a device that has stopped producing.

use super::channel::FrameChannel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct StopInner {
    raised: AtomicBool,
    channels: Mutex<Vec<FrameChannel>>,
}

/// Shared, write-once stop signal
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    inner: Arc<StopInner>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a stop has been requested
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// Request a global stop and close every registered channel
    ///
    /// Returns `true` for the call that actually raised the flag.
    pub fn raise(&self) -> bool {
        let first = !self.inner.raised.swap(true, Ordering::SeqCst);

        let channels = std::mem::take(
            &mut *self
                .inner
                .channels
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        );
        for channel in &channels {
            channel.close();
        }

        if first {
            tracing::info!(channels = channels.len(), "Stop requested");
        }
        first
    }

    /// Close `channel` when the flag is raised
    ///
    /// If the flag is already raised the channel is closed immediately.
    pub fn register_channel(&self, channel: &FrameChannel) {
        let mut channels = self
            .inner
            .channels
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        // Checked under the lock: raise() sets the flag before draining
        if self.is_raised() {
            drop(channels);
            channel.close();
            return;
        }
        channels.push(channel.clone());
    }

    /// Forget a channel whose session has already closed it
    pub fn unregister_channel(&self, channel: &FrameChannel) {
        self.inner
            .channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|c| !c.same_channel(channel));
    }

    /// Whether two handles share the same flag
    pub fn same_flag(&self, other: &StopFlag) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DropPolicy;
    use crate::error::MulticamError;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_flag_starts_lowered_and_never_resets() {
        let flag = StopFlag::new();
        assert!(!flag.is_raised());
        assert!(flag.raise());
        assert!(flag.is_raised());
        assert!(!flag.raise());
        assert!(flag.is_raised());
    }

    #[test]
    fn test_clones_share_state() {
        let flag = StopFlag::new();
        let other = flag.clone();
        assert!(flag.same_flag(&other));
        other.raise();
        assert!(flag.is_raised());
        assert!(!flag.same_flag(&StopFlag::new()));
    }

    #[test]
    fn test_raise_closes_registered_channels() {
        let flag = StopFlag::new();
        let a = FrameChannel::new(4, DropPolicy::DropOldest);
        let b = FrameChannel::new(4, DropPolicy::DropOldest);
        flag.register_channel(&a);
        flag.register_channel(&b);

        flag.raise();
        assert!(a.is_closed());
        assert!(b.is_closed());
    }

    #[test]
    fn test_register_after_raise_closes_immediately() {
        let flag = StopFlag::new();
        flag.raise();
        let channel = FrameChannel::new(4, DropPolicy::DropOldest);
        flag.register_channel(&channel);
        assert!(channel.is_closed());
    }

    #[test]
    fn test_unregistered_channel_left_open() {
        let flag = StopFlag::new();
        let channel = FrameChannel::new(4, DropPolicy::DropOldest);
        flag.register_channel(&channel);
        flag.unregister_channel(&channel);
        flag.raise();
        assert!(!channel.is_closed());
    }

    #[test]
    fn test_raise_from_another_thread_unblocks_receiver() {
        let flag = StopFlag::new();
        let channel = FrameChannel::new(4, DropPolicy::DropOldest);
        flag.register_channel(&channel);

        let rx = channel.clone();
        let receiver = thread::spawn(move || rx.receive());

        let raiser = flag.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            raiser.raise();
        })
        .join()
        .unwrap();

        assert!(matches!(receiver.join().unwrap(), Err(MulticamError::ChannelClosed)));
    }

    #[test]
    fn test_concurrent_register_and_raise_never_leaves_channel_open() {
        for _ in 0..100 {
            let flag = StopFlag::new();
            let channel = FrameChannel::new(1, DropPolicy::DropOldest);

            let f = flag.clone();
            let c = channel.clone();
            let registrar = thread::spawn(move || f.register_channel(&c));
            flag.raise();
            registrar.join().unwrap();

            assert!(channel.is_closed());
        }
    }
}
