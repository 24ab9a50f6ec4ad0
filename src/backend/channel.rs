//! Bounded frame channel with drop-on-overflow semantics
//!
//! Each output stream of a device session gets one [`FrameChannel`]. The
//! producer side never blocks: when the channel is full, the configured
//! [`DropPolicy`] decides whether the oldest buffered frame or the incoming
//! frame is discarded. The consumer side blocks in [`FrameChannel::receive`]
//! until a frame arrives or the channel is closed.
//!
//! # Closing
//!
//! Closing is explicit and idempotent. A close wakes every receiver that is
//! currently blocked, and all later receives fail with
//! [`MulticamError::ChannelClosed`] even if frames are still buffered. The
//! wake-up is carried by a second crossbeam channel whose only sender is
//! dropped on close, so a receiver parked in `select!` cannot miss it.

use crate::config::DropPolicy;
use crate::error::{MulticamError, Result};
use crate::types::Frame;
use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Result of a non-blocking send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame was buffered without loss
    Queued,
    /// Frame was buffered after evicting the oldest one
    EvictedOldest,
    /// Channel was full and the incoming frame was discarded
    DroppedNewest,
}

/// Counters for a single channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    /// Frames offered by the producer
    pub sent: u64,
    /// Frames discarded because the channel was full
    pub dropped: u64,
    /// Frames handed to a receiver
    pub delivered: u64,
}

struct ChannelInner {
    frames_tx: Sender<Frame>,
    frames_rx: Receiver<Frame>,
    /// Dropped on close; disconnecting `close_rx` wakes blocked receivers
    close_tx: Mutex<Option<Sender<()>>>,
    close_rx: Receiver<()>,
    closed: AtomicBool,
    /// Serializes producers and holds the next sequence marker
    next_sequence: Mutex<u64>,
    capacity: usize,
    policy: DropPolicy,
    sent: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
}

/// Bounded, closable frame queue
///
/// Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct FrameChannel {
    inner: Arc<ChannelInner>,
}

impl std::fmt::Debug for FrameChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameChannel")
            .field("capacity", &self.inner.capacity)
            .field("policy", &self.inner.policy)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl FrameChannel {
    /// Create a channel holding at most `capacity` frames (minimum 1)
    pub fn new(capacity: usize, policy: DropPolicy) -> Self {
        let capacity = capacity.max(1);
        let (frames_tx, frames_rx) = bounded(capacity);
        let (close_tx, close_rx) = bounded(0);

        Self {
            inner: Arc::new(ChannelInner {
                frames_tx,
                frames_rx,
                close_tx: Mutex::new(Some(close_tx)),
                close_rx,
                closed: AtomicBool::new(false),
                next_sequence: Mutex::new(0),
                capacity,
                policy,
                sent: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
            }),
        }
    }

    /// Producer-side handle for this channel
    pub fn sender(&self) -> FrameSender {
        FrameSender {
            channel: self.clone(),
        }
    }

    /// Offer a frame without blocking
    ///
    /// The frame's `sequence` is overwritten with the channel's arrival
    /// counter, so receivers always observe non-decreasing markers.
    pub fn send(&self, mut frame: Frame) -> Result<SendOutcome> {
        let inner = &self.inner;
        let mut next_sequence = inner
            .next_sequence
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        if self.is_closed() {
            return Err(MulticamError::ChannelClosed);
        }

        frame.sequence = *next_sequence;
        *next_sequence += 1;
        inner.sent.fetch_add(1, Ordering::Relaxed);

        match inner.policy {
            DropPolicy::DropNewest => match inner.frames_tx.try_send(frame) {
                Ok(()) => Ok(SendOutcome::Queued),
                Err(TrySendError::Full(_)) => {
                    inner.dropped.fetch_add(1, Ordering::Relaxed);
                    Ok(SendOutcome::DroppedNewest)
                }
                Err(TrySendError::Disconnected(_)) => Err(MulticamError::ChannelClosed),
            },
            DropPolicy::DropOldest => {
                let mut frame = frame;
                let mut evicted = false;
                loop {
                    match inner.frames_tx.try_send(frame) {
                        Ok(()) => {
                            return Ok(if evicted {
                                SendOutcome::EvictedOldest
                            } else {
                                SendOutcome::Queued
                            });
                        }
                        Err(TrySendError::Full(rejected)) => {
                            frame = rejected;
                            // A concurrent receive may have made room already
                            if inner.frames_rx.try_recv().is_ok() {
                                inner.dropped.fetch_add(1, Ordering::Relaxed);
                                evicted = true;
                            }
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            return Err(MulticamError::ChannelClosed)
                        }
                    }
                }
            }
        }
    }

    /// Block until a frame is available or the channel is closed
    pub fn receive(&self) -> Result<Frame> {
        if self.is_closed() {
            return Err(MulticamError::ChannelClosed);
        }

        let inner = &self.inner;
        select! {
            recv(inner.frames_rx) -> msg => self.delivered(msg.ok()),
            recv(inner.close_rx) -> _ => Err(MulticamError::ChannelClosed),
        }
    }

    /// Like [`receive`](Self::receive) but gives up after `timeout`
    ///
    /// Returns `Ok(None)` when the timeout elapses.
    pub fn receive_timeout(&self, timeout: Duration) -> Result<Option<Frame>> {
        if self.is_closed() {
            return Err(MulticamError::ChannelClosed);
        }

        let inner = &self.inner;
        select! {
            recv(inner.frames_rx) -> msg => self.delivered(msg.ok()).map(Some),
            recv(inner.close_rx) -> _ => Err(MulticamError::ChannelClosed),
            default(timeout) => Ok(None),
        }
    }

    /// Take a buffered frame if one is ready
    pub fn try_receive(&self) -> Result<Option<Frame>> {
        if self.is_closed() {
            return Err(MulticamError::ChannelClosed);
        }
        match self.inner.frames_rx.try_recv() {
            Ok(frame) => self.delivered(Some(frame)).map(Some),
            Err(_) => Ok(None),
        }
    }

    fn delivered(&self, frame: Option<Frame>) -> Result<Frame> {
        match frame {
            Some(frame) => {
                self.inner.delivered.fetch_add(1, Ordering::Relaxed);
                Ok(frame)
            }
            None => Err(MulticamError::ChannelClosed),
        }
    }

    /// Close the channel, waking all blocked receivers
    ///
    /// Returns `true` if this call performed the close. Buffered frames are
    /// released.
    pub fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return false;
        }

        let close_tx = self
            .inner
            .close_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        drop(close_tx);

        while self.inner.frames_rx.try_recv().is_ok() {}
        true
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Number of buffered frames
    pub fn len(&self) -> usize {
        self.inner.frames_rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.frames_rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn policy(&self) -> DropPolicy {
        self.inner.policy
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            sent: self.inner.sent.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            delivered: self.inner.delivered.load(Ordering::Relaxed),
        }
    }

    /// Whether two handles refer to the same channel
    pub fn same_channel(&self, other: &FrameChannel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Producer-side view of a [`FrameChannel`]
#[derive(Clone, Debug)]
pub struct FrameSender {
    channel: FrameChannel,
}

impl FrameSender {
    pub fn send(&self, frame: Frame) -> Result<SendOutcome> {
        self.channel.send(frame)
    }

    /// End the stream from the device side
    ///
    /// Behaves like [`FrameChannel::close`]: blocked receivers wake with
    /// [`MulticamError::ChannelClosed`] and buffered frames are released.
    pub fn close(&self) -> bool {
        self.channel.close()
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}
