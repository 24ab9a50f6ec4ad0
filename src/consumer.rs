//! Frame consumption interface
//!
//! Workers hand every received frame to a [`FrameConsumer`]. The consumer
//! decides per frame whether acquisition should continue; returning
//! [`ConsumerDecision::Stop`] raises the shared stop flag for all devices.
//! A single consumer instance is shared by every worker thread.
//!
//! Display-side preparation lives here too: [`planar_to_interleaved`]
//! reshapes a `(C, H, W)` buffer into `(H, W, C)`.

use crate::error::{MulticamError, Result};
use crate::types::{Frame, FrameLayout};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-frame verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerDecision {
    Continue,
    Stop,
}

/// Sink for frames received by device workers
pub trait FrameConsumer: Send + Sync {
    /// Handle one frame from `device`
    fn on_frame(&self, device: &str, frame: Frame) -> ConsumerDecision;

    /// Called once after every worker has stopped
    fn teardown(&self) {}
}

/// Adapter turning a closure into a [`FrameConsumer`]
pub struct FnConsumer<F>(pub F);

impl<F> FrameConsumer for FnConsumer<F>
where
    F: Fn(&str, Frame) -> ConsumerDecision + Send + Sync,
{
    fn on_frame(&self, device: &str, frame: Frame) -> ConsumerDecision {
        (self.0)(device, frame)
    }
}

/// Wrap a closure as a consumer
pub fn consumer_fn<F>(f: F) -> FnConsumer<F>
where
    F: Fn(&str, Frame) -> ConsumerDecision + Send + Sync,
{
    FnConsumer(f)
}

/// Reorder a planar `(C, H, W)` buffer into interleaved `(H, W, C)`
///
/// Interleaved frames are copied unchanged. Packed YUYV is rejected.
pub fn planar_to_interleaved(frame: &Frame) -> Result<Vec<u8>> {
    match frame.layout {
        FrameLayout::Interleaved { .. } => Ok(frame.data.clone()),
        FrameLayout::Planar { channels } => {
            let channels = channels as usize;
            let plane = frame.width as usize * frame.height as usize;
            if frame.data.len() != plane * channels {
                return Err(MulticamError::InvalidFrame(format!(
                    "expected {} bytes for {}x{}x{}, got {}",
                    plane * channels,
                    channels,
                    frame.height,
                    frame.width,
                    frame.data.len()
                )));
            }

            let mut out = vec![0u8; frame.data.len()];
            for c in 0..channels {
                let src = &frame.data[c * plane..(c + 1) * plane];
                for (pixel, &value) in src.iter().enumerate() {
                    out[pixel * channels + c] = value;
                }
            }
            Ok(out)
        }
        other => Err(MulticamError::InvalidFrame(format!(
            "cannot reshape {:?} frame",
            other
        ))),
    }
}

#[derive(Debug, Default)]
struct DeviceCounters {
    frames: u64,
    window_frames: u64,
    window_start: Option<Instant>,
}

/// Consumer that checks frame sizes and logs throughput
pub struct LoggingConsumer {
    report_interval: Duration,
    devices: Mutex<BTreeMap<String, DeviceCounters>>,
}

impl Default for LoggingConsumer {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl LoggingConsumer {
    pub fn new(report_interval: Duration) -> Self {
        Self {
            report_interval,
            devices: Mutex::new(BTreeMap::new()),
        }
    }

    /// Frames seen per device so far
    pub fn frame_counts(&self) -> BTreeMap<String, u64> {
        self.devices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (k.clone(), v.frames))
            .collect()
    }
}

impl FrameConsumer for LoggingConsumer {
    fn on_frame(&self, device: &str, frame: Frame) -> ConsumerDecision {
        tracing::trace!(device, sequence = frame.sequence, "New frame received");

        if !frame.is_consistent() {
            tracing::warn!(
                device,
                len = frame.data.len(),
                expected = frame.layout.expected_len(frame.width, frame.height),
                "Dropping malformed frame"
            );
            return ConsumerDecision::Continue;
        }

        let mut devices = self.devices.lock().unwrap_or_else(|e| e.into_inner());
        let counters = devices.entry(device.to_string()).or_default();
        counters.frames += 1;
        counters.window_frames += 1;

        let now = Instant::now();
        let start = *counters.window_start.get_or_insert(now);
        let elapsed = now.duration_since(start);
        if elapsed >= self.report_interval {
            let fps = counters.window_frames as f64 / elapsed.as_secs_f64();
            tracing::info!(
                device,
                fps,
                total = counters.frames,
                "Frame rate"
            );
            counters.window_frames = 0;
            counters.window_start = Some(now);
        }

        ConsumerDecision::Continue
    }

    fn teardown(&self) {
        for (device, frames) in self.frame_counts() {
            tracing::info!(device = %device, frames, "Device totals");
        }
    }
}

/// Wraps a consumer and requests a stop once a limit is reached
pub struct LimitConsumer<C> {
    inner: C,
    max_frames: Option<u64>,
    stop_at_sequence: Option<u64>,
    seen: AtomicU64,
}

impl<C: FrameConsumer> LimitConsumer<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            max_frames: None,
            stop_at_sequence: None,
            seen: AtomicU64::new(0),
        }
    }

    /// Stop after `max` frames in total across all devices
    pub fn with_max_frames(mut self, max: u64) -> Self {
        self.max_frames = Some(max);
        self
    }

    /// Stop on the first frame whose sequence marker is at least `sequence`
    pub fn with_stop_at_sequence(mut self, sequence: u64) -> Self {
        self.stop_at_sequence = Some(sequence);
        self
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn frames_seen(&self) -> u64 {
        self.seen.load(Ordering::SeqCst)
    }
}

impl<C: FrameConsumer> FrameConsumer for LimitConsumer<C> {
    fn on_frame(&self, device: &str, frame: Frame) -> ConsumerDecision {
        let sequence = frame.sequence;
        let seen = self.seen.fetch_add(1, Ordering::SeqCst) + 1;

        let inner = self.inner.on_frame(device, frame);
        let frame_limit = self.max_frames.is_some_and(|max| seen >= max);
        let sequence_limit = self.stop_at_sequence.is_some_and(|s| sequence >= s);

        if inner == ConsumerDecision::Stop || frame_limit || sequence_limit {
            ConsumerDecision::Stop
        } else {
            ConsumerDecision::Continue
        }
    }

    fn teardown(&self) {
        self.inner.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planar_2x2() -> Frame {
        // R plane, G plane, B plane
        let data = vec![1, 2, 3, 4, 11, 12, 13, 14, 21, 22, 23, 24];
        Frame::new(data, 2, 2, FrameLayout::Planar { channels: 3 }, 0)
    }

    #[test]
    fn test_planar_to_interleaved() {
        let out = planar_to_interleaved(&planar_2x2()).unwrap();
        assert_eq!(out, vec![1, 11, 21, 2, 12, 22, 3, 13, 23, 4, 14, 24]);
    }

    #[test]
    fn test_interleaved_passthrough() {
        let frame = Frame::new(vec![5; 12], 2, 2, FrameLayout::Interleaved { channels: 3 }, 0);
        assert_eq!(planar_to_interleaved(&frame).unwrap(), vec![5; 12]);
    }

    #[test]
    fn test_reshape_rejects_bad_input() {
        let short = Frame::new(vec![0; 5], 2, 2, FrameLayout::Planar { channels: 3 }, 0);
        assert!(matches!(
            planar_to_interleaved(&short),
            Err(MulticamError::InvalidFrame(_))
        ));
        let yuyv = Frame::new(vec![0; 8], 2, 2, FrameLayout::Yuyv, 0);
        assert!(planar_to_interleaved(&yuyv).is_err());
    }

    #[test]
    fn test_fn_consumer() {
        let consumer = consumer_fn(|device, frame| {
            if device == "A" && frame.sequence > 0 {
                ConsumerDecision::Stop
            } else {
                ConsumerDecision::Continue
            }
        });
        assert_eq!(consumer.on_frame("A", planar_2x2()), ConsumerDecision::Continue);
        let mut later = planar_2x2();
        later.sequence = 1;
        assert_eq!(consumer.on_frame("A", later), ConsumerDecision::Stop);
    }

    #[test]
    fn test_logging_consumer_counts_per_device() {
        let consumer = LoggingConsumer::new(Duration::from_millis(0));
        consumer.on_frame("A", planar_2x2());
        consumer.on_frame("A", planar_2x2());
        consumer.on_frame("B", planar_2x2());

        let counts = consumer.frame_counts();
        assert_eq!(counts.get("A"), Some(&2));
        assert_eq!(counts.get("B"), Some(&1));
        consumer.teardown();
    }

    #[test]
    fn test_logging_consumer_skips_malformed_frames() {
        let consumer = LoggingConsumer::new(Duration::from_secs(60));
        let short = Frame::new(vec![0; 5], 2, 2, FrameLayout::Planar { channels: 3 }, 0);
        assert_eq!(consumer.on_frame("A", short), ConsumerDecision::Continue);
        assert_eq!(consumer.on_frame("A", planar_2x2()), ConsumerDecision::Continue);
        assert_eq!(consumer.frame_counts().get("A"), Some(&1));
    }

    #[test]
    fn test_limit_consumer_max_frames() {
        let consumer = LimitConsumer::new(LoggingConsumer::default()).with_max_frames(3);
        assert_eq!(consumer.on_frame("A", planar_2x2()), ConsumerDecision::Continue);
        assert_eq!(consumer.on_frame("B", planar_2x2()), ConsumerDecision::Continue);
        assert_eq!(consumer.on_frame("A", planar_2x2()), ConsumerDecision::Stop);
        assert_eq!(consumer.frames_seen(), 3);
    }

    #[test]
    fn test_limit_consumer_sequence() {
        let consumer = LimitConsumer::new(LoggingConsumer::default()).with_stop_at_sequence(3);
        let mut frame = planar_2x2();
        frame.sequence = 2;
        assert_eq!(consumer.on_frame("A", frame.clone()), ConsumerDecision::Continue);
        frame.sequence = 3;
        assert_eq!(consumer.on_frame("A", frame), ConsumerDecision::Stop);
        assert_eq!(consumer.inner().frame_counts().get("A"), Some(&2));
    }
}
