//! Mock device backend for running without camera hardware
//!
//! Each mock device produces synthetic frames on its own capture thread,
//! sized and laid out exactly as the graph template's streams declare.
//!
//! # Behaviour knobs
//!
//! - **Frame interval**: delay between produced frames
//! - **Frame limit**: produce N frames, then stall (keep running, produce nothing)
//! - **End of stream**: produce N frames, then close every output channel
//! - **Start failure**: `open` fails with [`MulticamError::DeviceStart`]
//! - **Pattern**: pixel content of generated frames
//!
//! # Example
//!
//! ```ignore
//! use multicam_rs::backend::{MockDeviceBackend, MockDeviceConfig};
//! use std::time::Duration;
//!
//! let backend = MockDeviceBackend::new(vec![
//!     MockDeviceConfig::new("MOCK-A").with_interval(Duration::from_millis(10)),
//!     MockDeviceConfig::new("MOCK-B").with_frame_limit(5),
//! ]);
//! ```

use super::capture_loop::{CaptureLoop, LoopAction};
use super::device_trait::{DeviceBackend, DeviceConnection, DeviceStats, StreamOutputs};
use crate::config::MockConfig;
use crate::error::{MulticamError, Result};
use crate::pipeline::{GraphTemplate, StreamSpec};
use crate::types::{DeviceHandle, Frame};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// How long a stalled device sleeps between stop checks
const STALL_POLL: Duration = Duration::from_millis(5);

/// Pixel content of generated frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockFramePattern {
    /// Every byte set to the same value
    Solid(u8),
    /// Horizontal gradient per plane
    #[default]
    Gradient,
    /// Every byte set to the low byte of the frame counter
    Counter,
}

impl MockFramePattern {
    fn fill(&self, spec: &StreamSpec, counter: u64) -> Vec<u8> {
        let len = spec.layout.expected_len(spec.width, spec.height);
        match self {
            MockFramePattern::Solid(v) => vec![*v; len],
            MockFramePattern::Counter => vec![counter as u8; len],
            MockFramePattern::Gradient => {
                let width = spec.width.max(1) as usize;
                (0..len)
                    .map(|i| ((i % width) * 255 / width) as u8)
                    .collect()
            }
        }
    }
}

/// Configuration for one mock device
#[derive(Debug, Clone)]
pub struct MockDeviceConfig {
    pub id: String,
    pub name: String,
    pub frame_interval: Duration,
    /// Frames to produce before stalling (None = unlimited)
    pub frame_limit: Option<u64>,
    /// Close the outputs instead of stalling once `frame_limit` is reached
    pub end_of_stream: bool,
    pub fail_start: bool,
    pub pattern: MockFramePattern,
}

impl MockDeviceConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: "Mock Camera".to_string(),
            frame_interval: Duration::from_millis(33),
            frame_limit: None,
            end_of_stream: false,
            fail_start: false,
            pattern: MockFramePattern::default(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Produce `frames` frames, then close the outputs as an unplugged device would
    pub fn with_end_of_stream(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self.end_of_stream = true;
        self
    }

    /// A device that never produces a frame
    pub fn stalled(self) -> Self {
        self.with_frame_limit(0)
    }

    pub fn failing(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn with_pattern(mut self, pattern: MockFramePattern) -> Self {
        self.pattern = pattern;
        self
    }
}

/// Backend that enumerates a fixed set of synthetic devices
pub struct MockDeviceBackend {
    devices: Vec<MockDeviceConfig>,
    /// Ids with a live connection
    active: Arc<Mutex<HashSet<String>>>,
    opened: Arc<AtomicUsize>,
}

impl MockDeviceBackend {
    pub fn new(devices: Vec<MockDeviceConfig>) -> Self {
        Self {
            devices,
            active: Arc::new(Mutex::new(HashSet::new())),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Build devices `MOCK-0001..` from the `[mock]` config section
    pub fn from_config(config: &MockConfig) -> Self {
        let devices = (1..=config.devices)
            .map(|i| {
                let id = format!("MOCK-{:04}", i);
                let mut device = MockDeviceConfig::new(id.clone())
                    .with_interval(Duration::from_millis(config.frame_interval_ms));
                device.frame_limit = config.frames_per_device;
                device.end_of_stream = config.end_of_stream;
                device.fail_start = config.fail_start.contains(&id);
                device
            })
            .collect();
        Self::new(devices)
    }

    /// Number of successful `open` calls so far
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of connections not yet stopped
    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn device(&self, id: &str) -> Option<&MockDeviceConfig> {
        self.devices.iter().find(|d| d.id == id)
    }
}

impl DeviceBackend for MockDeviceBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn enumerate(&self) -> Result<Vec<DeviceHandle>> {
        Ok(self
            .devices
            .iter()
            .map(|d| DeviceHandle::new(d.id.clone()).with_name(d.name.clone()))
            .collect())
    }

    fn open(
        &self,
        handle: &DeviceHandle,
        template: &GraphTemplate,
        outputs: StreamOutputs,
    ) -> Result<Box<dyn DeviceConnection>> {
        let device = self
            .device(&handle.id)
            .cloned()
            .ok_or_else(|| MulticamError::DeviceStart {
                device: handle.id.clone(),
                message: "device not found".to_string(),
            })?;

        if device.fail_start {
            return Err(MulticamError::DeviceStart {
                device: handle.id.clone(),
                message: "simulated start failure".to_string(),
            });
        }

        {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            if !active.insert(handle.id.clone()) {
                return Err(MulticamError::DeviceStart {
                    device: handle.id.clone(),
                    message: "device already has an open session".to_string(),
                });
            }
        }

        let streams: Vec<(StreamSpec, _)> = template
            .streams()
            .iter()
            .filter_map(|spec| outputs.get(&spec.name).map(|tx| (spec.clone(), tx.clone())))
            .collect();

        let produced = Arc::new(AtomicU64::new(0));
        let thread_produced = Arc::clone(&produced);
        let label = handle.id.clone();

        let capture = CaptureLoop::start(&format!("mock-{}", handle.id), move || {
            let count = thread_produced.load(Ordering::Relaxed);
            if device.frame_limit.is_some_and(|limit| count >= limit) {
                if device.end_of_stream {
                    for (_, tx) in &streams {
                        tx.close();
                    }
                    tracing::debug!(device = %label, frames = count, "End of stream");
                    return LoopAction::Stop;
                }
                thread::sleep(STALL_POLL);
                return LoopAction::Continue;
            }

            let mut open_outputs = 0;
            for (spec, tx) in &streams {
                let frame = Frame::new(
                    device.pattern.fill(spec, count),
                    spec.width,
                    spec.height,
                    spec.layout,
                    count,
                );
                if tx.send(frame).is_ok() {
                    open_outputs += 1;
                }
            }
            if open_outputs == 0 {
                tracing::debug!(device = %label, "All outputs closed");
                return LoopAction::Stop;
            }
            thread_produced.fetch_add(1, Ordering::Relaxed);

            thread::sleep(device.frame_interval);
            LoopAction::Continue
        });

        let capture = match capture {
            Ok(capture) => capture,
            Err(e) => {
                self.release(&handle.id);
                return Err(MulticamError::DeviceStart {
                    device: handle.id.clone(),
                    message: e.to_string(),
                });
            }
        };

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            id: handle.id.clone(),
            capture,
            produced,
            active: Some(Arc::clone(&self.active)),
        }))
    }
}

impl MockDeviceBackend {
    fn release(&self, id: &str) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }
}

struct MockConnection {
    id: String,
    capture: CaptureLoop,
    produced: Arc<AtomicU64>,
    /// Taken on the first stop so the id is released once
    active: Option<Arc<Mutex<HashSet<String>>>>,
}

impl DeviceConnection for MockConnection {
    fn stop(&mut self) {
        self.capture.stop();
        if let Some(active) = self.active.take() {
            active
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&self.id);
            tracing::debug!(device = %self.id, "Mock device released");
        }
    }

    fn is_running(&self) -> bool {
        self.capture.is_running()
    }

    fn stats(&self) -> DeviceStats {
        DeviceStats {
            frames_produced: self.produced.load(Ordering::Relaxed),
            capture_errors: 0,
        }
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::channel::FrameChannel;
    use crate::config::DropPolicy;
    use crate::types::FrameLayout;
    use std::time::Instant;

    fn outputs_for(template: &GraphTemplate, capacity: usize) -> (StreamOutputs, FrameChannel) {
        let channel = FrameChannel::new(capacity, DropPolicy::DropOldest);
        let mut outputs = StreamOutputs::new();
        for name in template.stream_names() {
            outputs.insert(name, channel.sender());
        }
        (outputs, channel)
    }

    #[test]
    fn test_enumerate_from_config() {
        let config = MockConfig {
            devices: 3,
            ..Default::default()
        };
        let backend = MockDeviceBackend::from_config(&config);
        let ids: Vec<_> = backend.enumerate().unwrap().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["MOCK-0001", "MOCK-0002", "MOCK-0003"]);
    }

    #[test]
    fn test_produces_frames_matching_template() {
        let template = GraphTemplate::default_color_preview().unwrap();
        let backend = MockDeviceBackend::new(vec![
            MockDeviceConfig::new("A").with_interval(Duration::from_millis(1))
        ]);
        let (outputs, channel) = outputs_for(&template, 4);

        let mut conn = backend
            .open(&DeviceHandle::new("A"), &template, outputs)
            .unwrap();
        let frame = channel.receive_timeout(Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (300, 300));
        assert_eq!(frame.layout, FrameLayout::Planar { channels: 3 });
        assert!(frame.is_consistent());

        conn.stop();
        assert!(!conn.is_running());
        assert!(conn.stats().frames_produced >= 1);
    }

    #[test]
    fn test_frame_limit_then_stall() {
        let template = GraphTemplate::default_color_preview().unwrap();
        let backend = MockDeviceBackend::new(vec![MockDeviceConfig::new("A")
            .with_interval(Duration::ZERO)
            .with_frame_limit(3)]);
        let (outputs, channel) = outputs_for(&template, 8);
        let mut conn = backend
            .open(&DeviceHandle::new("A"), &template, outputs)
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while conn.stats().frames_produced < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(20));
        assert_eq!(conn.stats().frames_produced, 3);
        assert_eq!(channel.len(), 3);
        assert!(conn.is_running());
        conn.stop();
    }

    #[test]
    fn test_end_of_stream_closes_outputs() {
        let template = GraphTemplate::default_color_preview().unwrap();
        let backend = MockDeviceBackend::new(vec![MockDeviceConfig::new("A")
            .with_interval(Duration::ZERO)
            .with_end_of_stream(2)]);
        let (outputs, channel) = outputs_for(&template, 8);
        let mut conn = backend
            .open(&DeviceHandle::new("A"), &template, outputs)
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while conn.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!conn.is_running());
        assert!(channel.is_closed());
        assert_eq!(conn.stats().frames_produced, 2);

        conn.stop();
        assert_eq!(backend.active_count(), 0);
    }

    #[test]
    fn test_failing_and_unknown_devices() {
        let template = GraphTemplate::default_color_preview().unwrap();
        let backend = MockDeviceBackend::new(vec![MockDeviceConfig::new("BAD").failing()]);

        let (outputs, _channel) = outputs_for(&template, 1);
        let err = backend
            .open(&DeviceHandle::new("BAD"), &template, outputs.clone())
            .err()
            .unwrap();
        assert!(matches!(err, MulticamError::DeviceStart { .. }));

        let err = backend
            .open(&DeviceHandle::new("NOPE"), &template, outputs)
            .err()
            .unwrap();
        assert!(matches!(err, MulticamError::DeviceStart { .. }));
        assert_eq!(backend.open_count(), 0);
    }

    #[test]
    fn test_one_session_per_device() {
        let template = GraphTemplate::default_color_preview().unwrap();
        let backend = MockDeviceBackend::new(vec![MockDeviceConfig::new("A").stalled()]);
        let handle = DeviceHandle::new("A");

        let (outputs, _c1) = outputs_for(&template, 1);
        let mut first = backend.open(&handle, &template, outputs).unwrap();
        let (outputs, _c2) = outputs_for(&template, 1);
        assert!(backend.open(&handle, &template, outputs).is_err());
        assert_eq!(backend.active_count(), 1);

        first.stop();
        first.stop();
        assert_eq!(backend.active_count(), 0);

        let (outputs, _c3) = outputs_for(&template, 1);
        let mut second = backend.open(&handle, &template, outputs).unwrap();
        second.stop();
        assert_eq!(backend.open_count(), 2);
    }

    #[test]
    fn test_producer_exits_when_outputs_closed() {
        let template = GraphTemplate::default_color_preview().unwrap();
        let backend = MockDeviceBackend::new(vec![
            MockDeviceConfig::new("A").with_interval(Duration::from_millis(1))
        ]);
        let (outputs, channel) = outputs_for(&template, 2);
        let mut conn = backend
            .open(&DeviceHandle::new("A"), &template, outputs)
            .unwrap();

        channel.close();
        let deadline = Instant::now() + Duration::from_secs(2);
        while conn.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!conn.is_running());
        conn.stop();
    }

    #[test]
    fn test_patterns() {
        let template = GraphTemplate::default_color_preview().unwrap();
        let spec = template.stream("rgb").unwrap();
        assert!(MockFramePattern::Solid(9).fill(spec, 0).iter().all(|&b| b == 9));
        assert!(MockFramePattern::Counter.fill(spec, 258).iter().all(|&b| b == 2));
        let gradient = MockFramePattern::Gradient.fill(spec, 0);
        assert_eq!(gradient.len(), 3 * 300 * 300);
        assert_eq!(gradient[0], 0);
        assert!(gradient[299] > gradient[1]);
    }
}
