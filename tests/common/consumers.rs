//! Consumers that record what they see

use multicam_rs::consumer::{ConsumerDecision, FrameConsumer};
use multicam_rs::Frame;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type StopRule = Box<dyn Fn(&str, &Frame, usize) -> bool + Send + Sync>;

/// Records the sequence markers received per device
pub struct RecordingConsumer {
    sequences: Mutex<BTreeMap<String, Vec<u64>>>,
    total: AtomicUsize,
    teardowns: AtomicUsize,
    stop_rule: Option<StopRule>,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self {
            sequences: Mutex::new(BTreeMap::new()),
            total: AtomicUsize::new(0),
            teardowns: AtomicUsize::new(0),
            stop_rule: None,
        }
    }

    /// Request a stop when `rule(device, frame, total_so_far)` holds
    pub fn stop_when<F>(mut self, rule: F) -> Self
    where
        F: Fn(&str, &Frame, usize) -> bool + Send + Sync + 'static,
    {
        self.stop_rule = Some(Box::new(rule));
        self
    }

    /// Stop after `n` frames across all devices
    pub fn stop_after_total(n: usize) -> Self {
        Self::new().stop_when(move |_, _, total| total >= n)
    }

    pub fn sequences(&self, device: &str) -> Vec<u64> {
        self.sequences
            .lock()
            .unwrap()
            .get(device)
            .cloned()
            .unwrap_or_default()
    }

    pub fn devices(&self) -> Vec<String> {
        self.sequences.lock().unwrap().keys().cloned().collect()
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn teardown_count(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

impl FrameConsumer for RecordingConsumer {
    fn on_frame(&self, device: &str, frame: Frame) -> ConsumerDecision {
        self.sequences
            .lock()
            .unwrap()
            .entry(device.to_string())
            .or_default()
            .push(frame.sequence);
        let total = self.total.fetch_add(1, Ordering::SeqCst) + 1;

        match &self.stop_rule {
            Some(rule) if rule(device, &frame, total) => ConsumerDecision::Stop,
            _ => ConsumerDecision::Continue,
        }
    }

    fn teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Whether `seq` is strictly increasing
pub fn strictly_increasing(seq: &[u64]) -> bool {
    seq.windows(2).all(|w| w[0] < w[1])
}
