//! Core data types for multicam-rs
//!
//! # Main Types
//!
//! - [`DeviceHandle`] - Identity of an enumerated physical device
//! - [`Frame`] - One produced image buffer with its dimensions and sequence marker
//! - [`FrameLayout`] - Byte layout of a frame's color planes
//! - [`WorkerState`] - Lifecycle state of a device worker

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Opaque identity of a physical device
///
/// The `id` is the stable hardware identifier (serial number, bus id or
/// device node path) and doubles as the label in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle {
    /// Stable hardware identifier
    pub id: String,
    /// Human-readable product name, if the backend knows it
    pub name: Option<String>,
}

impl DeviceHandle {
    /// Create a handle with no product name
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Set the product name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Label used in logs and by consumers
    pub fn label(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", self.id, name),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Layout of a frame's pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameLayout {
    /// Three separate planes, `channels x height x width`
    Planar { channels: u8 },
    /// Pixels stored together, `height x width x channels`
    Interleaved { channels: u8 },
    /// Packed YUYV 4:2:2, two bytes per pixel
    Yuyv,
}

impl FrameLayout {
    /// Bytes per pixel
    pub fn channels(&self) -> u8 {
        match self {
            FrameLayout::Planar { channels } | FrameLayout::Interleaved { channels } => *channels,
            FrameLayout::Yuyv => 2,
        }
    }

    /// Expected buffer length for the given dimensions
    pub fn expected_len(&self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.channels() as usize
    }
}

/// One produced unit of output data
///
/// Frames move by value: producer → channel → worker → consumer.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel bytes
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Byte layout of `data`
    pub layout: FrameLayout,
    /// Arrival order on the producing channel
    pub sequence: u64,
    /// Time the producer captured the frame
    pub captured_at: Instant,
}

impl Frame {
    /// Create a new frame stamped with the current time
    pub fn new(data: Vec<u8>, width: u32, height: u32, layout: FrameLayout, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            layout,
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// Whether the buffer length matches the declared dimensions
    pub fn is_consistent(&self) -> bool {
        self.layout.expected_len(self.width, self.height) == self.data.len()
    }
}

/// Lifecycle of a device worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Opening the device session
    Starting,
    /// Receiving frames
    Running,
    /// Releasing the device session
    Draining,
    /// Terminal
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::Draining => "draining",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}
