//! Node kinds available in a graph template.
//!
//! The template only describes the graph; device backends interpret it
//! when a session starts.

use super::port::PortDescriptor;
use crate::config::{BoardSocket, CameraConfig, SensorResolution};
use crate::types::FrameLayout;

/// Color camera source.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorCameraNode {
    pub preview_width: u32,
    pub preview_height: u32,
    pub resolution: SensorResolution,
    pub socket: BoardSocket,
    /// HWC output when true, CHW planes otherwise
    pub interleaved: bool,
    pub fps: u32,
}

impl ColorCameraNode {
    const PORTS: &'static [PortDescriptor] = &[
        PortDescriptor::output("preview"),
        PortDescriptor::output("video"),
    ];

    /// Layout of frames leaving the preview port
    pub fn preview_layout(&self) -> FrameLayout {
        if self.interleaved {
            FrameLayout::Interleaved { channels: 3 }
        } else {
            FrameLayout::Planar { channels: 3 }
        }
    }

    /// Dimensions of frames leaving `port`
    pub fn port_dimensions(&self, port: &str) -> (u32, u32) {
        match port {
            "video" => self.resolution.dimensions(),
            _ => (self.preview_width, self.preview_height),
        }
    }
}

impl Default for ColorCameraNode {
    fn default() -> Self {
        Self::from(&CameraConfig::default())
    }
}

impl From<&CameraConfig> for ColorCameraNode {
    fn from(config: &CameraConfig) -> Self {
        Self {
            preview_width: config.preview_width,
            preview_height: config.preview_height,
            resolution: config.resolution,
            socket: config.socket,
            interleaved: config.interleaved,
            fps: config.fps,
        }
    }
}

/// Named host-bound output stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutputNode {
    pub stream_name: String,
}

impl StreamOutputNode {
    const PORTS: &'static [PortDescriptor] = &[PortDescriptor::input("input")];
}

/// A node in the graph template.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    ColorCamera(ColorCameraNode),
    StreamOutput(StreamOutputNode),
}

impl NodeKind {
    pub fn ports(&self) -> &'static [PortDescriptor] {
        match self {
            NodeKind::ColorCamera(_) => ColorCameraNode::PORTS,
            NodeKind::StreamOutput(_) => StreamOutputNode::PORTS,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::ColorCamera(_) => "ColorCamera",
            NodeKind::StreamOutput(_) => "StreamOutput",
        }
    }
}
