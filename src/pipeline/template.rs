//! Immutable graph template shared by every device session.
//!
//! A [`GraphBuilder`] collects nodes and links, validates them and freezes
//! the result into a [`GraphTemplate`]. Once built, the template is only
//! ever read, so it is shared across worker threads behind an `Arc`.

use super::error::{PipelineError, PipelineResult};
use super::id::{LinkId, NodeId};
use super::node::{ColorCameraNode, NodeKind, StreamOutputNode};
use super::port::{find_port, PortDirection};
use crate::config::CameraConfig;
use crate::error::{MulticamError, Result};
use crate::types::FrameLayout;
use std::collections::HashSet;

/// Directed connection from an output port to an input port.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub from: NodeId,
    pub from_port: &'static str,
    pub to: NodeId,
    pub to_port: &'static str,
}

/// Resolved description of a host-bound output stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSpec {
    pub name: String,
    /// Camera node feeding the stream
    pub source: NodeId,
    pub source_port: &'static str,
    pub width: u32,
    pub height: u32,
    pub layout: FrameLayout,
    pub fps: u32,
}

/// Frozen processing graph.
#[derive(Debug, Clone)]
pub struct GraphTemplate {
    nodes: Vec<NodeKind>,
    links: Vec<Link>,
    streams: Vec<StreamSpec>,
}

impl GraphTemplate {
    /// Single color camera whose preview feeds one output stream.
    pub fn color_preview(camera: &CameraConfig) -> PipelineResult<Self> {
        let mut builder = GraphBuilder::new();
        let cam = builder.add_color_camera(ColorCameraNode::from(camera));
        let out = builder.add_stream_output(&camera.stream_name);
        builder.link(cam, "preview", out, "input")?;
        builder.build()
    }

    /// [`GraphTemplate::color_preview`] with default camera settings.
    pub fn default_color_preview() -> PipelineResult<Self> {
        Self::color_preview(&CameraConfig::default())
    }

    pub fn nodes(&self) -> &[NodeKind] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Declared output streams in declaration order.
    pub fn streams(&self) -> &[StreamSpec] {
        &self.streams
    }

    /// Look up a declared stream by name.
    pub fn stream(&self, name: &str) -> Result<&StreamSpec> {
        self.streams
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| MulticamError::UnknownStream(name.to_string()))
    }

    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.streams.iter().map(|s| s.name.as_str())
    }
}

/// Mutable builder for a [`GraphTemplate`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<NodeKind>,
    links: Vec<Link>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn add_color_camera(&mut self, camera: ColorCameraNode) -> NodeId {
        self.push(NodeKind::ColorCamera(camera))
    }

    pub fn add_stream_output(&mut self, stream_name: impl Into<String>) -> NodeId {
        self.push(NodeKind::StreamOutput(StreamOutputNode {
            stream_name: stream_name.into(),
        }))
    }

    /// Connect `from.from_port` (an output) to `to.to_port` (an input).
    pub fn link(
        &mut self,
        from: NodeId,
        from_port: &str,
        to: NodeId,
        to_port: &str,
    ) -> PipelineResult<LinkId> {
        let src = self
            .nodes
            .get(from.index())
            .ok_or(PipelineError::UnknownNode(from))?;
        let dst = self
            .nodes
            .get(to.index())
            .ok_or(PipelineError::UnknownNode(to))?;

        let out = find_port(src.ports(), from_port, PortDirection::Output).ok_or_else(|| {
            PipelineError::InvalidLink(format!(
                "{} has no output port '{}'",
                src.type_name(),
                from_port
            ))
        })?;
        let input = find_port(dst.ports(), to_port, PortDirection::Input).ok_or_else(|| {
            PipelineError::InvalidLink(format!(
                "{} has no input port '{}'",
                dst.type_name(),
                to_port
            ))
        })?;

        if self
            .links
            .iter()
            .any(|l| l.to == to && l.to_port == input.name)
        {
            return Err(PipelineError::InvalidLink(format!(
                "input '{}' of {:?} is already linked",
                to_port, to
            )));
        }

        let id = LinkId(self.links.len() as u32);
        self.links.push(Link {
            from,
            from_port: out.name,
            to,
            to_port: input.name,
        });
        Ok(id)
    }

    /// Validate and freeze the graph.
    pub fn build(self) -> PipelineResult<GraphTemplate> {
        if self.nodes.is_empty() {
            return Err(PipelineError::Empty);
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if let NodeKind::ColorCamera(cam) = node {
                if cam.preview_width == 0 || cam.preview_height == 0 {
                    return Err(PipelineError::InvalidParameter {
                        node_id: NodeId(index as u32),
                        message: "preview size must be non-zero".to_string(),
                    });
                }
            }
        }

        let mut seen = HashSet::new();
        let mut streams = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            let NodeKind::StreamOutput(out) = node else {
                continue;
            };
            let id = NodeId(index as u32);
            if !seen.insert(out.stream_name.clone()) {
                return Err(PipelineError::DuplicateStream(out.stream_name.clone()));
            }

            let link = self.links.iter().find(|l| l.to == id).ok_or_else(|| {
                PipelineError::InvalidLink(format!(
                    "stream '{}' has no upstream node",
                    out.stream_name
                ))
            })?;

            let NodeKind::ColorCamera(cam) = &self.nodes[link.from.index()] else {
                return Err(PipelineError::InvalidLink(format!(
                    "stream '{}' must be fed by a camera",
                    out.stream_name
                )));
            };

            let (width, height) = cam.port_dimensions(link.from_port);
            let layout = if link.from_port == "preview" {
                cam.preview_layout()
            } else {
                FrameLayout::Yuyv
            };
            streams.push(StreamSpec {
                name: out.stream_name.clone(),
                source: link.from,
                source_port: link.from_port,
                width,
                height,
                layout,
                fps: cam.fps,
            });
        }

        Ok(GraphTemplate {
            nodes: self.nodes,
            links: self.links,
            streams,
        })
    }
}
