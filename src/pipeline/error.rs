//! Graph template error types.

use crate::pipeline::id::NodeId;
use thiserror::Error;

/// Errors raised while building a graph template.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Graph has no nodes")]
    Empty,

    #[error("Unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("Duplicate output stream name: {0}")]
    DuplicateStream(String),

    #[error("Invalid link: {0}")]
    InvalidLink(String),

    #[error("Invalid parameter on node {node_id:?}: {message}")]
    InvalidParameter { node_id: NodeId, message: String },
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
