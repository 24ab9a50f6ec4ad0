//! Processing graph templates.
//!
//! A template describes the stages a device runs and the named streams it
//! sends back to the host. It is built once, before any device starts, and
//! then shared read-only by every device session.
//!
//! ```text
//! [ColorCamera] ──preview──► [StreamOutput "rgb"]
//! ```

pub mod error;
pub mod id;
pub mod node;
pub mod port;
pub mod template;

pub use error::{PipelineError, PipelineResult};
pub use id::{LinkId, NodeId};
pub use node::{ColorCameraNode, NodeKind, StreamOutputNode};
pub use port::{PortDescriptor, PortDirection};
pub use template::{GraphBuilder, GraphTemplate, Link, StreamSpec};
