//! Device backend traits
//!
//! A [`DeviceBackend`] knows how to discover devices and start the graph
//! template on one of them. Starting yields a [`DeviceConnection`], the
//! device-side half of a running session, which pushes frames into the
//! [`StreamOutputs`] it was given until it is stopped.
//!
//! Both the mock backend and the V4L2 backend implement these traits, so
//! sessions and workers never depend on a concrete device type.

use super::channel::FrameSender;
use crate::error::Result;
use crate::pipeline::GraphTemplate;
use crate::types::DeviceHandle;
use std::collections::HashMap;

/// Producer handles for every stream declared in a template
#[derive(Debug, Clone, Default)]
pub struct StreamOutputs {
    senders: HashMap<String, FrameSender>,
}

impl StreamOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, sender: FrameSender) {
        self.senders.insert(name.into(), sender);
    }

    pub fn get(&self, name: &str) -> Option<&FrameSender> {
        self.senders.get(name)
    }
}

/// Counters reported by a running device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Frames handed to output channels
    pub frames_produced: u64,
    /// Capture errors that were skipped
    pub capture_errors: u64,
}

/// Device side of a started session
///
/// Implementations must be `Send` so the session can live on its worker
/// thread.
pub trait DeviceConnection: Send {
    /// Stop production and release device resources
    ///
    /// Must be safe to call more than once.
    fn stop(&mut self);

    /// Whether the device is still producing
    fn is_running(&self) -> bool;

    /// Production counters
    fn stats(&self) -> DeviceStats {
        DeviceStats::default()
    }
}

/// Source of devices
///
/// Backends are shared by every worker thread, hence `Send + Sync`.
pub trait DeviceBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// List reachable devices
    ///
    /// An empty list is not an error here; the enumerator decides that.
    fn enumerate(&self) -> Result<Vec<DeviceHandle>>;

    /// Start `template` on `handle`, producing into `outputs`
    ///
    /// Production may begin before this returns.
    fn open(
        &self,
        handle: &DeviceHandle,
        template: &GraphTemplate,
        outputs: StreamOutputs,
    ) -> Result<Box<dyn DeviceConnection>>;
}
