//! Device session: one graph template running on one device
//!
//! Starting a session creates one [`FrameChannel`] per stream declared in
//! the template and hands the producer ends to the backend. The device may
//! begin producing immediately, before anyone receives; the channel's drop
//! policy bounds what accumulates in the meantime.
//!
//! [`DeviceSession::stop`] closes every channel and stops the device. It is
//! idempotent and also runs on drop, so device resources are released on
//! every exit path of the owning worker.

use super::channel::FrameChannel;
use super::device_trait::{DeviceBackend, DeviceConnection, DeviceStats, StreamOutputs};
use crate::config::ChannelConfig;
use crate::error::{MulticamError, Result};
use crate::pipeline::GraphTemplate;
use crate::types::DeviceHandle;
use std::collections::HashMap;

/// A started device with its output channels
pub struct DeviceSession {
    handle: DeviceHandle,
    connection: Option<Box<dyn DeviceConnection>>,
    channels: HashMap<String, FrameChannel>,
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("device", &self.handle.id)
            .field("streams", &self.channels.keys().collect::<Vec<_>>())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl DeviceSession {
    /// Bind `template` to the device behind `handle` and start it
    pub fn start(
        handle: &DeviceHandle,
        template: &GraphTemplate,
        backend: &dyn DeviceBackend,
        channel_config: &ChannelConfig,
    ) -> Result<Self> {
        let mut channels = HashMap::new();
        let mut outputs = StreamOutputs::new();
        for name in template.stream_names() {
            let channel = FrameChannel::new(channel_config.capacity, channel_config.drop_policy);
            outputs.insert(name, channel.sender());
            channels.insert(name.to_string(), channel);
        }

        let connection = match backend.open(handle, template, outputs) {
            Ok(connection) => connection,
            Err(e) => {
                for channel in channels.values() {
                    channel.close();
                }
                return Err(match e {
                    e @ MulticamError::DeviceStart { .. } => e,
                    other => MulticamError::DeviceStart {
                        device: handle.id.clone(),
                        message: other.to_string(),
                    },
                });
            }
        };

        tracing::debug!(
            device = %handle.id,
            backend = backend.name(),
            streams = channels.len(),
            "Session started"
        );

        Ok(Self {
            handle: handle.clone(),
            connection: Some(connection),
            channels,
        })
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }

    /// Consumer end of the channel for `stream`
    pub fn channel(&self, stream: &str) -> Result<FrameChannel> {
        self.channels
            .get(stream)
            .cloned()
            .ok_or_else(|| MulticamError::UnknownStream(stream.to_string()))
    }

    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(|k| k.as_str())
    }

    /// Whether the device side is still producing
    pub fn is_running(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| c.is_running())
            .unwrap_or(false)
    }

    pub fn is_stopped(&self) -> bool {
        self.connection.is_none()
    }

    pub fn device_stats(&self) -> DeviceStats {
        self.connection
            .as_ref()
            .map(|c| c.stats())
            .unwrap_or_default()
    }

    /// Close all channels and release the device; safe to call repeatedly
    pub fn stop(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        for channel in self.channels.values() {
            channel.close();
        }
        connection.stop();
        tracing::debug!(device = %self.handle.id, "Session stopped");
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.stop();
    }
}
