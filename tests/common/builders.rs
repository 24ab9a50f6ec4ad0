//! Test data builders for backends and configs

use multicam_rs::backend::{MockDeviceBackend, MockDeviceConfig};
use multicam_rs::config::{AppConfig, DropPolicy};
use std::sync::Arc;
use std::time::Duration;

/// Builder for a mock backend with a handful of devices
pub struct BackendBuilder {
    devices: Vec<MockDeviceConfig>,
    interval: Duration,
}

impl BackendBuilder {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            interval: Duration::from_millis(1),
        }
    }

    /// Interval applied to devices added after this call
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn device(mut self, id: &str) -> Self {
        self.devices
            .push(MockDeviceConfig::new(id).with_interval(self.interval));
        self
    }

    /// Device that produces nothing after `limit` frames
    pub fn limited(mut self, id: &str, limit: u64) -> Self {
        self.devices.push(
            MockDeviceConfig::new(id)
                .with_interval(self.interval)
                .with_frame_limit(limit),
        );
        self
    }

    /// Device that closes its stream after `frames` frames
    pub fn ending(mut self, id: &str, frames: u64) -> Self {
        self.devices.push(
            MockDeviceConfig::new(id)
                .with_interval(self.interval)
                .with_end_of_stream(frames),
        );
        self
    }

    pub fn stalled(mut self, id: &str) -> Self {
        self.devices.push(MockDeviceConfig::new(id).stalled());
        self
    }

    pub fn failing(mut self, id: &str) -> Self {
        self.devices.push(MockDeviceConfig::new(id).failing());
        self
    }

    pub fn build(self) -> Arc<MockDeviceBackend> {
        Arc::new(MockDeviceBackend::new(self.devices))
    }
}

/// Default config with the given channel settings
pub fn config_with_channel(capacity: usize, policy: DropPolicy) -> AppConfig {
    let mut config = AppConfig::default();
    config.channel.capacity = capacity;
    config.channel.drop_policy = policy;
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use multicam_rs::backend::DeviceBackend;

    #[test]
    fn test_backend_builder() {
        let backend = BackendBuilder::new().device("A").stalled("B").build();
        let ids: Vec<_> = backend
            .enumerate()
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["A", "B"]);
    }
}
