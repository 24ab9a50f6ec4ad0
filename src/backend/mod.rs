//! Backend module for multi-device frame acquisition
//!
//! Every enumerated device is driven by its own worker thread. Devices
//! produce frames into bounded per-stream channels; workers receive from
//! those channels and hand frames to a shared consumer.
//!
//! # Architecture
//!
//! - [`DeviceBackend`] / [`DeviceConnection`] - Seam to the hardware (or mock) layer
//! - [`DeviceSession`] - One graph template started on one device
//! - [`FrameChannel`] - Bounded, lossy, closable queue between device and worker
//! - [`DeviceWorker`] - Per-device state machine (`Starting → Running → Draining → Stopped`)
//! - [`StopFlag`] - Write-once signal shared by all workers
//! - [`Orchestrator`] - Enumerates, spawns, joins and summarizes
//!
//! # Components
//!
//! - [`MockDeviceBackend`] - Synthetic devices for tests and demos
//! - `V4l2Backend` - Video4Linux capture devices (feature `v4l2`, Linux only)
//!
//! # Example
//!
//! ```ignore
//! use multicam_rs::backend::{create_backend, BackendKind, Orchestrator};
//! use multicam_rs::config::AppConfig;
//! use multicam_rs::consumer::LoggingConsumer;
//! use std::sync::Arc;
//!
//! let config = AppConfig::default();
//! let backend = create_backend(BackendKind::Mock, &config)?;
//! let orchestrator = Orchestrator::new(config, backend, Arc::new(LoggingConsumer::default()));
//!
//! let stop = orchestrator.stop_flag();
//! ctrlc::set_handler(move || { stop.raise(); })?;
//!
//! let summary = orchestrator.run()?;
//! ```

pub mod capture_loop;
pub mod channel;
pub mod device_trait;
pub mod mock_device;
pub mod orchestrator;
pub mod session;
pub mod stop;
#[cfg(all(feature = "v4l2", target_os = "linux"))]
pub mod v4l2;
pub mod worker;

pub use capture_loop::{CaptureLoop, LoopAction};
pub use channel::{ChannelStats, FrameChannel, FrameSender, SendOutcome};
pub use device_trait::{DeviceBackend, DeviceConnection, DeviceStats, StreamOutputs};
pub use mock_device::{MockDeviceBackend, MockDeviceConfig, MockFramePattern};
pub use orchestrator::{Orchestrator, RunSummary};
pub use session::DeviceSession;
pub use stop::StopFlag;
#[cfg(all(feature = "v4l2", target_os = "linux"))]
pub use v4l2::V4l2Backend;
pub use worker::{DeviceWorker, WorkerExit, WorkerProgress, WorkerReport};

use crate::config::AppConfig;
use crate::error::{MulticamError, Result, ResultExt};
use crate::types::DeviceHandle;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// List the devices `backend` can drive
///
/// Duplicate ids are reported once. An empty result is an error: there is
/// nothing to run.
pub fn enumerate_devices(backend: &dyn DeviceBackend) -> Result<Vec<DeviceHandle>> {
    let found = backend
        .enumerate()
        .with_context(|| format!("Enumerating {} devices", backend.name()))?;

    let mut seen = HashSet::new();
    let mut devices = Vec::with_capacity(found.len());
    for device in found {
        if seen.insert(device.id.clone()) {
            tracing::debug!(device = %device, "Found device");
            devices.push(device);
        } else {
            tracing::warn!(device = %device.id, "Duplicate device id ignored");
        }
    }

    if devices.is_empty() {
        tracing::warn!(backend = backend.name(), "No devices found");
        return Err(MulticamError::NoDeviceFound);
    }
    Ok(devices)
}

/// Which device layer to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Mock,
    V4l2,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Mock => write!(f, "mock"),
            BackendKind::V4l2 => write!(f, "v4l2"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = MulticamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(BackendKind::Mock),
            "v4l2" | "v4l" => Ok(BackendKind::V4l2),
            other => Err(MulticamError::Config(format!("unknown backend: {}", other))),
        }
    }
}

/// Instantiate the backend selected by `kind`
pub fn create_backend(kind: BackendKind, config: &AppConfig) -> Result<Arc<dyn DeviceBackend>> {
    match kind {
        BackendKind::Mock => Ok(Arc::new(MockDeviceBackend::from_config(&config.mock))),
        #[cfg(all(feature = "v4l2", target_os = "linux"))]
        BackendKind::V4l2 => Ok(Arc::new(V4l2Backend::new())),
        #[cfg(not(all(feature = "v4l2", target_os = "linux")))]
        BackendKind::V4l2 => Err(MulticamError::Backend(
            "v4l2 support not compiled in (enable the `v4l2` feature on Linux)".to_string(),
        )),
    }
}
