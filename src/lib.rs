//! # multicam-rs: Multi-Device Camera Acquisition
//!
//! Drives every connected camera device concurrently. One processing graph
//! (a color camera feeding a named output stream) is described once and
//! started on each device; frames flow from the device through a bounded
//! channel to a per-device worker, which hands them to a shared consumer.
//!
//! ## Architecture
//!
//! - **Pipeline**: Immutable [`GraphTemplate`](pipeline::GraphTemplate) shared by all devices
//! - **Backend**: Device sessions, frame channels and one worker thread per device
//! - **Consumer**: User-supplied frame sink that may request a global stop
//! - **Communication**: Crossbeam channels with a drop-oldest policy by default
//!
//! Stopping is cooperative: any consumer decision or an external signal
//! raises the shared [`StopFlag`](backend::StopFlag), which also closes
//! every registered channel so that workers blocked on a stalled device
//! wake up.
//!
//! ## Configuration
//!
//! Settings are read from `config.toml` in the platform config directory
//! under `multicam-rs`:
//!
//! - **Linux**: `~/.config/multicam-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/multicam-rs/config.toml`
//! - **Windows**: `%APPDATA%\multicam-rs\config.toml`
//!
//! ## Example
//!
//! ```ignore
//! use multicam_rs::{
//!     backend::{create_backend, BackendKind, Orchestrator},
//!     config::AppConfig,
//!     consumer::{LimitConsumer, LoggingConsumer},
//! };
//! use std::sync::Arc;
//!
//! let config = AppConfig::load_or_default();
//! let backend = create_backend(BackendKind::Mock, &config)?;
//! let consumer = Arc::new(LimitConsumer::new(LoggingConsumer::default()).with_max_frames(100));
//!
//! let summary = Orchestrator::new(config, backend, consumer).run()?;
//! assert!(summary.all_stopped());
//! ```

pub mod backend;
pub mod config;
pub mod consumer;
pub mod error;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use backend::{Orchestrator, RunSummary, StopFlag, WorkerExit, WorkerReport};
pub use config::AppConfig;
pub use consumer::{ConsumerDecision, FrameConsumer};
pub use error::{MulticamError, Result};
pub use types::{DeviceHandle, Frame, FrameLayout, WorkerState};
