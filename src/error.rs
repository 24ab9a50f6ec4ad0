//! Error handling for multicam-rs
//!
//! This module defines the crate error type and a Result alias used
//! throughout the library. Per-device failures are reported through
//! [`MulticamError`] values collected by the orchestrator; only
//! [`MulticamError::NoDeviceFound`] aborts a whole run.

use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for multicam-rs operations
#[derive(Error, Debug)]
pub enum MulticamError {
    /// Enumeration produced no devices; nothing can be driven
    #[error("No devices available")]
    NoDeviceFound,

    /// A device session could not be started
    #[error("Failed to start device {device}: {message}")]
    DeviceStart { device: String, message: String },

    /// A worker failed while entering its running state
    #[error("Worker for device {device} failed to start: {source}")]
    WorkerStart {
        device: String,
        #[source]
        source: Box<MulticamError>,
    },

    /// The frame channel was closed; expected at shutdown
    #[error("Channel closed")]
    ChannelClosed,

    /// A stream name that the graph template does not declare
    #[error("Unknown stream: {0}")]
    UnknownStream(String),

    /// Graph template construction errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Frame buffer does not match its declared layout
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors reported by a device backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<MulticamError>,
    },
}

impl MulticamError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        MulticamError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error is the normal end-of-stream signal
    pub fn is_channel_closed(&self) -> bool {
        match self {
            MulticamError::ChannelClosed => true,
            MulticamError::WithContext { source, .. } => source.is_channel_closed(),
            _ => false,
        }
    }
}

/// Result type alias for multicam-rs operations
pub type Result<T> = std::result::Result<T, MulticamError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
