//! Orchestrator: enumerate devices, run one worker per device, join them
//!
//! The orchestrator builds the graph template once and shares it read-only
//! with every worker. Workers run on named threads (`device-<id>`) and share
//! one [`StopFlag`]; there is no other coordination between them.
//!
//! `run()` returns after every worker has stopped and the consumer's
//! `teardown()` has been called exactly once. A worker thread that panics
//! is reported as [`WorkerExit::Panicked`] with the states and frame count
//! it had recorded before the panic.

use super::device_trait::DeviceBackend;
use super::enumerate_devices;
use super::stop::StopFlag;
use super::worker::{DeviceWorker, WorkerExit, WorkerReport};
use crate::config::AppConfig;
use crate::consumer::FrameConsumer;
use crate::error::{MulticamError, Result, ResultExt};
use crate::pipeline::GraphTemplate;
use crate::types::WorkerState;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use tracing::{error, info, warn};

/// Aggregate outcome of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub workers: Vec<WorkerReport>,
}

impl RunSummary {
    /// Whether every worker reached `Stopped`
    pub fn all_stopped(&self) -> bool {
        self.workers.iter().all(|w| w.state == WorkerState::Stopped)
    }

    /// Reports of workers that ended with a failure
    pub fn failed(&self) -> impl Iterator<Item = &WorkerReport> {
        self.workers.iter().filter(|w| w.exit.is_failure())
    }

    pub fn total_frames(&self) -> u64 {
        self.workers.iter().map(|w| w.frames_received).sum()
    }

    pub fn worker(&self, device: &str) -> Option<&WorkerReport> {
        self.workers.iter().find(|w| w.device == device)
    }
}

/// Drives all enumerated devices to completion
pub struct Orchestrator {
    config: AppConfig,
    backend: Arc<dyn DeviceBackend>,
    consumer: Arc<dyn FrameConsumer>,
    template: Option<GraphTemplate>,
    stop: StopFlag,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        backend: Arc<dyn DeviceBackend>,
        consumer: Arc<dyn FrameConsumer>,
    ) -> Self {
        Self {
            config,
            backend,
            consumer,
            template: None,
            stop: StopFlag::new(),
        }
    }

    /// Use `template` instead of the color preview built from the config
    pub fn with_template(mut self, template: GraphTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Handle for requesting a stop from outside the run (e.g. a signal handler)
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Run every device until all workers have stopped
    ///
    /// Fails only when no device is available or the template cannot be
    /// built; per-device failures are recorded in the summary.
    pub fn run(self) -> Result<RunSummary> {
        let devices = enumerate_devices(self.backend.as_ref())?;

        let template = match self.template {
            Some(template) => template,
            None => GraphTemplate::color_preview(&self.config.camera)
                .map_err(MulticamError::from)
                .context("Building graph template")?,
        };
        let template = Arc::new(template);

        info!(
            backend = self.backend.name(),
            devices = devices.len(),
            stream = %self.config.camera.stream_name,
            "Launching device workers"
        );

        let mut handles = Vec::with_capacity(devices.len());
        let mut reports = Vec::with_capacity(devices.len());

        for device in devices {
            let id = device.id.clone();
            let worker = DeviceWorker::new(
                device,
                Arc::clone(&template),
                Arc::clone(&self.backend),
                Arc::clone(&self.consumer),
                self.stop.clone(),
            )
            .with_channel_config(self.config.channel.clone())
            .with_stream(self.config.camera.stream_name.clone());
            let progress = worker.progress();

            match thread::Builder::new()
                .name(format!("device-{}", id))
                .spawn(move || worker.run())
            {
                Ok(handle) => handles.push((id, progress, handle)),
                Err(e) => {
                    error!(device = %id, error = %e, "Failed to spawn worker thread");
                    reports.push(WorkerReport::failed(
                        id,
                        WorkerExit::StartFailed(e.to_string()),
                    ));
                }
            }
        }

        for (id, progress, handle) in handles {
            let report = handle.join().unwrap_or_else(|panic| {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(device = %id, panic = %message, "Worker panicked");
                WorkerReport::interrupted(id, &progress, WorkerExit::Panicked(message))
            });
            reports.push(report);
        }

        self.consumer.teardown();

        let summary = RunSummary { workers: reports };
        let failed = summary.failed().count();
        if failed > 0 {
            warn!(
                failed,
                total = summary.workers.len(),
                "Some devices did not run"
            );
        }
        info!(
            workers = summary.workers.len(),
            frames = summary.total_frames(),
            "All workers stopped"
        );
        Ok(summary)
    }
}
