//! Device Worker Implementation
//!
//! One [`DeviceWorker`] runs per enumerated device, each on its own thread.
//! The worker owns its [`DeviceSession`] and drives it through
//! `Starting → Running → Draining → Stopped`.
//!
//! # Running loop
//!
//! Each iteration first checks the shared [`StopFlag`], then blocks in a
//! single `receive()` on the session's output channel. A received frame is
//! handed to the consumer; if the consumer answers
//! [`ConsumerDecision::Stop`], the worker raises the flag for everyone.
//!
//! The worker registers its channel with the flag, so a stop raised by a
//! sibling closes the channel and the blocked `receive()` returns
//! [`MulticamError::ChannelClosed`] even when the device has stalled.
//!
//! # Failure isolation
//!
//! A session that fails to start, or a stream the template does not
//! declare, ends only this worker. The failure is recorded in the
//! returned [`WorkerReport`]; siblings keep running.
//!
//! A device that closes its own channel (end of stream, device lost) ends
//! the worker with [`WorkerExit::ChannelClosed`] without stopping anyone
//! else.
//!
//! State history and the frame count live in a [`WorkerProgress`] shared
//! with the orchestrator, so they are still reported if the worker thread
//! panics.

use super::channel::{ChannelStats, FrameChannel};
use super::device_trait::DeviceBackend;
use super::session::DeviceSession;
use super::stop::StopFlag;
use crate::config::ChannelConfig;
use crate::consumer::{ConsumerDecision, FrameConsumer};
use crate::error::MulticamError;
use crate::pipeline::GraphTemplate;
use crate::types::{DeviceHandle, WorkerState};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, trace};

/// Why a worker left its running loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum WorkerExit {
    /// The shared stop flag was raised
    StopRequested,
    /// The channel closed without a stop request
    ChannelClosed,
    /// The device session could not be started
    StartFailed(String),
    /// The requested stream was unavailable
    StreamFailed(String),
    /// The worker thread panicked
    Panicked(String),
}

impl WorkerExit {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            WorkerExit::StartFailed(_) | WorkerExit::StreamFailed(_) | WorkerExit::Panicked(_)
        )
    }
}

/// Live record of a worker's states and received frames
#[derive(Debug)]
pub struct WorkerProgress {
    history: Mutex<Vec<WorkerState>>,
    frames_received: AtomicU64,
}

impl Default for WorkerProgress {
    fn default() -> Self {
        Self {
            history: Mutex::new(vec![WorkerState::Starting]),
            frames_received: AtomicU64::new(0),
        }
    }
}

impl WorkerProgress {
    pub fn history(&self) -> Vec<WorkerState> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn state(&self) -> WorkerState {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .copied()
            .unwrap_or(WorkerState::Starting)
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::SeqCst)
    }

    fn enter(&self, state: WorkerState) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(state);
    }

    fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::SeqCst);
    }
}

/// Outcome of one worker, collected by the orchestrator
#[derive(Debug, Clone, Serialize)]
pub struct WorkerReport {
    pub device: String,
    pub state: WorkerState,
    /// Every state the worker entered, in order
    pub history: Vec<WorkerState>,
    pub frames_received: u64,
    pub exit: WorkerExit,
    pub channel: Option<ChannelStats>,
}

impl WorkerReport {
    /// Report for a worker that never ran its loop
    pub fn failed(device: impl Into<String>, exit: WorkerExit) -> Self {
        Self {
            device: device.into(),
            state: WorkerState::Stopped,
            history: vec![WorkerState::Stopped],
            frames_received: 0,
            exit,
            channel: None,
        }
    }

    /// Report for a worker that died mid-run, built from what it recorded
    ///
    /// The history is closed with `Stopped`; channel counters are lost.
    pub fn interrupted(
        device: impl Into<String>,
        progress: &WorkerProgress,
        exit: WorkerExit,
    ) -> Self {
        let mut history = progress.history();
        if history.last() != Some(&WorkerState::Stopped) {
            history.push(WorkerState::Stopped);
        }
        Self {
            device: device.into(),
            state: WorkerState::Stopped,
            history,
            frames_received: progress.frames_received(),
            exit,
            channel: None,
        }
    }
}

/// Per-device acquisition loop
pub struct DeviceWorker {
    handle: DeviceHandle,
    template: Arc<GraphTemplate>,
    backend: Arc<dyn DeviceBackend>,
    consumer: Arc<dyn FrameConsumer>,
    stop: StopFlag,
    channel_config: ChannelConfig,
    stream_name: String,
    progress: Arc<WorkerProgress>,
}

impl DeviceWorker {
    pub fn new(
        handle: DeviceHandle,
        template: Arc<GraphTemplate>,
        backend: Arc<dyn DeviceBackend>,
        consumer: Arc<dyn FrameConsumer>,
        stop: StopFlag,
    ) -> Self {
        Self {
            handle,
            template,
            backend,
            consumer,
            stop,
            channel_config: ChannelConfig::default(),
            stream_name: crate::config::DEFAULT_STREAM_NAME.to_string(),
            progress: Arc::new(WorkerProgress::default()),
        }
    }

    pub fn with_channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = config;
        self
    }

    /// Stream to receive from
    pub fn with_stream(mut self, stream_name: impl Into<String>) -> Self {
        self.stream_name = stream_name.into();
        self
    }

    pub fn state(&self) -> WorkerState {
        self.progress.state()
    }

    /// Shared view of this worker's progress
    pub fn progress(&self) -> Arc<WorkerProgress> {
        Arc::clone(&self.progress)
    }

    pub fn label(&self) -> &str {
        self.handle.label()
    }

    fn transition(&self, next: WorkerState) {
        debug!(device = %self.handle.id, from = %self.state(), to = %next, "Worker state");
        self.progress.enter(next);
    }

    fn report(self, exit: WorkerExit, channel: Option<ChannelStats>) -> WorkerReport {
        WorkerReport {
            state: self.progress.state(),
            history: self.progress.history(),
            frames_received: self.progress.frames_received(),
            device: self.handle.id,
            exit,
            channel,
        }
    }

    /// Run the worker to completion
    pub fn run(self) -> WorkerReport {
        info!(device = %self.handle, "Worker starting");

        let mut session = match DeviceSession::start(
            &self.handle,
            &self.template,
            self.backend.as_ref(),
            &self.channel_config,
        ) {
            Ok(session) => session,
            Err(e) => {
                let e = MulticamError::WorkerStart {
                    device: self.handle.id.clone(),
                    source: Box::new(e),
                };
                error!(device = %self.handle.id, error = %e, "Worker failed to start");
                self.transition(WorkerState::Stopped);
                return self.report(WorkerExit::StartFailed(e.to_string()), None);
            }
        };

        let channel = match session.channel(&self.stream_name) {
            Ok(channel) => channel,
            Err(e) => {
                error!(device = %self.handle.id, error = %e, "Stream unavailable");
                self.transition(WorkerState::Draining);
                session.stop();
                self.transition(WorkerState::Stopped);
                return self.report(WorkerExit::StreamFailed(e.to_string()), None);
            }
        };

        self.stop.register_channel(&channel);
        info!(device = %self.handle.id, "Device initialized");
        self.transition(WorkerState::Running);

        let exit = self.receive_loop(&channel);

        self.transition(WorkerState::Draining);
        self.stop.unregister_channel(&channel);
        session.stop();
        let stats = channel.stats();
        self.transition(WorkerState::Stopped);

        info!(
            device = %self.handle.id,
            frames = self.progress.frames_received(),
            dropped = stats.dropped,
            exit = ?exit,
            "Worker stopped"
        );
        self.report(exit, Some(stats))
    }

    fn receive_loop(&self, channel: &FrameChannel) -> WorkerExit {
        loop {
            if self.stop.is_raised() {
                return WorkerExit::StopRequested;
            }

            match channel.receive() {
                Ok(frame) => {
                    self.progress.frame_received();
                    trace!(device = %self.handle.id, sequence = frame.sequence, "New frame received");

                    if self.consumer.on_frame(self.handle.label(), frame) == ConsumerDecision::Stop
                    {
                        info!(device = %self.handle.id, "Consumer requested stop");
                        self.stop.raise();
                    }
                }
                Err(e) if e.is_channel_closed() => {
                    if self.stop.is_raised() {
                        return WorkerExit::StopRequested;
                    }
                    info!(device = %self.handle.id, "Device closed its stream");
                    return WorkerExit::ChannelClosed;
                }
                Err(e) => return WorkerExit::StreamFailed(e.to_string()),
            }
        }
    }
}
