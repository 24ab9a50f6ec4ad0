//! Video4Linux capture backend
//!
//! Enumerates `/dev/video*` nodes that advertise video capture and streams
//! YUYV frames through a memory-mapped buffer queue. Only the first stream
//! declared by the template is fed; its dimensions select the capture format.
//!
//! A device that disappears (unplugged, driver reset) or keeps failing to
//! dequeue ends its stream: the capture loop closes the output channel, so
//! the worker sees a closed channel instead of waiting forever.

use super::capture_loop::{CaptureLoop, LoopAction};
use super::device_trait::{DeviceBackend, DeviceConnection, DeviceStats, StreamOutputs};
use crate::error::{MulticamError, Result};
use crate::pipeline::GraphTemplate;
use crate::types::{DeviceHandle, Frame, FrameLayout};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

const BUFFER_COUNT: u32 = 4;
/// Bounds how long a stopped loop can stay blocked in `next()`
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(200);
/// Failed dequeues in a row before the stream is given up
const MAX_CONSECUTIVE_ERRORS: u32 = 10;
/// `ENODEV` on Linux
const ENODEV: i32 = 19;

/// Whether a dequeue error means the device node is gone
fn is_device_gone(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(ENODEV)
        || matches!(
            e.kind(),
            std::io::ErrorKind::NotFound | std::io::ErrorKind::BrokenPipe
        )
}

/// Backend for V4L2 capture devices
#[derive(Debug, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }

    fn device_nodes() -> Vec<PathBuf> {
        let mut nodes: Vec<PathBuf> = std::fs::read_dir("/dev")
            .into_iter()
            .flatten()
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("video"))
            })
            .collect();
        nodes.sort();
        nodes
    }
}

impl DeviceBackend for V4l2Backend {
    fn name(&self) -> &str {
        "v4l2"
    }

    fn enumerate(&self) -> Result<Vec<DeviceHandle>> {
        let mut devices = Vec::new();
        for path in Self::device_nodes() {
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
                continue;
            }
            tracing::debug!(path = %path.display(), card = %caps.card, driver = %caps.driver, "Found capture device");
            devices.push(DeviceHandle::new(path.to_string_lossy()).with_name(caps.card));
        }
        Ok(devices)
    }

    fn open(
        &self,
        handle: &DeviceHandle,
        template: &GraphTemplate,
        outputs: StreamOutputs,
    ) -> Result<Box<dyn DeviceConnection>> {
        let start_error = |message: String| MulticamError::DeviceStart {
            device: handle.id.clone(),
            message,
        };

        let spec = template
            .streams()
            .iter()
            .find(|s| outputs.get(&s.name).is_some())
            .cloned()
            .ok_or_else(|| start_error("template declares no output stream".to_string()))?;
        let tx = outputs
            .get(&spec.name)
            .cloned()
            .ok_or_else(|| start_error(format!("no output for stream {}", spec.name)))?;

        // Configure the format up front so an unusable device fails here
        let dev = Device::with_path(&handle.id)
            .map_err(|e| start_error(format!("failed to open device: {}", e)))?;
        let format = dev
            .set_format(&Format::new(spec.width, spec.height, FourCC::new(b"YUYV")))
            .map_err(|e| start_error(format!("failed to set format: {}", e)))?;
        if format.fourcc != FourCC::new(b"YUYV") {
            return Err(start_error(format!(
                "device does not support YUYV (got {})",
                format.fourcc
            )));
        }
        tracing::info!(
            device = %handle.id,
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "V4L2 format configured"
        );

        let produced = Arc::new(AtomicU64::new(0));
        let errors = Arc::new(AtomicU64::new(0));
        let thread_produced = Arc::clone(&produced);
        let thread_errors = Arc::clone(&errors);
        let label = handle.id.clone();
        let (width, height) = (format.width, format.height);
        let mut consecutive_errors: u32 = 0;

        let capture = CaptureLoop::start_with_init(
            &format!("v4l2-{}", handle.id.trim_start_matches("/dev/")),
            move || {
                let mut stream = Stream::with_buffers(&dev, Type::VideoCapture, BUFFER_COUNT)
                    .map_err(|e| MulticamError::Backend(format!("failed to create stream: {}", e)))?;
                stream.set_timeout(DEQUEUE_TIMEOUT);
                Ok((dev, stream))
            },
            move |(_dev, stream): &mut (Device, Stream<'static>)| {
                let (buf, meta) = match stream.next() {
                    Ok(frame) => {
                        consecutive_errors = 0;
                        frame
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                        return if tx.is_closed() {
                            LoopAction::Stop
                        } else {
                            LoopAction::Continue
                        };
                    }
                    Err(e) => {
                        thread_errors.fetch_add(1, Ordering::Relaxed);
                        consecutive_errors += 1;
                        if is_device_gone(&e) || consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                            tracing::error!(
                                device = %label,
                                error = %e,
                                consecutive = consecutive_errors,
                                "Capture stream lost, closing output"
                            );
                            tx.close();
                            return LoopAction::Stop;
                        }
                        tracing::warn!(device = %label, error = %e, "Failed to capture frame");
                        return LoopAction::Continue;
                    }
                };

                let used = (meta.bytesused as usize).min(buf.len());
                let sequence = thread_produced.fetch_add(1, Ordering::Relaxed);
                let frame = Frame::new(buf[..used].to_vec(), width, height, FrameLayout::Yuyv, sequence);
                match tx.send(frame) {
                    Ok(_) => LoopAction::Continue,
                    Err(_) => LoopAction::Stop,
                }
            },
        )
        .map_err(|e| start_error(e.to_string()))?;

        Ok(Box::new(V4l2Connection {
            id: handle.id.clone(),
            capture,
            produced,
            errors,
        }))
    }
}

struct V4l2Connection {
    id: String,
    capture: CaptureLoop,
    produced: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
}

impl DeviceConnection for V4l2Connection {
    fn stop(&mut self) {
        self.capture.stop();
        tracing::debug!(device = %self.id, "V4L2 device released");
    }

    fn is_running(&self) -> bool {
        self.capture.is_running()
    }

    fn stats(&self) -> DeviceStats {
        DeviceStats {
            frames_produced: self.produced.load(Ordering::Relaxed),
            capture_errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl Drop for V4l2Connection {
    fn drop(&mut self) {
        self.capture.stop();
    }
}
