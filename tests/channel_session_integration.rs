//! Integration tests for device sessions and their frame channels
//!
//! - A device that keeps producing while nobody receives keeps only the
//!   newest frames
//! - A device whose worker keeps receiving delivers frames in order

mod common;

use common::builders::BackendBuilder;
use common::consumers::{strictly_increasing, RecordingConsumer};
use common::{run_with_timeout, test_timeout};
use multicam_rs::backend::{DeviceSession, DeviceWorker, StopFlag, WorkerExit};
use multicam_rs::config::{ChannelConfig, DropPolicy};
use multicam_rs::pipeline::GraphTemplate;
use multicam_rs::DeviceHandle;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[test]
fn test_undrained_device_keeps_newest_frames() {
    let backend = BackendBuilder::new().limited("A", 5).limited("B", 5).build();
    let template = GraphTemplate::default_color_preview().unwrap();
    let channel_config = ChannelConfig {
        capacity: 4,
        drop_policy: DropPolicy::DropOldest,
    };

    let mut session_a =
        DeviceSession::start(&DeviceHandle::new("A"), &template, &*backend, &channel_config)
            .unwrap();
    let channel_a = session_a.channel("rgb").unwrap();

    // B runs under its own worker while A is left alone
    let recorder = Arc::new(RecordingConsumer::new().stop_when(|_, frame, _| frame.sequence >= 4));
    let worker_b = DeviceWorker::new(
        DeviceHandle::new("B"),
        Arc::new(template.clone()),
        backend.clone(),
        recorder.clone(),
        StopFlag::new(),
    )
    .with_channel_config(channel_config.clone());
    let report_b = run_with_timeout(test_timeout(), move || worker_b.run());

    assert_eq!(report_b.exit, WorkerExit::StopRequested);
    let received_b = recorder.sequences("B");
    assert_eq!(received_b.last(), Some(&4));
    assert!(strictly_increasing(&received_b));

    assert!(wait_until(Duration::from_secs(2), || {
        session_a.device_stats().frames_produced == 5
    }));

    let mut held_a = Vec::new();
    while let Some(frame) = channel_a.try_receive().unwrap() {
        held_a.push(frame.sequence);
    }
    // Five frames into capacity four: only the first is lost
    assert_eq!(held_a, vec![1, 2, 3, 4]);

    let stats = channel_a.stats();
    assert_eq!(stats.sent, 5);
    assert_eq!(stats.dropped, 1);

    session_a.stop();
    assert_eq!(backend.active_count(), 0);
}

#[test]
fn test_stop_flag_closes_session_channels() {
    let backend = BackendBuilder::new().stalled("A").build();
    let template = GraphTemplate::default_color_preview().unwrap();
    let session = DeviceSession::start(
        &DeviceHandle::new("A"),
        &template,
        &*backend,
        &ChannelConfig::default(),
    )
    .unwrap();
    let channel = session.channel("rgb").unwrap();

    let stop = StopFlag::new();
    stop.register_channel(&channel);

    let receiver = {
        let channel = channel.clone();
        thread::spawn(move || channel.receive())
    };
    thread::sleep(Duration::from_millis(20));
    assert!(stop.raise());

    let result = receiver.join().unwrap();
    assert!(result.unwrap_err().is_channel_closed());
    assert!(channel.is_closed());
}

#[test]
fn test_second_session_on_same_device_rejected() {
    let backend = BackendBuilder::new().device("A").build();
    let template = GraphTemplate::default_color_preview().unwrap();
    let config = ChannelConfig::default();

    let first =
        DeviceSession::start(&DeviceHandle::new("A"), &template, &*backend, &config)
            .unwrap();
    let second =
        DeviceSession::start(&DeviceHandle::new("A"), &template, &*backend, &config);
    assert!(second.is_err());

    drop(first);
    let third =
        DeviceSession::start(&DeviceHandle::new("A"), &template, &*backend, &config);
    assert!(third.is_ok());
}
