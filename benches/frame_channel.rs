//! Benchmarks for frame channel and frame reshaping
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use multicam_rs::backend::FrameChannel;
use multicam_rs::config::DropPolicy;
use multicam_rs::consumer::planar_to_interleaved;
use multicam_rs::{Frame, FrameLayout};

fn preview_frame(size: u32) -> Frame {
    let len = (size * size * 3) as usize;
    let data = (0..len).map(|i| (i % 251) as u8).collect();
    Frame::new(data, size, size, FrameLayout::Planar { channels: 3 }, 0)
}

fn bench_send_receive(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_send_receive");
    let frame = preview_frame(32);

    for policy in [DropPolicy::DropOldest, DropPolicy::DropNewest] {
        group.bench_with_input(
            BenchmarkId::new("roundtrip", policy),
            &policy,
            |b, &policy| {
                let channel = FrameChannel::new(4, policy);
                b.iter(|| {
                    channel.send(black_box(frame.clone())).unwrap();
                    black_box(channel.try_receive().unwrap())
                });
            },
        );
    }

    group.finish();
}

fn bench_overflow(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_overflow");
    let frame = preview_frame(32);

    for policy in [DropPolicy::DropOldest, DropPolicy::DropNewest] {
        group.bench_with_input(
            BenchmarkId::new("full_send", policy),
            &policy,
            |b, &policy| {
                let channel = FrameChannel::new(4, policy);
                for _ in 0..4 {
                    channel.send(frame.clone()).unwrap();
                }
                b.iter(|| black_box(channel.send(black_box(frame.clone())).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_planar_to_interleaved(c: &mut Criterion) {
    let mut group = c.benchmark_group("planar_to_interleaved");

    for size in [64u32, 300, 640] {
        let frame = preview_frame(size);
        group.throughput(Throughput::Bytes(frame.data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| black_box(planar_to_interleaved(black_box(frame)).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_send_receive,
    bench_overflow,
    bench_planar_to_interleaved,
);

criterion_main!(benches);
