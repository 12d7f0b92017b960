//! Benchmarks for the mixing hot path.
//!
//! Run with: cargo bench --bench mix_bench -p sx-engine

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use sx_engine::{AudioBuffer, BufferUsage, Mixer};
use sx_ir::{DeviceFormat, SampleData};

const DEVICE: DeviceFormat = DeviceFormat { channels: 2, sample_rate: 48000 };
const PERIOD_FRAMES: usize = 1024;

/// A looping mono tone at `rate`, 0.1 s long.
fn tone(rate: u32) -> AudioBuffer {
    let frames = rate as usize / 10;
    let samples = (0..frames)
        .map(|i| ((i as f32 * 0.05).sin() * 16000.0) as i16)
        .collect();
    let mut buf =
        AudioBuffer::from_samples(SampleData::S16(samples), 1, rate, BufferUsage::Static, DEVICE)
            .unwrap();
    buf.set_looping(true);
    buf.play();
    buf
}

fn bench_render_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    for voices in [1usize, 8, 32].iter() {
        let mut mixer = Mixer::new(DEVICE).unwrap();
        for _ in 0..*voices {
            mixer.track(tone(44100));
        }
        let mut out = vec![0.0f32; DEVICE.samples(PERIOD_FRAMES)];

        group.bench_with_input(BenchmarkId::from_parameter(voices), voices, |b, _| {
            b.iter(|| {
                mixer.render(&mut out);
                black_box(&out);
            });
        });
    }

    group.finish();
}

fn bench_render_passthrough(c: &mut Criterion) {
    let mut mixer = Mixer::new(DEVICE).unwrap();
    for _ in 0..8 {
        mixer.track(tone(DEVICE.sample_rate));
    }
    let mut out = vec![0.0f32; DEVICE.samples(PERIOD_FRAMES)];

    c.bench_function("render_passthrough_8", |b| {
        b.iter(|| {
            mixer.render(&mut out);
            black_box(&out);
        });
    });
}

criterion_group!(benches, bench_render_voices, bench_render_passthrough);
criterion_main!(benches);
