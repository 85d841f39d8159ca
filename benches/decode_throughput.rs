//! Benchmarks for the per-datagram decode path
//!
//! Covers payload extraction, field unpacking, and the composed decoder on
//! representative flight frames, plus the framing failure paths that noisy
//! links hit most often.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use groundlink::Decoder;
use groundlink::codec::{FieldUnpacker, FrameExtractor};
use groundlink::test_utils::{flight_frame, sample_frame};
use std::hint::black_box;
use std::sync::Arc;

fn bench_stages(c: &mut Criterion) {
    let frame = sample_frame();
    let decoder = Decoder::flight().expect("flight schema");
    let extractor = FrameExtractor::default();
    let unpacker = FieldUnpacker::new(Arc::clone(decoder.schema()));
    let payload = extractor.extract(&frame).expect("valid frame").to_vec();

    let mut group = c.benchmark_group("decode_stages");
    group.throughput(Throughput::Bytes(frame.len() as u64));

    group.bench_function("extract", |b| b.iter(|| black_box(extractor.extract(black_box(&frame)))));
    group.bench_function("unpack", |b| b.iter(|| black_box(unpacker.unpack(black_box(&payload)))));
    group.bench_function("decode", |b| b.iter(|| black_box(decoder.decode(black_box(&frame)))));

    group.finish();
}

fn bench_leading_noise(c: &mut Criterion) {
    let decoder = Decoder::flight().expect("flight schema");
    let mut group = c.benchmark_group("decode_with_leading_noise");

    for noise in [0usize, 64, 512, 1000] {
        let mut datagram = vec![0x11u8; noise];
        datagram.extend_from_slice(&flight_frame(&[("Az", -1.6)]));
        group.throughput(Throughput::Bytes(datagram.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(noise), &datagram, |b, datagram| {
            b.iter(|| black_box(decoder.decode(black_box(datagram))))
        });
    }

    group.finish();
}

fn bench_rejections(c: &mut Criterion) {
    let decoder = Decoder::flight().expect("flight schema");
    let no_sync = vec![0x42u8; 1024];
    let mut no_terminator = vec![0x5E, 0xD5];
    no_terminator.extend_from_slice(&[0x42u8; 1022]);

    let mut group = c.benchmark_group("decode_rejections");
    group.bench_function("sync_not_found_1k", |b| {
        b.iter(|| black_box(decoder.decode(black_box(&no_sync))))
    });
    group.bench_function("terminator_not_found_1k", |b| {
        b.iter(|| black_box(decoder.decode(black_box(&no_terminator))))
    });
    group.finish();
}

criterion_group!(benches, bench_stages, bench_leading_noise, bench_rejections);
criterion_main!(benches);
