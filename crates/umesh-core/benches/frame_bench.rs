use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use umesh_core::frame::FrameEncoder;
use umesh_core::types::{Eui48, NetworkId};
use umesh_core::FrameHeader;

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    for size in [0usize, 64, 256, 512] {
        let payload = vec![0xA5u8; size];
        let mut encoder = FrameEncoder::new(Eui48::new([2; 6]), NetworkId::new([9; 6]));
        let dest = Eui48::new([3; 6]);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("make_frame", size), &payload, |b, p| {
            b.iter(|| encoder.make_frame(&dest, p).unwrap());
        });

        let frame = encoder.make_frame(&dest, &payload).unwrap();
        group.bench_with_input(BenchmarkId::new("parse_header", size), &frame, |b, f| {
            b.iter(|| FrameHeader::parse(f).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_frame);
criterion_main!(benches);
