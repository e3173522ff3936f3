use biosig_hal::acquisition::{reshape, SampleBuffer};
use biosig_hal::decode::delta::{encode_absolute_frame, encode_delta_frame, GanglionDecoder};
use biosig_hal::decode::fixed_point::{FixedPointDecoder, PackageFields, TemperatureEncoding, PACKAGES_PER_TRANSACTION};
use biosig_hal::Sample;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const CAPACITIES: &[usize] = &[1_000, 45_000, 450_000];
const RETRIEVAL_SIZES: &[usize] = &[64, 1_024, 16_384];

fn xr_transaction() -> Vec<u8> {
    (0..PACKAGES_PER_TRANSACTION)
        .flat_map(|i| {
            PackageFields {
                index: i as u8,
                eda: 0.7,
                counts: [12_345; 16],
                battery: 90,
                temperature_centi: 3600,
                ppg_red: 1,
                ppg_ir: 2,
                device_time_us: i as f64 * 4000.0,
            }
            .encode()
        })
        .collect()
}

fn benchmark_sample_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_buffer");

    for &capacity in CAPACITIES {
        group.throughput(Throughput::Elements(1000));
        group.bench_with_input(BenchmarkId::new("push_with_eviction", capacity), &capacity, |b, &capacity| {
            let buffer = SampleBuffer::new(capacity, 22).unwrap();
            let sample = Sample::zeroed(22, 0.0);
            b.iter(|| {
                for _ in 0..1000 {
                    buffer.push(black_box(sample.clone()));
                }
            });
        });
    }

    for &n in RETRIEVAL_SIZES {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("peek", n), &n, |b, &n| {
            let buffer = SampleBuffer::new(n, 22).unwrap();
            for i in 0..n {
                buffer.push(Sample::zeroed(22, i as f64));
            }
            b.iter(|| black_box(buffer.peek(n)));
        });
    }

    group.finish();
}

fn benchmark_decoders(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoders");

    let transaction = xr_transaction();
    let decoder = FixedPointDecoder::new(TemperatureEncoding::Signed);
    group.throughput(Throughput::Elements(PACKAGES_PER_TRANSACTION as u64));
    group.bench_function("fixed_point_transaction", |b| {
        let mut out = Vec::with_capacity(PACKAGES_PER_TRANSACTION);
        b.iter(|| {
            out.clear();
            decoder.decode_transaction(black_box(&transaction), 0.0, &mut out)
        });
    });

    let start = [0, 0, 0, 0];
    let absolute = encode_absolute_frame(start);
    let delta = encode_delta_frame(101, start, [-2; 4], [-1; 4], 0).unwrap();
    group.throughput(Throughput::Elements(2));
    group.bench_function("ganglion_delta_frame", |b| {
        let mut decoder = GanglionDecoder::new();
        let mut out = Vec::with_capacity(4);
        decoder.decode(&absolute, 0.0, &mut out).unwrap();
        b.iter(|| {
            out.clear();
            decoder.decode(black_box(&delta), 0.0, &mut out)
        });
    });

    group.finish();
}

fn benchmark_reshape(c: &mut Criterion) {
    let mut group = c.benchmark_group("reshape");
    for &n in RETRIEVAL_SIZES {
        let samples: Vec<Sample> = (0..n).map(|i| Sample::zeroed(22, i as f64)).collect();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &samples, |b, samples| {
            b.iter(|| reshape(black_box(samples), 22));
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_sample_buffer, benchmark_decoders, benchmark_reshape);
criterion_main!(benches);
