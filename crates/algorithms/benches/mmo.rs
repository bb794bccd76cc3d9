use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use zbsec_algorithms::{aes_mmo_128, CryptoEngine};

fn bench_aes_mmo(c: &mut Criterion) {
    let mut group = c.benchmark_group("AES-MMO-128");
    for size in [16usize, 64, 256, 1024] {
        let input = vec![0x5Au8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("hash", size), &input, |b, input| {
            b.iter(|| aes_mmo_128(black_box(input)))
        });
    }
    group.finish();
}

fn bench_keyed_hash(c: &mut Criterion) {
    let engine = CryptoEngine::software();
    let key = [0x40u8; 16];
    c.bench_function("keyed hash (key-transport key)", |b| {
        b.iter(|| engine.keyed_hash(black_box(&key), 0x00))
    });
}

criterion_group!(benches, bench_aes_mmo, bench_keyed_hash);
criterion_main!(benches);
