use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use zbsec_accel::AcceleratedBackend;
use zbsec_algorithms::CryptoEngine;
use zbsec_api::MicLength;

fn engines() -> [(&'static str, CryptoEngine); 2] {
    [
        ("software", CryptoEngine::software()),
        ("accelerated", CryptoEngine::new(Box::new(AcceleratedBackend::new()))),
    ]
}

fn bench_ccm_star(c: &mut Criterion) {
    let mut group = c.benchmark_group("CCM*");
    let key = [0x4Bu8; 16];
    let nonce = [0x01u8; 13];
    let aad = [0xAAu8; 24];

    // typical APS payloads up to a full NWK frame
    for size in [16usize, 64, 82].iter() {
        let data = vec![0u8; *size];
        group.throughput(Throughput::Bytes(*size as u64));
        for (name, engine) in engines() {
            group.bench_with_input(BenchmarkId::new(format!("{name}/seal"), size), size, |b, _| {
                b.iter(|| {
                    let _ = engine.ccm_encrypt_and_authenticate(&key, &nonce, MicLength::M4, &aad, &data);
                });
            });
            let sealed = engine
                .ccm_encrypt_and_authenticate(&key, &nonce, MicLength::M4, &aad, &data)
                .unwrap();
            group.bench_with_input(BenchmarkId::new(format!("{name}/open"), size), size, |b, _| {
                b.iter(|| {
                    let _ = engine.ccm_decrypt_and_authenticate(&key, &nonce, MicLength::M4, &aad, &sealed);
                });
            });
        }
    }

    group.finish();
}

fn bench_aes_mmo(c: &mut Criterion) {
    let mut group = c.benchmark_group("AES-MMO");
    let engine = CryptoEngine::software();
    let code = hex::decode("83FED3407A939723A5C639B26916D505C3B5").unwrap();
    for size in [16usize, 64, 256].iter() {
        let data = vec![0x5Au8; *size];
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("hash", size), size, |b, _| {
            b.iter(|| {
                let _ = engine.aes_mmo_128(&data);
            });
        });
    }
    group.bench_function("install-code-key", |b| {
        b.iter(|| {
            let _ = engine.install_code_key(&code);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_ccm_star, bench_aes_mmo);
criterion_main!(benches);
