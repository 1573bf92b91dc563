//! 内存后端性能基准测试

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main,
};
use shortener::storage::{KeyGenerator, MemoryBackend, Record, StorageBackend, Store};
use tokio_util::sync::CancellationToken;

fn bench_new_short(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let counter = AtomicU64::new(0);

    c.bench_function("memory/new_short", |b| {
        b.to_async(&rt).iter(|| {
            let backend = Arc::clone(&backend);
            let i = counter.fetch_add(1, Ordering::Relaxed);
            async move {
                backend
                    .new_short(
                        &CancellationToken::new(),
                        &format!("https://bench-{}.example/", i),
                        None,
                    )
                    .await
                    .unwrap()
            }
        });
    });
}

fn bench_get_by_key(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("memory/get_by_key");
    group.throughput(Throughput::Elements(1));

    for size in [1_000, 100_000] {
        let backend = Arc::new(MemoryBackend::new());
        let key = rt.block_on(async {
            let cancel = CancellationToken::new();
            let mut last = None;
            for i in 0..size {
                last = Some(
                    backend
                        .new_short(&cancel, &format!("https://seed-{}.example/", i), None)
                        .await
                        .unwrap(),
                );
            }
            last.unwrap()
        });

        group.bench_with_input(BenchmarkId::from_parameter(size), &key, |b, key| {
            b.to_async(&rt).iter(|| {
                let backend = Arc::clone(&backend);
                let key = *key;
                async move {
                    backend
                        .get_by_key(&CancellationToken::new(), key.as_str())
                        .await
                        .unwrap()
                }
            });
        });
    }

    group.finish();
}

fn seeded_backend(size: usize) -> (MemoryBackend, Vec<String>) {
    let generator = KeyGenerator::new();
    let mut store = Store::new();
    while store.len() < size {
        let url = format!("https://del-{}.example/", store.len());
        store.insert(generator.generate(), Record::new(&url, Some("bench")));
    }
    let keys = store.keys().map(|k| k.to_string()).collect();
    (MemoryBackend::from_store(store, generator), keys)
}

fn bench_soft_delete(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("memory/soft_delete");

    for size in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.to_async(&rt).iter_batched(
                || seeded_backend(size),
                |(backend, keys)| async move {
                    backend
                        .soft_delete(&CancellationToken::new(), "bench", &keys)
                        .await
                        .unwrap()
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_new_short, bench_get_by_key, bench_soft_delete);
criterion_main!(benches);
