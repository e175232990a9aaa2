use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rawblock::core::chain::ChainWriter;
use rawblock::core::flush::WriteQueue;
use rawblock::{BitmapAllocator, BlockAllocator, Store};
use tempfile::TempDir;

/// Benchmark claiming every block of a 100K-block bitmap, lowest first
fn bench_claim_100k(c: &mut Criterion) {
    c.bench_function("bitmap_claim_100k_blocks", |b| {
        b.iter(|| {
            let mut alloc = BitmapAllocator::new(100_000);
            while let Some(index) = alloc.find_free() {
                alloc.mark_used(index).unwrap();
            }
            black_box(&alloc);
        });
    });
}

/// Benchmark claim + free cycles (fragmentation test)
fn bench_claim_free_cycle(c: &mut Criterion) {
    c.bench_function("bitmap_claim_free_cycle", |b| {
        b.iter(|| {
            let mut alloc = BitmapAllocator::new(10_000);
            let mut claimed = Vec::new();

            for _ in 0..1_000 {
                let index = alloc.find_free().unwrap();
                alloc.mark_used(index).unwrap();
                claimed.push(index);
            }

            // Free every other block
            for index in claimed.iter().step_by(2) {
                alloc.mark_free(*index).unwrap();
            }

            // Re-claim
            for _ in 0..500 {
                let index = alloc.find_free().unwrap();
                alloc.mark_used(index).unwrap();
            }

            black_box(&alloc);
        });
    });
}

/// Benchmark staging chains of different lengths
fn bench_chain_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_write_by_size");

    for size_kb in [4, 16, 64, 256].iter() {
        let payload = vec![0x5Au8; size_kb * 1024];

        group.bench_with_input(
            BenchmarkId::new("staged", format!("{}KB", size_kb)),
            &payload,
            |b, payload| {
                b.iter(|| {
                    let mut alloc = BitmapAllocator::new(10_000);
                    let mut queue = WriteQueue::new();
                    let mut writer = ChainWriter::new(&mut alloc, &mut queue, 4096);
                    for _ in 0..100 {
                        black_box(writer.write(payload).unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

/// Benchmark a write that forces the file-backed arena to grow
fn bench_growth(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bench.hmv");
    let payload = vec![0xA5u8; 10 * 4096];

    c.bench_function("store_write_with_growth", |b| {
        b.iter(|| {
            let mut store = rawblock::StoreBuilder::new()
                .path(&path)
                .without_sync()
                .format()
                .unwrap();
            black_box(store.write(&payload).unwrap());
            store.close().unwrap();
        });
    });

    // 8 + 10 blocks rounds up to the next power of two
    assert_eq!(Store::open(&path).unwrap().block_count(), 32);
}

criterion_group!(
    benches,
    bench_claim_100k,
    bench_claim_free_cycle,
    bench_chain_sizes,
    bench_growth
);
criterion_main!(benches);
