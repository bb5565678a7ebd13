use criterion::{black_box, criterion_group, criterion_main, Criterion};
use photoclassify::compare::{ContentComparator, HashComparator, StreamComparator};
use photoclassify::matching::{find_candidates, Filter, FilterChain};
use photoclassify::scanner::{FileMeta, FileRef};
use std::fs;
use tempfile::TempDir;

// Two identical files of `size_kb` KiB
fn setup_pair(size_kb: usize) -> (TempDir, FileRef, FileRef) {
    let temp_dir = TempDir::new().unwrap();
    let data: Vec<u8> = (0..size_kb * 1024).map(|i| (i % 251) as u8).collect();
    let a = temp_dir.path().join("a.jpg");
    let b = temp_dir.path().join("b.jpg");
    fs::write(&a, &data).expect("Failed to write bench file");
    fs::write(&b, &data).expect("Failed to write bench file");
    (temp_dir, FileRef::new(&a), FileRef::new(&b))
}

// 1. Content comparison
fn bench_comparators(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");

    for size_kb in [4, 1024, 10240] {
        let (_dir, a, b) = setup_pair(size_kb);

        group.bench_function(format!("stream_{size_kb}KB"), |bench| {
            let comparator = StreamComparator::default();
            bench.iter(|| black_box(comparator.identical(&a, &b).unwrap()));
        });

        // A fresh comparator per iteration: the memo would otherwise make
        // every run after the first free.
        group.bench_function(format!("hash_cold_{size_kb}KB"), |bench| {
            bench.iter(|| black_box(HashComparator::new().identical(&a, &b).unwrap()));
        });

        group.bench_function(format!("hash_warm_{size_kb}KB"), |bench| {
            let comparator = HashComparator::new();
            comparator.identical(&a, &b).unwrap();
            bench.iter(|| black_box(comparator.identical(&a, &b).unwrap()));
        });
    }
    group.finish();
}

// 2. Candidate matching over in-memory metadata
fn bench_candidates(c: &mut Criterion) {
    let meta = |size| FileMeta {
        size,
        modified: None,
        created: None,
    };
    let origins: Vec<FileRef> = (0..1_000u64)
        .map(|i| FileRef::with_metadata(format!("/card/IMG_{i:04}.JPG"), meta(i % 97)))
        .collect();
    let destinations: Vec<FileRef> = (0..10_000u64)
        .map(|i| {
            FileRef::with_metadata(
                format!("/archive/{}/IMG_{:04}.JPG", 20_240_101 + i / 500, i % 2_000),
                meta(i % 97),
            )
        })
        .collect();

    let mut group = c.benchmark_group("candidates");
    for (label, chain) in [
        ("name_size", FilterChain::new(vec![Filter::Name, Filter::Size])),
        ("size_only", FilterChain::new(vec![Filter::Size])),
    ] {
        group.bench_function(label, |b| {
            b.iter(|| black_box(find_candidates(&origins, &destinations, &chain, None)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_comparators, bench_candidates);
criterion_main!(benches);
