// Benchmarks for index build and both query modes
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lookbook_core::{AestheticRecord, CatalogRecord, ClusterIndex, Encoder, HashEncoder, KMeans};
use lookbook_similarity::{BuildConfig, IndexBuilder, SimilarityEngine};
use rand::prelude::*;
use std::sync::Arc;

const WORDS: &[&str] = &[
    "red", "blue", "floral", "striped", "linen", "denim", "silk", "wool", "pastel", "black",
    "midi", "maxi", "cropped", "oversized", "lace", "velvet", "green", "ivory", "tartan", "knit",
    "dress", "shirt", "trousers", "skirt", "jacket", "coat", "cardigan", "blouse",
];

fn generate_catalog(n: usize) -> Vec<CatalogRecord> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n)
        .map(|i| {
            let words: Vec<&str> = (0..6).map(|_| WORDS[rng.random_range(0..WORDS.len())]).collect();
            CatalogRecord::new(i as u64, words.join(" "), format!("img/{}.jpg", i))
        })
        .collect()
}

fn aesthetics() -> Vec<AestheticRecord> {
    vec![
        AestheticRecord::new("Cottagecore", "florals gingham", "pastel green"),
        AestheticRecord::new("Goth", "lace velvet", "black"),
        AestheticRecord::new("Dark Academia", "tartan knit", "brown ivory"),
    ]
}

fn build_engine(n: usize) -> SimilarityEngine {
    let encoder: Arc<dyn Encoder> = Arc::new(HashEncoder::default());
    let artifact = IndexBuilder::new(BuildConfig::default())
        .unwrap()
        .build(generate_catalog(n), aesthetics(), encoder.as_ref())
        .unwrap();
    SimilarityEngine::new(Arc::new(artifact), encoder)
}

fn benchmark_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(10);

    for size in [1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("hash_encoder", size), size, |b, &size| {
            let builder = IndexBuilder::new(BuildConfig::default()).unwrap();
            let encoder = HashEncoder::default();
            b.iter(|| {
                let artifact = builder
                    .build(generate_catalog(size), aesthetics(), &encoder)
                    .unwrap();
                black_box(artifact);
            });
        });
    }

    group.finish();
}

fn benchmark_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    for size in [1_000, 10_000, 50_000].iter() {
        let engine = build_engine(*size);

        group.bench_with_input(BenchmarkId::new("text_top5", size), size, |b, _| {
            b.iter(|| {
                let results = engine.query_by_text(black_box("red floral midi"), 5).unwrap();
                black_box(results);
            });
        });

        group.bench_with_input(BenchmarkId::new("aesthetic_top10", size), size, |b, _| {
            b.iter(|| {
                let results = engine.query_by_aesthetic(black_box("Cottagecore"), 10);
                black_box(results);
            });
        });
    }

    group.finish();
}

fn benchmark_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans");
    group.sample_size(10);

    let engine = build_engine(5_000);
    let store = engine.artifact().items();
    for k in [4, 8, 16].iter() {
        group.bench_with_input(BenchmarkId::new("fit", k), k, |b, &k| {
            b.iter(|| {
                let index = ClusterIndex::fit(store, k, 42, &KMeans::default()).unwrap();
                black_box(index.inertia());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_build, benchmark_queries, benchmark_clustering);
criterion_main!(benches);
