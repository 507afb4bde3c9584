// preprocess.rs - Benchmarks for load-graph preprocessing and the batch driver
//
// Run with: cargo bench --features test-support --bench preprocess
// Compare baselines: cargo bench --features test-support --bench preprocess -- --baseline before

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use csxpp::batch::BatchPreprocessor;
use csxpp::config::PreprocessorConfig;
use csxpp::fs::{CachedFileSystem, MemoryFileSystem, PhysicalFileSystem};
use csxpp::preprocess::{FilePreprocessor, PreprocessOptions};
use csxpp::test_utils::fixture_workspace::{create_fixture_workspace, FixtureConfig};

// ---------------------------------------------------------------------------
// Benchmark: single entry preprocessing with varying #load chain depths
//
// entry_0.csx loads lib_0, which loads lib_1, ... up to the chain depth.
// ---------------------------------------------------------------------------

fn bench_load_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocess_load_chain");
    group.sample_size(20);

    for &depth in &[1usize, 5, 25] {
        let config = FixtureConfig {
            entry_count: 1,
            library_count: depth,
            load_chain_depth: depth,
            usings_per_file: 3,
            references_per_file: 2,
            body_lines_per_file: 50,
        };
        let workspace = create_fixture_workspace(&config);
        let entry = workspace.path().join("entry_0.csx");

        let uncached = FilePreprocessor::with_default_processors(
            PhysicalFileSystem::new(),
            PreprocessOptions::default(),
        );
        group.bench_with_input(BenchmarkId::new("disk", depth), &entry, |b, entry| {
            b.iter(|| black_box(uncached.process_file(black_box(entry)).unwrap()))
        });

        let cached = FilePreprocessor::with_default_processors(
            CachedFileSystem::new(),
            PreprocessOptions::default(),
        );
        group.bench_with_input(BenchmarkId::new("cached", depth), &entry, |b, entry| {
            b.iter(|| black_box(cached.process_file(black_box(entry)).unwrap()))
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: line classification alone, with no file I/O
// ---------------------------------------------------------------------------

fn bench_classify_script(c: &mut Criterion) {
    let mut script = String::new();
    for i in 0..20 {
        script.push_str(&format!("using Generated.Ns{};\n", i));
        script.push_str(&format!("#r \"Generated.Ref{}\"\n", i));
    }
    for i in 0..2000 {
        script.push_str(&format!("var value_{} = {};\n", i, i));
    }

    let preprocessor = FilePreprocessor::with_default_processors(
        MemoryFileSystem::new(),
        PreprocessOptions::default(),
    );
    c.bench_function("preprocess_classify_2000_lines", |b| {
        b.iter(|| black_box(preprocessor.process_script(black_box(&script)).unwrap()))
    });
}

// ---------------------------------------------------------------------------
// Benchmark: whole-directory batch run on small and medium workspaces
// ---------------------------------------------------------------------------

fn bench_batch_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_run");
    group.sample_size(10);

    let configs: &[(&str, FixtureConfig)] = &[
        ("small", FixtureConfig::small()),
        ("medium", FixtureConfig::medium()),
    ];

    for (label, config) in configs {
        let workspace = create_fixture_workspace(config);
        let root = workspace.path().to_path_buf();

        group.bench_with_input(BenchmarkId::new("cold", *label), &root, |b, root| {
            b.iter(|| {
                let batch = BatchPreprocessor::new(PreprocessorConfig::default());
                black_box(batch.run(black_box(root)).unwrap())
            })
        });

        let warm = BatchPreprocessor::new(PreprocessorConfig::default());
        group.bench_with_input(BenchmarkId::new("warm", *label), &root, |b, root| {
            b.iter(|| black_box(warm.run(black_box(root)).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_load_chain,
    bench_classify_script,
    bench_batch_run
);
criterion_main!(benches);
