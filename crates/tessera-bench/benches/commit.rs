//! Commit path benchmarks for tessera.
//!
//! Benchmarks for:
//! - Autocommit statements against one engine
//! - Explicit transactions committed in one and two phases
//! - Catalog cache lookups

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tessera_bench::utils::generate_catalog_names;
use tessera_cache::{Catalog, CatalogCache, CatalogId};
use tessera_common::config::KernelConfig;
use tessera_test::Harness;
use tessera_txn::{Completion, StartOptions};

fn harness(engines: usize) -> Harness {
    let config = KernelConfig::builder().max_engines(engines.max(1)).build();
    Harness::with_config(config)
}

/// Benchmark autocommit statements.
fn bench_autocommit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit/autocommit");

    let h = harness(1);
    let (_, heap) = h.add_xa("heap").unwrap();
    let touched = [Arc::clone(&heap)];
    let mut session = h.session(1);

    group.bench_function("single_engine", |b| {
        b.iter(|| {
            h.run_statement(&mut session, &touched, &[&heap], true)
                .unwrap();
            h.log.clear();
        });
    });

    group.finish();
}

/// Benchmark explicit transactions writing to a growing number of
/// engines. One engine commits in one phase; more run a prepare round.
fn bench_explicit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit/explicit");

    for engines in [1, 2, 4, 8] {
        let h = harness(engines);
        let handles: Vec<_> = (0..engines)
            .map(|i| h.add_xa(&format!("engine_{i}")).unwrap().1)
            .collect();
        let writes: Vec<_> = handles.iter().collect();
        let mut session = h.session(1);

        group.throughput(Throughput::Elements(engines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(engines), &engines, |b, _| {
            b.iter(|| {
                h.services
                    .begin(&mut session, StartOptions::default())
                    .unwrap();
                h.run_statement(&mut session, &handles, &writes, true)
                    .unwrap();
                h.services
                    .end_transaction(&mut session, Completion::Commit)
                    .unwrap();
                h.log.clear();
            });
        });
    }

    group.finish();
}

/// Benchmark catalog lookups.
fn bench_catalog_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache/catalog_find");

    for size in [16, 256, 4096] {
        let cache = CatalogCache::new(size);
        let ids: Vec<CatalogId> = generate_catalog_names(size)
            .iter()
            .map(|name| CatalogId::new(name))
            .collect();
        for id in &ids {
            cache.insert(Catalog::new(id.clone())).unwrap();
        }

        group.throughput(Throughput::Elements(ids.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                for id in &ids {
                    black_box(cache.find(id).unwrap());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_autocommit, bench_explicit, bench_catalog_lookup);
criterion_main!(benches);
