use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use vram_core::infrastructure_in_memory::InMemoryRegistryStore;
use vram_core::reclaimer::IdleReclaimer;
use vram_core::registry::Registry;
use vram_core::types::*;

use std::time::Duration;

fn registry_with(count: u64, total: u64) -> Registry {
    let mut reg = Registry::new(
        Capacity::new(total, 0),
        Box::new(InMemoryRegistryStore::new()),
    );
    for i in 0..count {
        let name = format!("svc-{}", i);
        let priority = match i % 3 {
            0 => Priority::Low,
            1 => Priority::Medium,
            _ => Priority::High,
        };
        reg.register(
            &name,
            &format!("http://127.0.0.1:{}/unload_model", 9000 + i),
            vec![ResourceSpec::new("model", 10)],
            Some(priority),
            i,
        )
        .ok();
    }
    reg
}

fn bench_allocate_release(c: &mut Criterion) {
    c.bench_function("allocate_release_cycle", |b| {
        let mut reg = registry_with(10, 1_000);
        b.iter(|| {
            reg.request_allocation("bench", 50, None, None, 100).ok();
            black_box(reg.release_explicit("bench").ok())
        })
    });
}

fn bench_admission_under_pressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("admission_with_eviction");

    for count in [10u64, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("collaborators", count), &count, |b, &count| {
            b.iter(|| {
                // Full ledger: every allocation has to evict
                let mut reg = registry_with(count, count * 10);
                black_box(reg.request_allocation("newcomer", 55, None, None, count).ok())
            })
        });
    }

    group.finish();
}

fn bench_idle_sweep(c: &mut Criterion) {
    c.bench_function("sweep_1000_idle", |b| {
        let reclaimer = IdleReclaimer::new(Duration::from_millis(10), Duration::from_secs(60));
        b.iter(|| {
            let mut reg = registry_with(1000, 100_000);
            black_box(reclaimer.sweep(&mut reg, 1_000_000).freed)
        })
    });
}

criterion_group!(benches, bench_allocate_release, bench_admission_under_pressure, bench_idle_sweep);
criterion_main!(benches);
