use criterion::{criterion_group, criterion_main, Criterion};
use folio_core::{DocumentId, PlainRenderer};
use folio_revlog::{MemoryBackend, RevisionConfig, RevisionService, RocksBackend, StoreConfig};
use std::hint::black_box;
use std::sync::Arc;

fn body(revision: usize) -> String {
    let mut text = String::from("# Weekly update\n\n");
    for p in 0..40 {
        text.push_str(&format!("Paragraph {p} describes progress on item {p}.\n\n"));
    }
    text.push_str(&format!("Last edited in revision {revision}.\n"));
    text
}

fn bench_commit(c: &mut Criterion) {
    let svc = RevisionService::new(
        MemoryBackend::new(),
        Arc::new(PlainRenderer),
        RevisionConfig::default(),
    )
    .unwrap();
    let doc = DocumentId::new();
    svc.commit_revision(doc, &body(0), "bench").unwrap();

    let mut revision = 1;
    c.bench_function("commit_revision_memory", |b| {
        b.iter(|| {
            revision += 1;
            black_box(svc.commit_revision(doc, &body(revision), "bench").unwrap())
        })
    });

    let dir = tempfile::tempdir().unwrap();
    let rocks = RevisionService::new(
        RocksBackend::open(StoreConfig::for_testing(dir.path())).unwrap(),
        Arc::new(PlainRenderer),
        RevisionConfig::default(),
    )
    .unwrap();
    rocks.commit_revision(doc, &body(0), "bench").unwrap();
    let mut revision = 1;
    c.bench_function("commit_revision_rocksdb", |b| {
        b.iter(|| {
            revision += 1;
            black_box(rocks.commit_revision(doc, &body(revision), "bench").unwrap())
        })
    });
}

fn bench_read(c: &mut Criterion) {
    let uncached = RevisionConfig {
        cache_capacity: 0,
        ..RevisionConfig::default()
    };
    let svc = RevisionService::new(MemoryBackend::new(), Arc::new(PlainRenderer), uncached).unwrap();
    let doc = DocumentId::new();
    for r in 0..19 {
        svc.commit_revision(doc, &body(r), "bench").unwrap();
    }

    c.bench_function("current_content_19_deltas_uncached", |b| {
        b.iter(|| black_box(svc.current_content(doc).unwrap()))
    });

    let cached = RevisionService::new(
        MemoryBackend::new(),
        Arc::new(PlainRenderer),
        RevisionConfig::default(),
    )
    .unwrap();
    for r in 0..19 {
        cached.commit_revision(doc, &body(r), "bench").unwrap();
    }
    c.bench_function("current_content_cached", |b| {
        b.iter(|| black_box(cached.current_content(doc).unwrap()))
    });
}

criterion_group!(benches, bench_commit, bench_read);
criterion_main!(benches);
