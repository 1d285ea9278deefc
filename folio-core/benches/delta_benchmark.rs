use criterion::{criterion_group, criterion_main, Criterion};
use folio_core::{
    apply_delta, compute_delta, materialize, DiffGranularity, DocumentId, PatchId,
    PatchPayload, PatchRecord, PlainRenderer,
};
use std::hint::black_box;

/// Roughly `paragraphs` paragraphs of post-like Markdown.
fn article(paragraphs: usize, edit: usize) -> String {
    let mut body = String::from("# Release notes\n\n");
    for i in 0..paragraphs {
        if i == edit {
            body.push_str("This paragraph was rewritten during review. ");
        }
        body.push_str(&format!(
            "Paragraph {i} explains a change to the storage engine in some detail.\n\n"
        ));
    }
    body
}

fn bench_compute_delta(c: &mut Criterion) {
    let old = article(200, usize::MAX);
    let new = article(200, 120);

    for (name, granularity) in [
        ("compute_delta_lines_200p", DiffGranularity::Lines),
        ("compute_delta_words_200p", DiffGranularity::Words),
    ] {
        c.bench_function(name, |b| {
            b.iter(|| black_box(compute_delta(black_box(&old), black_box(&new), granularity)))
        });
    }
}

fn bench_apply_delta(c: &mut Criterion) {
    let old = article(200, usize::MAX);
    let new = article(200, 120);
    let ops = compute_delta(&old, &new, DiffGranularity::Words);

    c.bench_function("apply_delta_words_200p", |b| {
        b.iter(|| black_box(apply_delta(black_box(&old), black_box(&ops)).unwrap()))
    });
}

fn bench_materialize_chain(c: &mut Criterion) {
    let document = DocumentId::new();
    let mut chain = vec![PatchRecord {
        id: PatchId::new(1),
        document,
        parent: None,
        version: 1,
        payload: PatchPayload::Snapshot(article(50, usize::MAX)),
        created_at: 0,
        author: "bench".into(),
    }];
    let mut current = article(50, usize::MAX);
    for i in 0..19u64 {
        let next = article(50, i as usize);
        let ops = compute_delta(&current, &next, DiffGranularity::Words);
        chain.push(PatchRecord {
            id: PatchId::new(i + 2),
            document,
            parent: Some(PatchId::new(i + 1)),
            version: i as u32 + 2,
            payload: PatchPayload::Delta(ops),
            created_at: 0,
            author: "bench".into(),
        });
        current = next;
    }

    c.bench_function("materialize_snapshot_plus_19_deltas", |b| {
        b.iter(|| black_box(materialize(black_box(&chain), &PlainRenderer).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_compute_delta,
    bench_apply_delta,
    bench_materialize_chain,
);
criterion_main!(benches);
