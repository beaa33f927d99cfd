//! Diff and codec throughput on keyed lists.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use strata_core::codec::Codec;
use strata_core::diff::diff;
use strata_core::tree::{Element, HidAllocator, Node};

fn list(keys: impl Iterator<Item = usize>) -> Node {
    Element::new("ul")
        .with_children(keys.map(|key| {
            Element::new("li")
                .with_key(key.to_string())
                .attr("class", "row")
                .child(format!("item {key}"))
        }))
        .into()
}

fn bench_reorder(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_reorder");
    for size in [10usize, 100, 1_000] {
        let mut hids = HidAllocator::new();
        let first = diff(None, &list(0..size), &mut hids).expect("initial diff");
        let reversed = list((0..size).rev());
        let mut rotated_keys: Vec<usize> = (0..size).collect();
        rotated_keys.rotate_right(1);
        let rotated = list(rotated_keys.into_iter());

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("reverse", size), &size, |b, _| {
            b.iter(|| {
                let mut hids = hids.clone();
                black_box(diff(Some(&first.committed), black_box(&reversed), &mut hids))
            })
        });
        group.bench_with_input(BenchmarkId::new("rotate", size), &size, |b, _| {
            b.iter(|| {
                let mut hids = hids.clone();
                black_box(diff(Some(&first.committed), black_box(&rotated), &mut hids))
            })
        });
    }
    group.finish();
}

fn bench_unchanged(c: &mut Criterion) {
    let mut hids = HidAllocator::new();
    let first = diff(None, &list(0..1_000), &mut hids).expect("initial diff");
    c.bench_function("unchanged_1000", |b| {
        b.iter(|| black_box(diff(Some(&first.committed), black_box(&first.committed), &mut hids)))
    });
}

fn bench_codec(c: &mut Criterion) {
    let codec = Codec::default();
    let mut hids = HidAllocator::new();
    let mount = diff(None, &list(0..1_000), &mut hids).expect("initial diff");
    let frame = codec.encode_patches(&mount.patches);

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("encode_mount", |b| b.iter(|| black_box(codec.encode_patches(black_box(&mount.patches)))));
    group.bench_function("decode_mount", |b| b.iter(|| black_box(codec.decode_patches(black_box(&frame)))));
    group.finish();
}

criterion_group!(benches, bench_reorder, bench_unchanged, bench_codec);
criterion_main!(benches);
