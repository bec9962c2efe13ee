// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performance benchmarks for the studio engine.
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Section derivation from word timing
//! - Fallback slicing
//! - Wholesale effective-volume recomputation across a stream set

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use studio::mixer::{NullSink, Stem, StemKind, StreamSet, StreamStateChange};
use studio::sections::{SectionMap, TimedWord};

fn words(count: usize) -> Vec<TimedWord> {
    (0..count)
        .map(|i| {
            let start = i as f64 * 0.4;
            if i % 50 == 0 {
                TimedWord::new(format!("[Section {}]", i / 50 + 1), start, start)
            } else {
                TimedWord::new(format!("word{i}"), start, start + 0.35)
            }
        })
        .collect()
}

fn bench_section_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("section_derivation");

    for size in [100, 1000, 5000].iter() {
        let timed = words(*size);
        let duration = timed.last().map(|w| w.end).unwrap_or(0.0);
        group.bench_with_input(BenchmarkId::new("from_words", size), size, |b, _| {
            b.iter(|| {
                let map = SectionMap::derive(Some(black_box(&timed)), duration, 30.0);
                black_box(map.sections().len())
            })
        });
    }

    group.bench_function("fallback_slices", |b| {
        b.iter(|| {
            let map = SectionMap::derive(None, black_box(3600.0), 30.0);
            black_box(map.sections().len())
        })
    });

    group.finish();
}

fn bench_gain_recomputation(c: &mut Criterion) {
    let kinds = [
        StemKind::Vocals,
        StemKind::Drums,
        StemKind::Bass,
        StemKind::Other,
        StemKind::Instrumental,
    ];

    c.bench_function("solo_toggle_recompute", |b| {
        let mut set = StreamSet::new(240.0, None);
        set.add_main("bench://mix.mp3", Box::new(NullSink::new(240.0)));
        let ids: Vec<_> = kinds
            .iter()
            .map(|kind| {
                let stem = Stem {
                    id: format!("bench-{}", kind.name()),
                    kind: *kind,
                    audio_url: format!("bench://{}.mp3", kind.name()),
                };
                set.add_stem(&stem, Box::new(NullSink::new(240.0)))
            })
            .collect();

        let mut solo = false;
        b.iter(|| {
            solo = !solo;
            set.set_stream_state(
                ids[0],
                StreamStateChange {
                    solo: Some(solo),
                    ..Default::default()
                },
            )
            .unwrap();
            black_box(set.effective_volume_of(ids[1]))
        })
    });
}

criterion_group!(benches, bench_section_derivation, bench_gain_recomputation);
criterion_main!(benches);
