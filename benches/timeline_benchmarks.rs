use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tracklane::automation::{AutomationPoint, AutomationRegion};
use tracklane::codec::TextCodec;
use tracklane::routing::{RouteKind, RoutingGraph};
use tracklane::sequencer::{Item, Marker, Note, SequencerItem, TimeSignature, Timeline};

fn dense_item(notes: usize) -> Item {
    let mut item = Item::new(0);
    for i in 0..notes {
        let start = (i / 4) as f64 * 0.25;
        let note_num = 36 + (i % 48) as u8;
        item.add_note(Note::new(start, 0.5, note_num, 100), false);
    }
    item
}

fn tempo_map(markers: usize) -> Timeline {
    let mut timeline = Timeline::default();
    for i in 1..markers {
        let bpm = 80.0 + (i % 90) as f64;
        let _ = timeline.set_marker(Marker::tempo(i as f64 * 4.0, bpm, TimeSignature::four_four()));
    }
    timeline
}

/// Overlap repair on items with many stacked notes
fn bench_item_fix_overlaps(c: &mut Criterion) {
    let mut group = c.benchmark_group("item_fix_overlaps");
    for notes in [256, 1024, 4096] {
        let item = dense_item(notes);
        group.bench_with_input(BenchmarkId::from_parameter(notes), &item, |b, item| {
            b.iter(|| {
                let mut item = item.clone();
                item.fix_overlaps();
                black_box(item.notes().len())
            });
        });
    }
    group.finish();
}

/// Beat to seconds conversion across a long tempo map
fn bench_tempo_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("tempo_conversion");
    for markers in [8, 64, 512] {
        let timeline = tempo_map(markers);
        let end = markers as f64 * 4.0;
        group.bench_with_input(BenchmarkId::from_parameter(markers), &timeline, |b, t| {
            b.iter(|| {
                let seconds = t.get_seconds_at_beat(black_box(end));
                black_box(t.get_beat_at_seconds(seconds))
            });
        });
    }
    group.finish();
}

/// Encoding and decoding a busy arrangement
fn bench_timeline_codec(c: &mut Criterion) {
    let mut timeline = tempo_map(32);
    for track in 1..32u8 {
        for i in 0..64 {
            timeline.add_item(SequencerItem::new(track, i as f64 * 4.0, 4.0, i, 0.0));
        }
    }
    let text = timeline.encode();

    c.bench_function("timeline_encode", |b| b.iter(|| black_box(timeline.encode())));
    c.bench_function("timeline_decode", |b| {
        b.iter(|| black_box(Timeline::decode(black_box(&text))))
    });
}

/// Smoothing a sparse automation lane
fn bench_automation_smoothing(c: &mut Criterion) {
    let points: Vec<AutomationPoint> = (0..64)
        .map(|i| AutomationPoint::new(i as f64 * 4.0, 0, ((i * 37) % 128) as f64, 1, 1))
        .collect();

    c.bench_function("automation_smooth_points", |b| {
        b.iter(|| {
            let mut region = AutomationRegion::new();
            black_box(region.smooth_points(black_box(&points), false))
        })
    });
}

/// Feedback checks on a chained routing graph
fn bench_routing_toggle(c: &mut Criterion) {
    let mut graph = RoutingGraph::new();
    for track in 2..31u8 {
        let _ = graph.toggle(track, track - 1, RouteKind::Audio);
    }

    c.bench_function("routing_feedback_check", |b| {
        b.iter(|| black_box(graph.check_for_feedback(black_box(30), black_box(1))))
    });
}

criterion_group!(
    benches,
    bench_item_fix_overlaps,
    bench_tempo_conversion,
    bench_timeline_codec,
    bench_automation_smoothing,
    bench_routing_toggle
);
criterion_main!(benches);
