//! Benchmark tests for gofilm-core operations
//!
//! Run with: cargo bench -p gofilm-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use url::Url;

use gofilm_core::headless::HeadlessFactory;
use gofilm_core::history::{FilmRef, WatchHistory};
use gofilm_core::{
    detect_media_kind, AttachOptions, EngineEvent, MiniModeConfig, MiniModeTracker,
    PlaybackController, PlayerConfig, Progress, ViewportEvent,
};

// ============================================================================
// Source Detection
// ============================================================================

fn bench_media_kind_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("Media Kind Detection");

    group.bench_function("detect_segmented", |b| {
        let url = Url::parse("https://cdn.example.com/vod/2026/index.m3u8?sign=0f3a").unwrap();
        b.iter(|| black_box(detect_media_kind(black_box(&url))));
    });

    group.bench_function("detect_direct", |b| {
        let url = Url::parse("https://cdn.example.com/vod/film.mp4").unwrap();
        b.iter(|| black_box(detect_media_kind(black_box(&url))));
    });

    group.finish();
}

// ============================================================================
// Mini Mode
// ============================================================================

fn bench_mini_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("Mini Tracker");

    // One observation per animation frame while scrolling
    for &frames in &[60usize, 600] {
        group.bench_with_input(BenchmarkId::new("scroll_frames", frames), &frames, |b, &frames| {
            b.iter(|| {
                let mut tracker = MiniModeTracker::new(MiniModeConfig::default());
                tracker.set_playing(true);
                for i in 0..frames {
                    let bottom = 800.0 - (i as f64 * 3.0);
                    black_box(tracker.observe(ViewportEvent::Bounds {
                        top: bottom - 450.0,
                        bottom,
                    }));
                }
                tracker.is_mini()
            });
        });
    }

    group.finish();
}

// ============================================================================
// Controller
// ============================================================================

fn bench_controller(c: &mut Criterion) {
    let mut group = c.benchmark_group("Controller");

    group.bench_function("attach_detach", |b| {
        let (mut controller, mut events) =
            PlaybackController::new(HeadlessFactory::new(), PlayerConfig::default()).unwrap();
        b.iter(|| {
            controller
                .attach("https://cdn.example.com/a.m3u8", AttachOptions::resume_at(30.0))
                .unwrap();
            controller.detach();
            while events.try_recv().is_ok() {}
        });
    });

    group.bench_function("time_updates", |b| {
        let (mut controller, mut events) =
            PlaybackController::new(HeadlessFactory::new(), PlayerConfig::default()).unwrap();
        let generation = controller
            .attach("https://cdn.example.com/a.mp4", AttachOptions::default())
            .unwrap();
        controller.handle_engine_event(generation, EngineEvent::Playing);
        b.iter(|| {
            for i in 0..100 {
                controller.handle_engine_event(
                    generation,
                    EngineEvent::TimeUpdate {
                        current_time: i as f64 * 0.25,
                        duration: 2700.0,
                    },
                );
            }
            while events.try_recv().is_ok() {}
        });
    });

    group.finish();
}

// ============================================================================
// History
// ============================================================================

fn bench_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("Watch History");

    for &films in &[10usize, 200] {
        let mut history = WatchHistory::new();
        let now = chrono::Utc::now();
        for i in 0..films {
            let film = FilmRef {
                id: i.to_string(),
                name: format!("Film {}", i),
                picture: format!("https://img.example.com/{}.jpg", i),
            };
            history.record_progress(&film, "EP01", "s1", 0, Progress::new(i as f64, 2700.0), now);
        }
        let json = history.to_json().unwrap();

        group.bench_with_input(BenchmarkId::new("parse", films), &json, |b, json| {
            b.iter(|| black_box(WatchHistory::from_json_lenient(black_box(json))));
        });
        group.bench_with_input(BenchmarkId::new("list", films), &history, |b, history| {
            b.iter(|| black_box(history.list().len()));
        });
    }

    group.finish();
}

criterion_group!(source_benches, bench_media_kind_detection);

criterion_group!(mini_benches, bench_mini_tracker);

criterion_group!(controller_benches, bench_controller);

criterion_group!(history_benches, bench_history);

criterion_main!(
    source_benches,
    mini_benches,
    controller_benches,
    history_benches,
);
