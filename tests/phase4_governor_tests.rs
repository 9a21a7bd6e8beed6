use image::RgbImage;
use signflow::config::GovernorConfig;
use signflow::kernel::governor::{Metric, MetricStats, PerformanceGovernor, RollingWindow};
use signflow::kernel::telemetry::event::QualityChange;
use std::time::{Duration, Instant};

fn governor_at(fps: f64) -> PerformanceGovernor {
    PerformanceGovernor::new(&GovernorConfig {
        target_fps: fps,
        ..GovernorConfig::default()
    })
}

#[test]
fn test_skip_threshold_is_exclusive() {
    let mut gov = governor_at(10.0);
    let t0 = Instant::now();

    assert!(!gov.should_skip_frame_at(t0), "First frame is always accepted");
    assert!(gov.should_skip_frame_at(t0), "Zero elapsed is infinitely fast");
    assert!(gov.should_skip_frame_at(t0 + Duration::from_millis(99)));
    // Skips did not move the reference point
    assert!(!gov.should_skip_frame_at(t0 + Duration::from_millis(100)), "Exactly 1/fps is not too fast");
    assert!(gov.should_skip_frame_at(t0 + Duration::from_millis(150)));
    assert!(!gov.should_skip_frame_at(t0 + Duration::from_millis(250)));

    let report = gov.report();
    assert_eq!(report.frames_accepted, 3);
    assert_eq!(report.frames_skipped, 3);
}

#[test]
fn test_skipping_can_be_disabled() {
    let mut gov = PerformanceGovernor::new(&GovernorConfig {
        enable_frame_skipping: false,
        ..GovernorConfig::default()
    });
    let t0 = Instant::now();
    for _ in 0..10 {
        assert!(!gov.should_skip_frame_at(t0));
    }
}

#[test]
fn test_empty_metrics_are_zero() {
    let gov = governor_at(15.0);
    for metric in Metric::ALL {
        assert_eq!(gov.metric_stats(metric), MetricStats::default());
    }
    assert_eq!(gov.report().current_fps, 0.0);
    assert!(gov.recommendations().is_empty());
}

#[test]
fn test_latency_window_statistics() {
    let mut gov = governor_at(15.0);
    for i in 1..=150 {
        gov.record_latency(Metric::Inference, i as f64);
    }
    let stats = gov.metric_stats(Metric::Inference);
    assert_eq!(stats.count, 100, "Window is bounded");
    assert_eq!(stats.min, 51.0);
    assert_eq!(stats.max, 150.0);
    assert!((stats.mean - 100.5).abs() < 1e-9);
    assert!((stats.p95 - 145.05).abs() < 1e-9);
}

#[test]
fn test_measure_latency_records_elapsed() {
    let mut gov = governor_at(15.0);
    let start = Instant::now() - Duration::from_millis(20);
    let ms = gov.measure_latency(start, Metric::Translation);
    assert!(ms >= 20.0);
    assert_eq!(gov.metric_stats(Metric::Translation).count, 1);
}

#[test]
fn test_resolution_degrades_to_floor_and_stops() {
    let mut gov = governor_at(15.0);
    gov.record_latency(Metric::VideoProcessing, 150.0);

    let mut seen = vec![gov.settings().max_resolution];
    loop {
        let changes = gov.auto_adjust_quality();
        if changes.is_empty() {
            break;
        }
        assert_eq!(changes, vec![QualityChange::ResolutionReduced]);
        seen.push(gov.settings().max_resolution);
    }

    assert_eq!(seen, vec![(640, 480), (512, 384), (409, 307), (327, 245), (320, 240)]);
    assert!(seen.windows(2).all(|w| w[1].0 <= w[0].0 && w[1].1 <= w[0].1));
    assert_eq!(gov.settings().audio_sample_rate, 16_000, "Audio within budget");
}

#[test]
fn test_audio_rate_degrades_to_floor() {
    let mut gov = governor_at(15.0);
    gov.record_latency(Metric::AudioProcessing, 60.0);

    let mut rates = Vec::new();
    for _ in 0..10 {
        gov.auto_adjust_quality();
        rates.push(gov.settings().audio_sample_rate);
    }
    assert_eq!(&rates[..5], &[14_000, 12_000, 10_000, 8_000, 8_000]);
    assert!(rates[4..].iter().all(|&r| r == 8_000), "Floor holds");
    assert_eq!(gov.settings().max_resolution, (640, 480));
}

#[test]
fn test_reset_quality_restores_configuration() {
    let mut gov = governor_at(15.0);
    gov.record_latency(Metric::VideoProcessing, 500.0);
    gov.record_latency(Metric::AudioProcessing, 500.0);
    gov.auto_adjust_quality();
    gov.auto_adjust_quality();
    assert_ne!(gov.settings().max_resolution, (640, 480));

    gov.reset_quality();
    assert_eq!(gov.settings().max_resolution, (640, 480));
    assert_eq!(gov.settings().audio_sample_rate, 16_000);
}

#[test]
fn test_optimize_video_frame_fits_cap() {
    let mut gov = governor_at(15.0);
    let (out, resized) = gov.optimize_video_frame(RgbImage::new(1280, 720));
    assert!(resized);
    assert_eq!(out.dimensions(), (640, 360));

    let (small, resized) = gov.optimize_video_frame(RgbImage::new(320, 240));
    assert!(!resized);
    assert_eq!(small.dimensions(), (320, 240));
    assert_eq!(gov.metric_stats(Metric::VideoProcessing).count, 2);
}

#[test]
fn test_optimize_audio_chunk_downsamples_only() {
    let mut gov = governor_at(15.0);
    let tone: Vec<f32> = (0..4800).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();

    let (out, rate, resampled) = gov.optimize_audio_chunk(tone.clone(), 48_000).unwrap();
    assert!(resampled);
    assert_eq!(rate, 16_000);
    assert!(!out.is_empty() && out.len() < tone.len());

    let low: Vec<f32> = vec![0.1; 800];
    let (out, rate, resampled) = gov.optimize_audio_chunk(low.clone(), 8_000).unwrap();
    assert!(!resampled);
    assert_eq!(rate, 8_000);
    assert_eq!(out, low);
    assert_eq!(gov.metric_stats(Metric::AudioProcessing).count, 2);
}

#[test]
fn test_recommendations_follow_budgets() {
    let mut gov = governor_at(15.0);
    gov.record_latency(Metric::VideoProcessing, 150.0);
    gov.record_latency(Metric::Translation, 200.0);

    let t0 = Instant::now();
    gov.should_skip_frame_at(t0);
    gov.should_skip_frame_at(t0 + Duration::from_millis(500));

    let recs = gov.recommendations();
    assert!(recs.iter().any(|r| r.contains("video resolution")));
    assert!(recs.iter().any(|r| r.contains("cached translations")));
    assert!(recs.iter().any(|r| r.contains("Frame rate is low")));
    assert!(!recs.iter().any(|r| r.contains("audio sample rate")));
}

#[test]
fn test_rolling_window_percentile() {
    let mut w = RollingWindow::new(100);
    assert_eq!(w.stats(), MetricStats::default());
    for i in 1..=100 {
        w.push(i as f64);
    }
    assert!((w.stats().p95 - 95.05).abs() < 1e-9);

    let mut single = RollingWindow::new(3);
    single.push(7.0);
    assert_eq!(single.stats().p95, 7.0);
}
