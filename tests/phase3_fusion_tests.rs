use signflow::config::FusionConfig;
use signflow::kernel::fusion::types::{argmax, Channel, ChannelWeights, Distribution, DistributionError, FusionMethod, SCORE_EPSILON};
use signflow::kernel::fusion::EnsembleEngine;
use signflow::services::vocabulary::{StaticVocabulary, VocabularyLookup};
use std::sync::Arc;

fn vocab() -> Arc<StaticVocabulary> {
    Arc::new(StaticVocabulary::new(["HELLO", "YES", "NO", "THANK_YOU"]).with_text("THANK_YOU", "thank you!"))
}

fn engine() -> EnsembleEngine {
    EnsembleEngine::new(&FusionConfig::default(), vocab()).unwrap()
}

fn dist(channel: Channel, generation: u64, scores: Vec<f32>) -> Distribution {
    Distribution::from_scores(channel, generation, scores, vocab().as_ref(), 5.0).unwrap()
}

#[test]
fn test_no_inputs_no_result() {
    assert!(engine().fuse().is_none());
}

#[test]
fn test_hello_vs_yes_fuses_hello_without_agreement() {
    let engine = engine();
    engine.submit(dist(Channel::Appearance, 1, vec![0.95, 0.02, 0.02, 0.01]));
    engine.submit(dist(Channel::Pose, 1, vec![0.3, 0.4, 0.2, 0.1]));

    let result = engine.fuse().expect("two inputs fuse");
    assert_eq!(result.label, "HELLO");
    assert_eq!(result.text, "hello");
    assert_eq!(result.method, FusionMethod::Weighted);
    assert!(!result.agreement);
    assert!((result.confidence - (0.6 * 0.95 + 0.4 * 0.3)).abs() < 1e-5);
    assert_eq!(result.channels_used, vec![Channel::Appearance, Channel::Pose]);
    assert_eq!(result.per_channel[1].label, "YES");
}

#[test]
fn test_confident_agreement() {
    let engine = engine();
    engine.submit(dist(Channel::Appearance, 1, vec![0.02, 0.92, 0.03, 0.03]));
    engine.submit(dist(Channel::Pose, 1, vec![0.01, 0.95, 0.02, 0.02]));

    let result = engine.fuse().unwrap();
    assert_eq!(result.label, "YES");
    assert!(result.agreement);
    let stats = engine.stats();
    assert_eq!(stats.ensemble_predictions, 1);
    assert_eq!(stats.agreement_rate, 1.0);
}

#[test]
fn test_single_channel_passes_through() {
    let engine = engine();
    let pose = dist(Channel::Pose, 3, vec![0.1, 0.1, 0.1, 0.7]);
    engine.submit(pose.clone());

    let result = engine.fuse().unwrap();
    assert_eq!(result.method, FusionMethod::SingleChannel);
    assert_eq!(result.label, pose.top_label());
    assert_eq!(result.text, "thank you!");
    assert_eq!(result.confidence, pose.confidence());
    assert_eq!(result.channels_used, vec![Channel::Pose]);
    assert!(result.agreement);

    let stats = engine.stats();
    assert_eq!(stats.pose_only, 1);
    assert_eq!(stats.appearance_only, 0);
    assert_eq!(stats.ensemble_predictions, 0);
}

#[test]
fn test_unchanged_inputs_reuse_result() {
    let engine = engine();
    engine.submit(dist(Channel::Appearance, 1, vec![0.7, 0.1, 0.1, 0.1]));
    engine.submit(dist(Channel::Pose, 1, vec![0.6, 0.2, 0.1, 0.1]));

    let first = engine.fuse().unwrap();
    let second = engine.fuse().unwrap();
    assert_eq!(first.label, second.label);
    assert_eq!(engine.stats().ensemble_predictions, 1, "Same inputs count once");

    engine.submit(dist(Channel::Pose, 2, vec![0.1, 0.7, 0.1, 0.1]));
    engine.fuse().unwrap();
    assert_eq!(engine.stats().ensemble_predictions, 2);
}

#[test]
fn test_stale_generation_ignored() {
    let engine = engine();
    assert!(engine.submit(dist(Channel::Pose, 5, vec![0.7, 0.1, 0.1, 0.1])));
    assert!(!engine.submit(dist(Channel::Pose, 4, vec![0.1, 0.7, 0.1, 0.1])));
    assert!(!engine.submit(dist(Channel::Pose, 5, vec![0.1, 0.7, 0.1, 0.1])));
    assert_eq!(engine.latest(Channel::Pose).unwrap().top_label(), "HELLO");
}

#[test]
fn test_running_statistics() {
    let engine = engine();
    let rounds = [
        (vec![0.9, 0.05, 0.03, 0.02], vec![0.8, 0.1, 0.05, 0.05]),
        (vec![0.1, 0.8, 0.05, 0.05], vec![0.7, 0.1, 0.1, 0.1]),
    ];
    let mut confidences = Vec::new();
    for (g, (a, p)) in rounds.into_iter().enumerate() {
        engine.submit(dist(Channel::Appearance, g as u64 + 1, a));
        engine.submit(dist(Channel::Pose, g as u64 + 1, p));
        confidences.push(engine.fuse().unwrap().confidence as f64);
    }
    let stats = engine.stats();
    assert_eq!(stats.ensemble_predictions, 2);
    assert!((stats.agreement_rate - 0.5).abs() < 1e-9);
    let mean = confidences.iter().sum::<f64>() / 2.0;
    assert!((stats.average_confidence - mean).abs() < 1e-6);
}

#[test]
fn test_adaptive_weights_follow_confidence() {
    let engine = engine();
    for g in 1..=4u64 {
        engine.submit(dist(Channel::Appearance, g, vec![0.9, 0.05, 0.03, 0.02]));
        engine.submit(dist(Channel::Pose, g, vec![0.3, 0.3, 0.2, 0.2]));
        engine.fuse();
    }
    assert_eq!(engine.adaptive_weights(), engine.weights(), "Too little history");

    engine.submit(dist(Channel::Appearance, 5, vec![0.9, 0.05, 0.03, 0.02]));
    engine.submit(dist(Channel::Pose, 5, vec![0.3, 0.3, 0.2, 0.2]));
    engine.fuse();

    let adaptive = engine.adaptive_weights();
    assert!((adaptive.appearance - 0.75).abs() < 1e-4);
    assert!((adaptive.pose - 0.25).abs() < 1e-4);
    // Advisory only
    assert!((engine.weights().appearance - 0.6).abs() < 1e-6);

    let applied = engine.set_weights(adaptive).unwrap();
    assert_eq!(engine.weights(), applied);
}

#[test]
fn test_set_weights_normalizes_and_rejects_zero() {
    let engine = engine();
    let w = engine.set_weights(ChannelWeights { appearance: 3.0, pose: 1.0 }).unwrap();
    assert!((w.appearance - 0.75).abs() < 1e-6);
    assert!((w.pose - 0.25).abs() < 1e-6);

    let err = engine.set_weights(ChannelWeights { appearance: 0.0, pose: 0.0 }).unwrap_err();
    assert!(err.is_malformed());
    assert_eq!(engine.weights(), w);
}

#[test]
fn test_non_finite_weights_rejected() {
    let engine = engine();
    let before = engine.weights();
    for bad in [
        ChannelWeights { appearance: f32::INFINITY, pose: 1.0 },
        ChannelWeights { appearance: 0.5, pose: f32::NAN },
        ChannelWeights { appearance: f32::MAX, pose: f32::MAX },
    ] {
        let err = engine.set_weights(bad).unwrap_err();
        assert!(err.is_malformed(), "{:?} should be rejected", bad);
        assert_eq!(engine.weights(), before);
    }

    engine.submit(dist(Channel::Appearance, 1, vec![0.9, 0.05, 0.03, 0.02]));
    engine.submit(dist(Channel::Pose, 1, vec![0.7, 0.1, 0.1, 0.1]));
    let result = engine.fuse().unwrap();
    assert!(result.confidence.is_finite());
    assert!(engine.stats().average_confidence.is_finite());
}

#[test]
fn test_confidence_gate_withholds_result() {
    let cfg = FusionConfig {
        min_confidence: 0.5,
        ..FusionConfig::default()
    };
    let engine = EnsembleEngine::new(&cfg, vocab()).unwrap();
    engine.submit(dist(Channel::Appearance, 1, vec![0.25, 0.25, 0.25, 0.25]));
    assert!(engine.fuse().is_none());
    assert_eq!(engine.stats().gated, 1);
}

#[test]
fn test_vocabulary_mismatch_uses_more_confident_channel() {
    let engine = engine();
    engine.submit(dist(Channel::Appearance, 1, vec![0.5, 0.3, 0.1, 0.1]));
    engine.submit(dist(Channel::Pose, 1, vec![0.1, 0.8, 0.1]));

    let result = engine.fuse().unwrap();
    assert_eq!(result.method, FusionMethod::SingleChannel);
    assert_eq!(result.channels_used, vec![Channel::Pose]);
    assert_eq!(result.label, "YES");
}

#[test]
fn test_top_k_is_ranked_and_bounded() {
    let labels: Vec<String> = (0..8).map(|i| format!("SIGN_{}", i)).collect();
    let vocab = Arc::new(StaticVocabulary::new(labels));
    let engine = EnsembleEngine::new(&FusionConfig::default(), vocab.clone()).unwrap();
    let scores = vec![0.05, 0.3, 0.05, 0.2, 0.1, 0.1, 0.15, 0.05];
    engine.submit(Distribution::from_scores(Channel::Appearance, 1, scores, vocab.as_ref(), 1.0).unwrap());

    let result = engine.fuse().unwrap();
    assert_eq!(result.top_k.len(), 5);
    assert_eq!(result.top_k[0].label, result.label);
    assert!(result.top_k.windows(2).all(|w| w[0].score >= w[1].score));
    let indices: Vec<usize> = result.top_k.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![1, 3, 6, 4, 5]);
}

#[test]
fn test_clear_drops_inputs() {
    let engine = engine();
    engine.submit(dist(Channel::Appearance, 1, vec![0.7, 0.1, 0.1, 0.1]));
    engine.fuse();
    engine.clear();
    assert!(engine.fuse().is_none());
    assert!(engine.report().latest.is_empty());
}

#[test]
fn test_distribution_invariants() {
    let vocab = vocab();
    let d = Distribution::from_scores(Channel::Pose, 1, vec![2.0, 1.0, 1.0, 0.0], vocab.as_ref(), 0.0).unwrap();
    let sum: f32 = d.scores().iter().sum();
    assert!((sum - 1.0).abs() <= SCORE_EPSILON);
    assert!(d.scores().iter().all(|s| (0.0..=1.0).contains(s)));
    assert_eq!(d.top_index(), argmax(d.scores()));
    assert_eq!(d.top_label(), vocab.id_to_label(d.top_index()));
    assert_eq!(d.confidence(), 0.5);

    let v = vocab.as_ref();
    assert_eq!(Distribution::from_scores(Channel::Pose, 1, vec![], v, 0.0).unwrap_err(), DistributionError::Empty);
    assert_eq!(
        Distribution::from_scores(Channel::Pose, 1, vec![0.5, -0.1], v, 0.0).unwrap_err(),
        DistributionError::InvalidScore { index: 1 }
    );
    assert_eq!(
        Distribution::from_scores(Channel::Pose, 1, vec![0.0, 0.0], v, 0.0).unwrap_err(),
        DistributionError::ZeroMass
    );
}
