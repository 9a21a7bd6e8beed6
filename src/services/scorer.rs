//! Black-box sequence scorers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::kernel::event::Sequence;
use crate::kernel::fusion::types::{argmax, top_k};
use crate::kernel::time::elapsed_ms;
use crate::services::vocabulary::VocabularyLookup;

/// Raw scorer output for one sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inference {
    pub success: bool,
    #[serde(default)]
    pub top_label: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub scores: Vec<f32>,
    #[serde(default)]
    pub top_k_indices: Vec<usize>,
    #[serde(default)]
    pub top_k_scores: Vec<f32>,
    #[serde(default)]
    pub latency_ms: f64,
}

impl Inference {
    pub fn from_scores(scores: Vec<f32>, vocabulary: &dyn VocabularyLookup, latency_ms: f64) -> Self {
        if scores.is_empty() {
            return Self::failed(latency_ms);
        }
        let top = argmax(&scores);
        let top_k_indices = top_k(&scores, 5);
        Self {
            success: true,
            top_label: vocabulary.id_to_label(top),
            confidence: scores[top],
            top_k_scores: top_k_indices.iter().map(|&i| scores[i]).collect(),
            top_k_indices,
            scores,
            latency_ms,
        }
    }

    pub fn failed(latency_ms: f64) -> Self {
        Self {
            success: false,
            top_label: String::new(),
            confidence: 0.0,
            scores: Vec::new(),
            top_k_indices: Vec::new(),
            top_k_scores: Vec::new(),
            latency_ms,
        }
    }
}

#[async_trait]
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;

    async fn infer(&self, sequence: &Sequence) -> anyhow::Result<Inference>;
}

/// Deterministic scorer returning a fixed score vector. Used for mock mode
/// and tests.
pub struct StaticScorer {
    scores: Vec<f32>,
    vocabulary: Arc<dyn VocabularyLookup>,
    delay: Option<Duration>,
    fail: bool,
    calls: AtomicUsize,
}

impl StaticScorer {
    pub fn new(scores: Vec<f32>, vocabulary: Arc<dyn VocabularyLookup>) -> Self {
        Self {
            scores,
            vocabulary,
            delay: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// `confidence` on `index`, the remaining mass spread evenly over the
    /// other labels.
    pub fn peaked(vocabulary: Arc<dyn VocabularyLookup>, index: usize, confidence: f32) -> Self {
        let n = vocabulary.len().max(1);
        let rest = if n > 1 { (1.0 - confidence) / (n - 1) as f32 } else { 0.0 };
        let scores = (0..n).map(|i| if i == index { confidence } else { rest }).collect();
        Self::new(scores, vocabulary)
    }

    /// Flat distribution over the vocabulary.
    pub fn uniform(vocabulary: Arc<dyn VocabularyLookup>) -> Self {
        let n = vocabulary.len().max(1);
        Self::new(vec![1.0 / n as f32; n], vocabulary)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every call reports `success: false`.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scorer for StaticScorer {
    fn name(&self) -> &str {
        "static"
    }

    async fn infer(&self, _sequence: &Sequence) -> anyhow::Result<Inference> {
        let start = Instant::now();
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let latency = elapsed_ms(start, Instant::now());
        if self.fail {
            return Ok(Inference::failed(latency));
        }
        Ok(Inference::from_scores(self.scores.clone(), self.vocabulary.as_ref(), latency))
    }
}
