//! Label vocabulary shared by both scorers.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Label returned for an index outside the vocabulary.
pub const UNKNOWN_LABEL: &str = "unknown";

pub trait VocabularyLookup: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn id_to_label(&self, id: usize) -> String;

    /// Display text for a label.
    fn label_to_text(&self, label: &str) -> String;

    /// Labels matching `query`, best first, at most `limit`.
    fn search(&self, query: &str, limit: usize) -> Vec<(String, f32)>;
}

#[derive(Debug, Deserialize)]
struct VocabularyFile {
    labels: Vec<String>,
    #[serde(default)]
    text: HashMap<String, String>,
}

/// In-memory vocabulary. Labels without explicit display text render as the
/// lowercased label with underscores turned into spaces.
#[derive(Debug, Clone, Default)]
pub struct StaticVocabulary {
    labels: Vec<String>,
    ids: HashMap<String, usize>,
    text: HashMap<String, String>,
}

impl StaticVocabulary {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let ids = labels.iter().enumerate().map(|(i, l)| (l.clone(), i)).collect();
        Self {
            labels,
            ids,
            text: HashMap::new(),
        }
    }

    pub fn with_text(mut self, label: impl Into<String>, text: impl Into<String>) -> Self {
        self.text.insert(label.into(), text.into());
        self
    }

    /// Parses `{"labels": [...], "text": {"LABEL": "display"}}`.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: VocabularyFile = serde_json::from_str(raw)?;
        if file.labels.is_empty() {
            return Err(PipelineError::Config("vocabulary has no labels".to_string()));
        }
        let mut vocab = Self::new(file.labels);
        vocab.text = file.text;
        Ok(vocab)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    pub fn label_id(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl VocabularyLookup for StaticVocabulary {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn id_to_label(&self, id: usize) -> String {
        self.labels
            .get(id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
    }

    fn label_to_text(&self, label: &str) -> String {
        match self.text.get(label) {
            Some(text) => text.clone(),
            None => label.replace('_', " ").to_lowercase(),
        }
    }

    /// Exact match scores 1.0, prefix 0.8, substring 0.5 (case-insensitive).
    /// Ties sort by label.
    fn search(&self, query: &str, limit: usize) -> Vec<(String, f32)> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<(String, f32)> = self
            .labels
            .iter()
            .filter_map(|label| {
                let lower = label.to_lowercase();
                let score = if lower == query {
                    1.0
                } else if lower.starts_with(&query) {
                    0.8
                } else if lower.contains(&query) {
                    0.5
                } else {
                    return None;
                };
                Some((label.clone(), score))
            })
            .collect();

        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        hits.truncate(limit);
        hits
    }
}
