//! External collaborators behind capability traits.

pub mod keypoints;
pub mod remote;
pub mod scorer;
pub mod vocabulary;

use std::sync::Arc;

use crate::config::{ScorerBackend, ScorerConfig};
use crate::error::{PipelineError, Result};
use keypoints::KeypointExtractor;
use remote::RemoteScorer;
use scorer::{Scorer, StaticScorer};
use vocabulary::VocabularyLookup;

/// The two scorers plus lookup services a session pipeline runs against.
#[derive(Clone)]
pub struct Services {
    pub appearance: Arc<dyn Scorer>,
    pub pose: Arc<dyn Scorer>,
    pub vocabulary: Arc<dyn VocabularyLookup>,
    pub extractor: Arc<dyn KeypointExtractor>,
}

impl Services {
    /// Builds the scorer back-end named in the configuration.
    pub fn from_config(
        config: &ScorerConfig,
        vocabulary: Arc<dyn VocabularyLookup>,
        extractor: Arc<dyn KeypointExtractor>,
    ) -> Result<Self> {
        let (appearance, pose): (Arc<dyn Scorer>, Arc<dyn Scorer>) = match config.backend {
            ScorerBackend::Static => (
                Arc::new(StaticScorer::uniform(Arc::clone(&vocabulary))),
                Arc::new(StaticScorer::uniform(Arc::clone(&vocabulary))),
            ),
            ScorerBackend::Remote => {
                let build = |name: &str| {
                    RemoteScorer::new(config, name).map_err(|e| PipelineError::Config(e.to_string()))
                };
                (Arc::new(build("appearance")?), Arc::new(build("pose")?))
            }
        };
        Ok(Self {
            appearance,
            pose,
            vocabulary,
            extractor,
        })
    }
}
