use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Serialize;
use std::time::Instant;

use crate::config::ScorerConfig;
use crate::kernel::event::{FramePayload, Modality, Sequence};
use crate::kernel::time::elapsed_ms;
use crate::services::scorer::{Inference, Scorer};

/// HTTP scorer: POSTs each sequence to `{base_url}/infer`.
#[derive(Clone)]
pub struct RemoteScorer {
    client: Client,
    base_url: String,
    name: String,
}

#[derive(Serialize)]
struct InferRequest<'a> {
    modality: Modality,
    generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    /// Raw RGB8 frames, base64.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    frames: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    keypoints: Vec<&'a [f32]>,
}

impl RemoteScorer {
    pub fn new(config: &ScorerConfig, name: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            name: name.into(),
        })
    }

    fn request<'a>(sequence: &'a Sequence) -> InferRequest<'a> {
        let mut req = InferRequest {
            modality: sequence.modality,
            generation: sequence.generation,
            width: None,
            height: None,
            frames: Vec::new(),
            keypoints: Vec::new(),
        };
        for frame in sequence.frames() {
            match &frame.payload {
                FramePayload::Image(img) => {
                    req.width = Some(img.width());
                    req.height = Some(img.height());
                    req.frames.push(STANDARD.encode(img.as_raw()));
                }
                FramePayload::Keypoints(values) => req.keypoints.push(values.as_slice()),
            }
        }
        req
    }
}

#[async_trait]
impl Scorer for RemoteScorer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn infer(&self, sequence: &Sequence) -> Result<Inference> {
        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/infer", self.base_url))
            .json(&Self::request(sequence))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Scorer server error: {}", response.status()));
        }

        let mut inference: Inference = response.json().await?;
        if inference.latency_ms <= 0.0 {
            inference.latency_ms = elapsed_ms(start, Instant::now());
        }
        Ok(inference)
    }
}
