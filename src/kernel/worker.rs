//! Per-modality scorer task.
//!
//! Drains one work queue, calls the scorer under a timeout and submits the
//! resulting distribution to the fusion engine. Failures and timeouts leave
//! the channel's input absent; they are logged and counted, never surfaced.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::kernel::event::{Modality, Sequence};
use crate::kernel::fusion::types::{Channel, Distribution};
use crate::kernel::fusion::EnsembleEngine;
use crate::kernel::governor::{self, Metric, SharedGovernor};
use crate::kernel::telemetry::event::{ScorerFailure, TelemetryEvent};
use crate::kernel::telemetry::{self, SharedTelemetry};
use crate::kernel::time::elapsed_ms;
use crate::services::scorer::Scorer;

pub struct ScorerWorker {
    modality: Modality,
    scorer: Arc<dyn Scorer>,
    engine: Arc<EnsembleEngine>,
    governor: SharedGovernor,
    telemetry: SharedTelemetry,
    cancel: CancellationToken,
    timeout: Duration,
}

impl ScorerWorker {
    pub fn new(
        modality: Modality,
        scorer: Arc<dyn Scorer>,
        engine: Arc<EnsembleEngine>,
        governor: SharedGovernor,
        telemetry: SharedTelemetry,
        cancel: CancellationToken,
        timeout: Duration,
    ) -> Self {
        Self {
            modality,
            scorer,
            engine,
            governor,
            telemetry,
            cancel,
            timeout,
        }
    }

    pub fn spawn(self, rx: mpsc::Receiver<Sequence>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    pub async fn run(self, mut rx: mpsc::Receiver<Sequence>) {
        info!("{} scorer worker started ({})", self.modality, self.scorer.name());
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(sequence) => self.score(sequence).await,
                    None => break,
                },
            }
        }
        info!("{} scorer worker stopped", self.modality);
    }

    /// Scores one sequence. A call that completes after cancellation is
    /// discarded.
    pub async fn score(&self, sequence: Sequence) {
        let generation = sequence.generation;
        let start = Instant::now();
        let outcome = timeout(self.timeout, self.scorer.infer(&sequence)).await;
        let latency = elapsed_ms(start, Instant::now());

        if self.cancel.is_cancelled() {
            debug!("{} sequence {} scored after cancellation, discarded", self.modality, generation);
            return;
        }
        governor::lock(&self.governor).record_latency(Metric::Inference, latency);

        let failure = |reason: ScorerFailure| TelemetryEvent::ScorerFailed {
            modality: self.modality,
            generation,
            reason,
        };

        let inference = match outcome {
            Err(_) => {
                warn!("{} scorer timed out on sequence {} after {:?}", self.modality, generation, self.timeout);
                telemetry::record(&self.telemetry, failure(ScorerFailure::Timeout));
                return;
            }
            Ok(Err(e)) => {
                warn!("{} scorer failed on sequence {}: {}", self.modality, generation, e);
                telemetry::record(&self.telemetry, failure(ScorerFailure::Error));
                return;
            }
            Ok(Ok(inference)) if !inference.success => {
                warn!("{} scorer reported failure on sequence {}", self.modality, generation);
                telemetry::record(&self.telemetry, failure(ScorerFailure::Error));
                return;
            }
            Ok(Ok(inference)) => inference,
        };

        let distribution = match Distribution::from_scores(
            Channel::for_modality(self.modality),
            generation,
            inference.scores,
            self.engine.vocabulary().as_ref(),
            latency,
        ) {
            Ok(d) => d,
            Err(e) => {
                warn!("{} scorer returned unusable scores for sequence {}: {}", self.modality, generation, e);
                telemetry::record(&self.telemetry, failure(ScorerFailure::InvalidOutput));
                return;
            }
        };

        debug!(
            "{} sequence {} scored: {} ({:.3})",
            self.modality,
            generation,
            distribution.top_label(),
            distribution.confidence()
        );
        self.engine.submit(distribution);
        telemetry::record(
            &self.telemetry,
            TelemetryEvent::ScorerCompleted {
                modality: self.modality,
                generation,
                latency_ms: latency as u64,
            },
        );
    }
}
