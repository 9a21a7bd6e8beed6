use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::assembler::SequenceAssembler;
use super::event::{validate_keypoints, Frame, FramePayload, Modality};
use super::fusion::types::{Channel, ChannelWeights};
use super::fusion::EnsembleEngine;
use super::governor::{self, Metric, SharedGovernor};
use super::message::{
    BufferReport, FrameMessage, Inbound, Outbound, OutboundBody, Performance, StatusReport, TranslationResponse,
};
use super::mode::{Mode, ModeArbitrator};
use super::telemetry::event::{QualityChange, TelemetryEvent};
use super::telemetry::metrics::TelemetrySnapshot;
use super::telemetry::{self, SharedTelemetry};
use super::worker::ScorerWorker;
use crate::audio::{decode_pcm16, rms_level};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::services::keypoints::Keypoints;
use crate::services::Services;
use crate::vision::{decode_base64, decode_image, to_model_input, MotionTracker};

/// Payloads of one frame message after decoding and validation.
struct DecodedEvent {
    image: Option<RgbImage>,
    keypoints: Option<Keypoints>,
    audio: Option<(Vec<f32>, u32)>,
    hands_present: Option<bool>,
}

/// Per-session pipeline. Owns the assembler, the arbitrator and the fusion
/// engine; the governor is shared with every other session.
///
/// Events are handled one at a time from the session loop. Scoring runs on
/// the two worker tasks spawned at construction, which feed the engine.
pub struct Reactor {
    session_id: String,
    config: PipelineConfig,
    services: Services,
    assembler: SequenceAssembler,
    arbitrator: ModeArbitrator,
    motion: MotionTracker,
    engine: Arc<EnsembleEngine>,
    governor: SharedGovernor,
    telemetry: SharedTelemetry,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    next_index: [u64; 2],
}

impl Reactor {
    /// Builds the pipeline and spawns one scorer worker per modality. Must be
    /// called from within a tokio runtime.
    pub fn new(
        session_id: impl Into<String>,
        config: &PipelineConfig,
        services: Services,
        governor: SharedGovernor,
    ) -> Result<Self> {
        let session_id = session_id.into();
        let telemetry = telemetry::shared();
        let cancel = CancellationToken::new();
        let engine = Arc::new(EnsembleEngine::new(&config.fusion, Arc::clone(&services.vocabulary))?);
        let (assembler, outlets) =
            SequenceAssembler::new(&config.assembler, config.session.queue_capacity, Arc::clone(&telemetry));

        let worker = |modality: Modality| {
            let scorer = match modality {
                Modality::Video => Arc::clone(&services.appearance),
                Modality::Keypoints => Arc::clone(&services.pose),
            };
            ScorerWorker::new(
                modality,
                scorer,
                Arc::clone(&engine),
                Arc::clone(&governor),
                Arc::clone(&telemetry),
                cancel.clone(),
                config.scorer.timeout(),
            )
        };
        let workers = vec![
            worker(Modality::Video).spawn(outlets.video),
            worker(Modality::Keypoints).spawn(outlets.keypoints),
        ];

        info!("Session {} pipeline started", session_id);
        Ok(Self {
            session_id,
            config: config.clone(),
            assembler,
            arbitrator: ModeArbitrator::new(&config.mode),
            motion: MotionTracker::new(),
            engine,
            governor,
            telemetry,
            cancel,
            workers,
            next_index: [0, 0],
            services,
        })
    }

    pub fn handle(&mut self, inbound: Inbound) -> Result<Outbound> {
        match inbound {
            Inbound::Frame(frame) => self.handle_frame(frame),
            Inbound::SetMode { mode } => {
                self.set_mode(mode);
                Ok(Outbound::ack("set_mode", None))
            }
            Inbound::Status => Ok(Outbound::new(OutboundBody::Status(Box::new(self.status())))),
            Inbound::ResetQuality => {
                governor::lock(&self.governor).reset_quality();
                telemetry::record(
                    &self.telemetry,
                    TelemetryEvent::QualityAdjusted(QualityChange::Reset),
                );
                Ok(Outbound::ack("reset_quality", None))
            }
            Inbound::SetWeights { appearance, pose } => {
                let weights = self.engine.set_weights(ChannelWeights { appearance, pose })?;
                Ok(Outbound::ack("set_weights", Some(weights)))
            }
            Inbound::ApplyAdaptiveWeights => {
                let weights = self.engine.set_weights(self.engine.adaptive_weights())?;
                Ok(Outbound::ack("apply_adaptive_weights", Some(weights)))
            }
        }
    }

    /// Runs one unified input event through the pipeline. Every payload is
    /// decoded and shape-checked before anything is buffered, so a rejected
    /// event leaves the pipeline untouched.
    pub fn handle_frame(&mut self, msg: FrameMessage) -> Result<Outbound> {
        let start = Instant::now();
        let input = self.decode(msg)?;

        if governor::lock(&self.governor).should_skip_frame() {
            telemetry::record(&self.telemetry, TelemetryEvent::FrameSkipped);
            return Ok(Outbound::frame_skipped());
        }

        let now = Instant::now();
        let mut optimized = false;

        let mut audio_level = 0.0;
        if let Some((samples, rate)) = input.audio {
            let (samples, _, resampled) = governor::lock(&self.governor).optimize_audio_chunk(samples, rate)?;
            optimized |= resampled;
            audio_level = rms_level(&samples);
        }

        let mut keypoints: Option<Keypoints> = None;
        if let Some(image) = input.image {
            let (image, resized) = governor::lock(&self.governor).optimize_video_frame(image);
            optimized |= resized;
            keypoints = self.services.extractor.extract(&image).filter(|kp| {
                let ok = self.keypoints_fit(&kp.values);
                if !ok {
                    warn!("Extractor returned {} keypoint values, ignored", kp.values.len());
                }
                ok
            });
            let model_input = to_model_input(&image, self.config.assembler.video_input);
            self.offer(Modality::Video, FramePayload::Image(model_input), now)?;
        }
        if input.keypoints.is_some() {
            keypoints = input.keypoints;
        }

        let mut motion_level = 0.0;
        let mut has_hands = input.hands_present.unwrap_or(false);
        if let Some(kp) = keypoints {
            has_hands = input.hands_present.unwrap_or(kp.hands_present);
            if kp.hands_present {
                motion_level = self.motion.update(&kp.values);
            }
            if kp.confidence > self.config.assembler.keypoint_min_confidence {
                self.offer(Modality::Keypoints, FramePayload::Keypoints(kp.values), now)?;
            } else {
                debug!("Keypoints below confidence gate ({:.2}), not buffered", kp.confidence);
            }
        }

        let before = self.arbitrator.current();
        let mode = self.arbitrator.observe_at(now, audio_level, motion_level, has_hands);
        if mode != before {
            telemetry::record(
                &self.telemetry,
                TelemetryEvent::ModeTransition {
                    from: before,
                    to: mode,
                    manual: false,
                },
            );
        }

        // Speech mode hands translation to the speech path; no gloss is reported.
        let translation = match mode {
            Mode::Speech => None,
            Mode::Sign | Mode::Auto => self.engine.fuse(),
        };
        let detections = Channel::ALL
            .iter()
            .filter_map(|c| self.engine.latest(*c))
            .map(|d| d.detection())
            .collect();

        let latency_ms = governor::lock(&self.governor).measure_latency(start, Metric::Translation);
        if latency_ms > self.config.governor.adjust_trigger_ms {
            let changes = governor::lock(&self.governor).auto_adjust_quality();
            for change in changes {
                telemetry::record(&self.telemetry, TelemetryEvent::QualityAdjusted(change));
            }
        }

        Ok(Outbound::new(OutboundBody::TranslationResult(Box::new(TranslationResponse {
            mode,
            audio_level,
            motion_level,
            translation,
            mode_info: self.arbitrator.mode_info_at(Instant::now()),
            performance: Performance { latency_ms, optimized },
            detections,
        }))))
    }

    fn decode(&self, msg: FrameMessage) -> Result<DecodedEvent> {
        let image = match &msg.video {
            Some(video) => Some(decode_image(&decode_base64(video)?)?),
            None => None,
        };

        let keypoints = match msg.keypoints {
            Some(values) => {
                if let Err(e) = validate_keypoints(&values, self.config.assembler.keypoint_dim) {
                    telemetry::record(
                        &self.telemetry,
                        TelemetryEvent::FrameRejected {
                            modality: Modality::Keypoints,
                        },
                    );
                    return Err(e);
                }
                Some(Keypoints {
                    values,
                    confidence: msg.keypoint_confidence.unwrap_or(1.0),
                    hands_present: msg.hands_present.unwrap_or(true),
                })
            }
            None => None,
        };

        let audio = match &msg.audio {
            Some(audio) => {
                let samples = decode_pcm16(&decode_base64(audio)?)?;
                let rate = msg
                    .audio_sample_rate
                    .unwrap_or(self.config.governor.audio_sample_rate);
                Some((samples, rate))
            }
            None => None,
        };

        Ok(DecodedEvent {
            image,
            keypoints,
            audio,
            hands_present: msg.hands_present,
        })
    }

    fn keypoints_fit(&self, values: &[f32]) -> bool {
        validate_keypoints(values, self.config.assembler.keypoint_dim).is_ok()
    }

    fn offer(&mut self, modality: Modality, payload: FramePayload, captured_at: Instant) -> Result<bool> {
        let slot = match modality {
            Modality::Video => 0,
            Modality::Keypoints => 1,
        };
        let index = self.next_index[slot];
        self.next_index[slot] += 1;
        self.assembler.try_add_frame(modality, Frame::new(index, captured_at, payload))
    }

    pub fn set_mode(&mut self, mode: Mode) {
        let before = self.arbitrator.current();
        self.arbitrator.set_mode(mode);
        telemetry::record(
            &self.telemetry,
            TelemetryEvent::ModeTransition {
                from: before,
                to: mode,
                manual: true,
            },
        );
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            session_id: self.session_id.clone(),
            mode_info: self.arbitrator.mode_info(),
            fusion: self.engine.report(),
            governor: governor::lock(&self.governor).report(),
            buffers: BufferReport {
                video: self.assembler.buffer_info(Modality::Video),
                keypoints: self.assembler.buffer_info(Modality::Keypoints),
            },
            telemetry: self.telemetry_snapshot(),
        }
    }

    pub fn telemetry_snapshot(&self) -> TelemetrySnapshot {
        self.telemetry.lock().unwrap_or_else(|e| e.into_inner()).snapshot()
    }

    pub fn telemetry(&self) -> &SharedTelemetry {
        &self.telemetry
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn engine(&self) -> &Arc<EnsembleEngine> {
        &self.engine
    }

    pub fn assembler(&self) -> &SequenceAssembler {
        &self.assembler
    }

    pub fn mode(&self) -> Mode {
        self.arbitrator.current()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops enqueuing and releases buffered frames. Scorer calls already in
    /// flight run to completion; their results are discarded.
    pub fn close(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.assembler.close();
        self.motion.reset();
        info!("Session {} pipeline closed", self.session_id);
    }

    /// Closes the pipeline and waits for both workers to exit.
    pub async fn shutdown(mut self) {
        self.close();
        for handle in self.workers.drain(..) {
            let _ = handle.await;
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
