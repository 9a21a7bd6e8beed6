//! Sliding-window sequence assembler.
//!
//! Frames are buffered per modality. Every `stride` accepted frames (once a
//! full window exists) the newest `sequence_length` frames are normalized to
//! the modality's target rate and handed to that modality's work queue. The
//! hand-off never blocks: a full queue sheds the newest sequence.

pub mod buffer;
pub mod resample;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::config::AssemblerConfig;
use crate::error::{PipelineError, Result};
use crate::kernel::event::{Frame, Modality, Sequence};
use crate::kernel::telemetry::event::TelemetryEvent;
use crate::kernel::telemetry::{self, SharedTelemetry};

use buffer::{BufferInfo, BufferOutcome, FrameBuffer};

/// Receiving ends of the per-modality work queues.
pub struct SequenceOutlets {
    pub video: mpsc::Receiver<Sequence>,
    pub keypoints: mpsc::Receiver<Sequence>,
}

pub struct SequenceAssembler {
    video: FrameBuffer,
    keypoints: FrameBuffer,
    video_tx: mpsc::Sender<Sequence>,
    keypoints_tx: mpsc::Sender<Sequence>,
    telemetry: SharedTelemetry,
    open: bool,
}

impl SequenceAssembler {
    pub fn new(
        config: &AssemblerConfig,
        queue_capacity: usize,
        telemetry: SharedTelemetry,
    ) -> (Self, SequenceOutlets) {
        let (video_tx, video_rx) = mpsc::channel(queue_capacity.max(1));
        let (keypoints_tx, keypoints_rx) = mpsc::channel(queue_capacity.max(1));

        let assembler = Self {
            video: FrameBuffer::new(
                Modality::Video,
                config.buffer(Modality::Video),
                config.shape(Modality::Video),
            ),
            keypoints: FrameBuffer::new(
                Modality::Keypoints,
                config.buffer(Modality::Keypoints),
                config.shape(Modality::Keypoints),
            ),
            video_tx,
            keypoints_tx,
            telemetry,
            open: true,
        };

        (
            assembler,
            SequenceOutlets {
                video: video_rx,
                keypoints: keypoints_rx,
            },
        )
    }

    fn buffer_mut(&mut self, modality: Modality) -> &mut FrameBuffer {
        match modality {
            Modality::Video => &mut self.video,
            Modality::Keypoints => &mut self.keypoints,
        }
    }

    /// Offers a frame. `true` if it was buffered; `false` if it was dropped
    /// (ring full, malformed, worker gone, or assembler closed). Never blocks.
    pub fn add_frame(&mut self, modality: Modality, frame: Frame) -> bool {
        self.try_add_frame(modality, frame).unwrap_or(false)
    }

    /// Like [`add_frame`](Self::add_frame) but surfaces malformed frames and a
    /// vanished worker as errors so the caller can answer the offending event.
    pub fn try_add_frame(&mut self, modality: Modality, frame: Frame) -> Result<bool> {
        if !self.open {
            return Ok(false);
        }
        if frame.modality() != modality {
            telemetry::record(&self.telemetry, TelemetryEvent::FrameRejected { modality });
            return Err(PipelineError::MalformedFrame {
                modality,
                reason: format!("{} payload offered to {} buffer", frame.modality(), modality),
            });
        }

        let outcome = match self.buffer_mut(modality).push(frame) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!("Rejected {} frame: {}", modality, e);
                telemetry::record(&self.telemetry, TelemetryEvent::FrameRejected { modality });
                return Err(e);
            }
        };

        match outcome {
            BufferOutcome::Dropped => {
                debug!("{} buffer full, frame dropped", modality);
                telemetry::record(&self.telemetry, TelemetryEvent::FrameDropped { modality });
                Ok(false)
            }
            BufferOutcome::Accepted(None) => Ok(true),
            BufferOutcome::Accepted(Some(sequence)) => {
                self.hand_off(sequence)?;
                Ok(true)
            }
        }
    }

    /// A full queue sheds the sequence. A closed queue means the modality's
    /// worker is gone, which the caller cannot recover from.
    fn hand_off(&mut self, sequence: Sequence) -> Result<()> {
        let modality = sequence.modality;
        let generation = sequence.generation;
        telemetry::record(
            &self.telemetry,
            TelemetryEvent::SequenceEmitted { modality, generation },
        );

        let tx = match modality {
            Modality::Video => &self.video_tx,
            Modality::Keypoints => &self.keypoints_tx,
        };
        match tx.try_send(sequence) {
            Ok(()) => {
                debug!("{} sequence {} queued", modality, generation);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("{} work queue full, dropping sequence {}", modality, generation);
                self.buffer_mut(modality).note_shed();
                telemetry::record(
                    &self.telemetry,
                    TelemetryEvent::SequenceShed { modality, generation },
                );
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("{} worker gone, discarding sequence {}", modality, generation);
                self.buffer_mut(modality).note_shed();
                Err(PipelineError::WorkerGone(modality))
            }
        }
    }

    pub fn buffer_info(&self, modality: Modality) -> BufferInfo {
        match modality {
            Modality::Video => self.video.info(),
            Modality::Keypoints => self.keypoints.info(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Stops accepting frames and releases buffered memory.
    pub fn close(&mut self) {
        self.open = false;
        self.clear();
    }

    pub fn clear(&mut self) {
        self.video.clear();
        self.keypoints.clear();
    }
}
