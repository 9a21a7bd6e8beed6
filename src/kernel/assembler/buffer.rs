use ringbuf::{traits::*, HeapRb};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use super::resample::plan_window;
use crate::config::BufferConfig;
use crate::error::Result;
use crate::kernel::event::{Frame, FrameShape, Modality, Sequence};

/// Result of offering one frame to a modality buffer.
#[derive(Debug)]
pub enum BufferOutcome {
    /// Frame buffered; carries the sequence when the stride trigger fired.
    Accepted(Option<Sequence>),
    /// Ring was full; the frame was discarded.
    Dropped,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BufferInfo {
    pub current_size: usize,
    pub capacity: usize,
    pub sequence_length: usize,
    pub stride: usize,
    pub total_frames: u64,
    pub dropped_frames: u64,
    pub malformed_frames: u64,
    pub sequences_emitted: u64,
    pub sequences_shed: u64,
}

/// Fixed-capacity ring of frames for one modality with the stride trigger.
pub struct FrameBuffer {
    modality: Modality,
    config: BufferConfig,
    shape: FrameShape,
    ring: HeapRb<Arc<Frame>>,
    since_emit: usize,
    generation: u64,
    info: BufferInfo,
}

impl FrameBuffer {
    pub fn new(modality: Modality, config: BufferConfig, shape: FrameShape) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            modality,
            config,
            shape,
            ring: HeapRb::new(capacity),
            since_emit: 0,
            generation: 0,
            info: BufferInfo {
                capacity,
                sequence_length: config.sequence_length,
                stride: config.stride,
                ..BufferInfo::default()
            },
        }
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    /// Validates and buffers a frame. Malformed frames are counted and
    /// returned as errors without touching the ring.
    pub fn push(&mut self, frame: Frame) -> Result<BufferOutcome> {
        if let Err(e) = frame.payload.validate(self.shape) {
            self.info.malformed_frames += 1;
            return Err(e);
        }

        if self.ring.try_push(Arc::new(frame)).is_err() {
            self.info.dropped_frames += 1;
            return Ok(BufferOutcome::Dropped);
        }
        self.info.total_frames += 1;
        self.since_emit += 1;

        Ok(BufferOutcome::Accepted(self.check_stride()))
    }

    fn check_stride(&mut self) -> Option<Sequence> {
        let len = self.ring.occupied_len();
        if self.since_emit < self.config.stride || len < self.config.sequence_length {
            return None;
        }

        let window: Vec<Arc<Frame>> = self
            .ring
            .iter()
            .skip(len - self.config.sequence_length)
            .cloned()
            .collect();
        let times: Vec<Instant> = window.iter().map(|f| f.captured_at).collect();
        let frames: Vec<Arc<Frame>> = plan_window(&times, self.config.target_fps, self.config.sequence_length)
            .into_iter()
            .map(|i| Arc::clone(&window[i]))
            .collect();

        self.generation += 1;
        self.since_emit = 0;

        // Frames older than (sequence_length - stride) can never fall inside a
        // future window.
        let keep = self.config.sequence_length.saturating_sub(self.config.stride);
        self.ring.skip(len.saturating_sub(keep));

        match Sequence::new(self.modality, self.generation, frames, self.config.sequence_length) {
            Ok(sequence) => {
                self.info.sequences_emitted += 1;
                Some(sequence)
            }
            Err(e) => {
                tracing::error!("{} window plan produced an invalid sequence: {}", self.modality, e);
                None
            }
        }
    }

    pub fn note_shed(&mut self) {
        self.info.sequences_shed += 1;
    }

    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn info(&self) -> BufferInfo {
        BufferInfo {
            current_size: self.ring.occupied_len(),
            ..self.info
        }
    }

    /// Releases all buffered frames. Counters are kept.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.since_emit = 0;
    }
}
