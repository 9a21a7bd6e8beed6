use image::RgbImage;
use signflow::config::{AssemblerConfig, BufferConfig};
use signflow::kernel::assembler::resample::{conform, pad_edges, plan_window, select_indices};
use signflow::kernel::assembler::{SequenceAssembler, SequenceOutlets};
use signflow::kernel::event::{Frame, FramePayload, Modality, Sequence};
use signflow::kernel::telemetry;
use std::time::{Duration, Instant};

const DIM: usize = 6;

fn config(keypoints: BufferConfig) -> AssemblerConfig {
    AssemblerConfig {
        keypoints,
        keypoint_dim: DIM,
        ..AssemblerConfig::default()
    }
}

fn keypoint_frame(index: u64, at: Instant) -> Frame {
    Frame::new(index, at, FramePayload::Keypoints(vec![index as f32 * 0.01; DIM]))
}

fn drain(outlets: &mut SequenceOutlets) -> Vec<Sequence> {
    let mut out = Vec::new();
    while let Ok(seq) = outlets.keypoints.try_recv() {
        out.push(seq);
    }
    out
}

#[tokio::test]
async fn test_eighty_frames_emit_after_64_and_80() {
    let cfg = config(BufferConfig {
        capacity: 128,
        sequence_length: 64,
        stride: 16,
        target_fps: 25.0,
    });
    let (mut assembler, mut outlets) = SequenceAssembler::new(&cfg, 5, telemetry::shared());
    let base = Instant::now();

    let mut emitted_after = Vec::new();
    let mut sequences = Vec::new();
    for i in 0..80u64 {
        let at = base + Duration::from_millis(40 * i);
        assert!(assembler.add_frame(Modality::Keypoints, keypoint_frame(i, at)));
        let ready = drain(&mut outlets);
        if !ready.is_empty() {
            emitted_after.push(i + 1);
        }
        sequences.extend(ready);
    }

    assert_eq!(emitted_after, vec![64, 80], "Sequences should follow frames 64 and 80");
    assert!(sequences.iter().all(|s| s.len() == 64));
    assert_eq!(sequences[0].frame_indices(), (0..64).collect::<Vec<u64>>());
    assert_eq!(sequences[1].frame_indices(), (16..80).collect::<Vec<u64>>());
    assert_eq!(sequences[0].generation, 1);
    assert_eq!(sequences[1].generation, 2);
}

#[tokio::test]
async fn test_short_stream_emits_nothing() {
    let cfg = config(BufferConfig {
        capacity: 64,
        sequence_length: 30,
        stride: 10,
        target_fps: 15.0,
    });
    let (mut assembler, mut outlets) = SequenceAssembler::new(&cfg, 5, telemetry::shared());
    let base = Instant::now();
    for i in 0..29u64 {
        assembler.add_frame(Modality::Keypoints, keypoint_frame(i, base + Duration::from_millis(66 * i)));
    }
    assert!(drain(&mut outlets).is_empty());
    assert_eq!(assembler.buffer_info(Modality::Keypoints).current_size, 29);
}

#[tokio::test]
async fn test_fast_stream_is_normalized_to_exact_length() {
    let cfg = config(BufferConfig {
        capacity: 128,
        sequence_length: 64,
        stride: 16,
        target_fps: 25.0,
    });
    let (mut assembler, mut outlets) = SequenceAssembler::new(&cfg, 5, telemetry::shared());
    let base = Instant::now();
    // 50 fps capture, twice the target rate
    for i in 0..64u64 {
        assembler.add_frame(Modality::Keypoints, keypoint_frame(i, base + Duration::from_millis(20 * i)));
    }
    let sequences = drain(&mut outlets);
    assert_eq!(sequences.len(), 1);

    let indices = sequences[0].frame_indices();
    assert_eq!(indices.len(), 64);
    assert!(indices.windows(2).all(|w| w[0] <= w[1]), "Order must be preserved");
    assert_eq!(indices[0], 0);
    assert_eq!(*indices.last().unwrap(), 63);
}

#[tokio::test]
async fn test_malformed_frame_rejected_without_emission() {
    let cfg = config(BufferConfig {
        capacity: 8,
        sequence_length: 2,
        stride: 1,
        target_fps: 15.0,
    });
    let shared = telemetry::shared();
    let (mut assembler, mut outlets) = SequenceAssembler::new(&cfg, 5, shared.clone());
    let now = Instant::now();

    let wrong_len = Frame::new(0, now, FramePayload::Keypoints(vec![0.0; DIM + 1]));
    let err = assembler.try_add_frame(Modality::Keypoints, wrong_len).unwrap_err();
    assert!(err.is_malformed());

    let non_finite = Frame::new(1, now, FramePayload::Keypoints(vec![f32::NAN; DIM]));
    assert!(!assembler.add_frame(Modality::Keypoints, non_finite));

    let image_in_pose_buffer = Frame::new(2, now, FramePayload::Image(RgbImage::new(224, 224)));
    assert!(assembler.try_add_frame(Modality::Keypoints, image_in_pose_buffer).is_err());

    assert!(drain(&mut outlets).is_empty());
    let info = assembler.buffer_info(Modality::Keypoints);
    assert_eq!(info.current_size, 0);
    assert_eq!(info.malformed_frames, 2);

    let snapshot = shared.lock().unwrap().snapshot();
    assert_eq!(snapshot.frame_stats.rejected.keypoints, 3);
}

#[tokio::test]
async fn test_video_frames_must_match_model_input() {
    let cfg = AssemblerConfig::default();
    let (mut assembler, _outlets) = SequenceAssembler::new(&cfg, 5, telemetry::shared());
    let now = Instant::now();

    let ok = Frame::new(0, now, FramePayload::Image(RgbImage::new(224, 224)));
    assert!(assembler.add_frame(Modality::Video, ok));

    let wrong = Frame::new(1, now, FramePayload::Image(RgbImage::new(100, 100)));
    assert!(!assembler.add_frame(Modality::Video, wrong));
    assert_eq!(assembler.buffer_info(Modality::Video).current_size, 1);
}

#[tokio::test]
async fn test_full_queue_sheds_newest_sequence() {
    let cfg = config(BufferConfig {
        capacity: 8,
        sequence_length: 2,
        stride: 1,
        target_fps: 15.0,
    });
    let shared = telemetry::shared();
    let (mut assembler, mut outlets) = SequenceAssembler::new(&cfg, 1, shared.clone());
    let base = Instant::now();

    for i in 0..4u64 {
        assert!(assembler.add_frame(Modality::Keypoints, keypoint_frame(i, base + Duration::from_millis(70 * i))));
    }

    // Frames 2, 3 and 4 each produced a sequence; only the first fit the queue.
    let queued = drain(&mut outlets);
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].generation, 1);

    let info = assembler.buffer_info(Modality::Keypoints);
    assert_eq!(info.sequences_emitted, 3);
    assert_eq!(info.sequences_shed, 2);
    assert_eq!(shared.lock().unwrap().snapshot().sequence_stats.shed.keypoints, 2);
}

#[tokio::test]
async fn test_buffer_never_exceeds_window_after_emission() {
    let cfg = config(BufferConfig {
        capacity: 16,
        sequence_length: 8,
        stride: 4,
        target_fps: 15.0,
    });
    let (mut assembler, mut outlets) = SequenceAssembler::new(&cfg, 64, telemetry::shared());
    let base = Instant::now();
    for i in 0..200u64 {
        assert!(assembler.add_frame(Modality::Keypoints, keypoint_frame(i, base + Duration::from_millis(66 * i))));
        assert!(assembler.buffer_info(Modality::Keypoints).current_size <= 8);
    }
    let info = assembler.buffer_info(Modality::Keypoints);
    assert_eq!(info.dropped_frames, 0);
    assert!(drain(&mut outlets).iter().all(|s| s.len() == 8));
}

#[tokio::test]
async fn test_closed_assembler_refuses_frames() {
    let cfg = config(BufferConfig {
        capacity: 8,
        sequence_length: 4,
        stride: 2,
        target_fps: 15.0,
    });
    let (mut assembler, _outlets) = SequenceAssembler::new(&cfg, 5, telemetry::shared());
    let now = Instant::now();
    assert!(assembler.add_frame(Modality::Keypoints, keypoint_frame(0, now)));

    assembler.close();
    assert!(!assembler.is_open());
    assert_eq!(assembler.buffer_info(Modality::Keypoints).current_size, 0);
    assert!(!assembler.add_frame(Modality::Keypoints, keypoint_frame(1, now)));
}

#[tokio::test]
async fn test_dropped_worker_surfaces_as_error() {
    let cfg = config(BufferConfig {
        capacity: 8,
        sequence_length: 2,
        stride: 1,
        target_fps: 15.0,
    });
    let (mut assembler, outlets) = SequenceAssembler::new(&cfg, 5, telemetry::shared());
    drop(outlets);
    let now = Instant::now();

    assert!(assembler.try_add_frame(Modality::Keypoints, keypoint_frame(0, now)).is_ok());
    let err = assembler.try_add_frame(Modality::Keypoints, keypoint_frame(1, now)).unwrap_err();
    assert!(!err.is_malformed());
    assert_eq!(err.kind(), "worker_gone");
}

#[test]
fn test_index_map_round_trip_40_64_40() {
    let up = select_indices(40, 64);
    let down = select_indices(64, 40);
    assert_eq!(up.len(), 64);
    let back: Vec<usize> = down.iter().map(|&i| up[i]).collect();
    assert_eq!(back, (0..40).collect::<Vec<usize>>());
}

#[test]
fn test_conform_pads_edges_and_selects_evenly() {
    assert_eq!(pad_edges(3, 6), vec![0, 0, 1, 2, 2, 2]);
    assert_eq!(conform(5, 3), vec![0, 2, 4]);
    assert_eq!(conform(4, 4), vec![0, 1, 2, 3]);
    assert_eq!(select_indices(7, 1), vec![6]);
}

#[test]
fn test_plan_window_always_returns_sequence_length() {
    let base = Instant::now();
    for n in 1..20usize {
        for &fps in &[5.0, 15.0, 25.0, 60.0] {
            let times: Vec<Instant> = (0..n as u64).map(|i| base + Duration::from_millis(33 * i)).collect();
            let plan = plan_window(&times, fps, 12);
            assert_eq!(plan.len(), 12, "n={} fps={}", n, fps);
            assert!(plan.iter().all(|&i| i < n));
        }
    }
}
