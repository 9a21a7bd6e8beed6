/// Per-session motion estimate from consecutive keypoint frames.
#[derive(Debug, Default)]
pub struct MotionTracker {
    previous: Option<Vec<f32>>,
}

impl MotionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mean Euclidean displacement of xyz triples since the previous frame,
    /// scaled by 10 and clamped to [0, 1]. The first frame, or a frame whose
    /// length differs from the previous one, reads as no motion.
    pub fn update(&mut self, keypoints: &[f32]) -> f32 {
        let level = match &self.previous {
            Some(prev) if prev.len() == keypoints.len() => displacement(prev, keypoints),
            _ => 0.0,
        };
        self.previous = Some(keypoints.to_vec());
        level
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

fn displacement(prev: &[f32], next: &[f32]) -> f32 {
    let mut total = 0.0f32;
    let mut points = 0usize;
    for (a, b) in prev.chunks_exact(3).zip(next.chunks_exact(3)) {
        let dx = b[0] - a[0];
        let dy = b[1] - a[1];
        let dz = b[2] - a[2];
        total += (dx * dx + dy * dy + dz * dz).sqrt();
        points += 1;
    }
    if points == 0 {
        return 0.0;
    }
    let level = (total / points as f32) * 10.0;
    if level.is_finite() {
        level.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
