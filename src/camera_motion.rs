// src/camera_motion.rs
//
// Per-frame global camera pan estimation from sparse background features.
//
// Candidate feature points are reseeded every frame inside a fixed
// background mask (far column bands where players rarely appear), then
// matched from frame i-1 into frame i with a SAD patch search. The
// maximum-magnitude valid displacement is taken as the camera pan for the
// pair; below the noise threshold the frame counts as stationary.
//
// The max-magnitude pick is sensitive to outliers. It is kept for
// behavioral compatibility with the deployed estimator; a trimmed mean is
// the obvious replacement if compatibility is ever dropped.
//
// This stage is inherently sequential: frame i's delta needs frame i-1's
// pixels, so frames cannot be processed out of order.

use crate::track_store::TrackStore;
use crate::types::{CameraMotionConfig, Frame, Point};
use tracing::{debug, trace};

// ============================================================================
// GRAYSCALE FRAME
// ============================================================================

/// Row-major grayscale image: pixel at (x, y) = data[y * width + x].
struct GrayFrame {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl GrayFrame {
    /// ITU-R BT.601 luma conversion from packed RGB.
    fn from_rgb(frame: &Frame) -> Self {
        let mut gray = Vec::with_capacity(frame.width * frame.height);
        for pixel in frame.data.chunks_exact(3) {
            let g =
                (0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32) as u8;
            gray.push(g);
        }
        Self {
            data: gray,
            width: frame.width,
            height: frame.height,
        }
    }

    #[inline]
    fn pixel(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

// ============================================================================
// FEATURE SELECTION
// ============================================================================

/// Gradient energy at (x, y): |dx| + |dy| with central differences.
/// Caller guarantees 1 <= x < width-1, 1 <= y < height-1.
#[inline]
fn gradient_energy(f: &GrayFrame, x: usize, y: usize) -> u32 {
    let gx = (f.pixel(x + 1, y) as i32 - f.pixel(x - 1, y) as i32).unsigned_abs();
    let gy = (f.pixel(x, y + 1) as i32 - f.pixel(x, y - 1) as i32).unsigned_abs();
    gx + gy
}

/// Pick up to `max_features` strong-gradient pixels inside the background
/// mask, enforcing a minimum spacing so features do not cluster on one edge.
fn select_features(frame: &GrayFrame, config: &CameraMotionConfig) -> Vec<(usize, usize)> {
    let half = config.patch_size / 2;
    let mut candidates: Vec<(u32, usize, usize)> = Vec::new();

    for span in &config.mask_columns {
        let x_lo = span.start.max(half).max(1);
        let x_hi = span.end.min(frame.width.saturating_sub(half + 1));
        let y_lo = half.max(1);
        let y_hi = frame.height.saturating_sub(half + 1);

        for y in y_lo..y_hi {
            for x in x_lo..x_hi {
                let score = gradient_energy(frame, x, y);
                if score >= config.min_feature_quality {
                    candidates.push((score, x, y));
                }
            }
        }
    }

    candidates.sort_by(|a, b| b.0.cmp(&a.0));

    let spacing = config.min_feature_spacing as i64;
    let mut selected: Vec<(usize, usize)> = Vec::with_capacity(config.max_features);
    for (_, x, y) in candidates {
        if selected.len() >= config.max_features {
            break;
        }
        let far_enough = selected.iter().all(|&(sx, sy)| {
            (sx as i64 - x as i64).abs() >= spacing || (sy as i64 - y as i64).abs() >= spacing
        });
        if far_enough {
            selected.push((x, y));
        }
    }
    selected
}

// ============================================================================
// PATCH MATCHING
// ============================================================================

/// SAD between the patch centered at (px, py) in `prev` and the patch
/// centered at (cx, cy) in `curr`. Both patches must be in bounds.
#[inline]
fn sad_patch(prev: &GrayFrame, curr: &GrayFrame, px: usize, py: usize, cx: usize, cy: usize, half: usize) -> u32 {
    let mut sum: u32 = 0;
    for dy in 0..(2 * half + 1) {
        let p_row = (py - half + dy) * prev.width + (px - half);
        let c_row = (cy - half + dy) * curr.width + (cx - half);
        for dx in 0..(2 * half + 1) {
            let diff = prev.data[p_row + dx] as i32 - curr.data[c_row + dx] as i32;
            sum += diff.unsigned_abs();
        }
    }
    sum
}

/// Best displacement of the feature at (x, y) from `prev` into `curr`,
/// searched over a bounded window. Returns None when no candidate position
/// matches below the acceptance error.
fn match_feature(
    prev: &GrayFrame,
    curr: &GrayFrame,
    x: usize,
    y: usize,
    config: &CameraMotionConfig,
) -> Option<(f32, f32)> {
    let half = config.patch_size / 2;
    let sr = config.search_range as i64;

    let cx_lo = ((x as i64) - sr).max(half as i64) as usize;
    let cx_hi = ((x as i64) + sr).min((curr.width - half - 1) as i64) as usize;
    let cy_lo = ((y as i64) - sr).max(half as i64) as usize;
    let cy_hi = ((y as i64) + sr).min((curr.height - half - 1) as i64) as usize;

    let mut best_sad = u32::MAX;
    let mut best: (i64, i64) = (0, 0);

    for cy in cy_lo..=cy_hi {
        for cx in cx_lo..=cx_hi {
            let score = sad_patch(prev, curr, x, y, cx, cy, half);
            if score < best_sad {
                best_sad = score;
                best = (cx as i64 - x as i64, cy as i64 - y as i64);
            }
        }
    }

    let patch_area = (config.patch_size * config.patch_size) as f32;
    if best_sad == u32::MAX || best_sad as f32 / patch_area > config.max_match_error {
        return None;
    }
    Some((best.0 as f32, best.1 as f32))
}

// ============================================================================
// ESTIMATOR
// ============================================================================

pub struct CameraMotionEstimator {
    config: CameraMotionConfig,
}

impl CameraMotionEstimator {
    pub fn new(config: CameraMotionConfig) -> Self {
        Self { config }
    }

    /// Cumulative camera displacement per frame. `result[0]` is (0, 0);
    /// `result[i] = result[i-1] + delta(i-1, i)`, never corrected
    /// retroactively. A frame pair with no valid matches contributes a zero
    /// delta (degraded, continue).
    pub fn estimate(&self, frames: &[Frame]) -> Vec<Point> {
        if frames.is_empty() {
            return Vec::new();
        }
        let mut movement = Vec::with_capacity(frames.len());
        movement.push(Point::new(0.0, 0.0));

        let mut prev = GrayFrame::from_rgb(&frames[0]);

        for (i, frame) in frames.iter().enumerate().skip(1) {
            let curr = GrayFrame::from_rgb(frame);
            let features = select_features(&prev, &self.config);

            let mut max_mag = 0.0f32;
            let mut delta = Point::new(0.0, 0.0);

            for &(x, y) in &features {
                if let Some((dx, dy)) = match_feature(&prev, &curr, x, y, &self.config) {
                    let mag = (dx * dx + dy * dy).sqrt();
                    if mag > max_mag {
                        max_mag = mag;
                        delta = Point::new(dx, dy);
                    }
                }
            }

            if max_mag < self.config.min_camera_movement {
                delta = Point::new(0.0, 0.0);
            }

            trace!(
                frame = i,
                features = features.len(),
                dx = delta.x,
                dy = delta.y,
                "camera pan estimate"
            );

            let prev_cumulative = movement[i - 1];
            movement.push(prev_cumulative + delta);
            prev = curr;
        }

        debug!(
            frames = frames.len(),
            final_dx = movement.last().map(|p| p.x).unwrap_or(0.0),
            final_dy = movement.last().map(|p| p.y).unwrap_or(0.0),
            "camera movement estimated"
        );
        movement
    }
}

/// Stabilize every anchor against camera pan:
/// `adjusted = anchor - cumulative[frame]`.
pub fn adjust_track_positions(store: &mut TrackStore, movement: &[Point]) {
    for (frame_idx, cumulative) in movement.iter().enumerate() {
        for person in store.players[frame_idx].values_mut() {
            person.adjusted_anchor = Some(person.anchor - *cumulative);
        }
        for person in store.referees[frame_idx].values_mut() {
            person.adjusted_anchor = Some(person.anchor - *cumulative);
        }
        if let Some(ball) = store.ball[frame_idx].as_mut() {
            ball.adjusted_anchor = Some(ball.anchor - *cumulative);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnSpan;

    /// Deterministic non-periodic texture so SAD matches are unambiguous.
    fn texel(x: i64, y: i64) -> u8 {
        let mut v = (x.wrapping_mul(2654435761) ^ y.wrapping_mul(40503)) as u64;
        v ^= v >> 13;
        (v % 256) as u8
    }

    /// RGB frame whose texture is shifted right by `shift` pixels.
    fn make_frame(width: usize, height: usize, shift: i64) -> Frame {
        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                let g = texel(x as i64 - shift, y as i64);
                data.extend_from_slice(&[g, g, g]);
            }
        }
        Frame::new(data, width, height)
    }

    fn test_config() -> CameraMotionConfig {
        CameraMotionConfig {
            mask_columns: vec![
                ColumnSpan { start: 0, end: 25 },
                ColumnSpan { start: 95, end: 120 },
            ],
            max_features: 20,
            min_feature_spacing: 3,
            min_feature_quality: 10,
            patch_size: 7,
            search_range: 12,
            max_match_error: 10.0,
            min_camera_movement: 5.0,
        }
    }

    #[test]
    fn frame_zero_displacement_is_zero() {
        let est = CameraMotionEstimator::new(test_config());
        let frames = vec![make_frame(120, 60, 0); 3];
        let movement = est.estimate(&frames);
        assert_eq!(movement.len(), 3);
        assert_eq!(movement[0], Point::new(0.0, 0.0));
    }

    #[test]
    fn stationary_sequence_accumulates_nothing() {
        let est = CameraMotionEstimator::new(test_config());
        let frames = vec![make_frame(120, 60, 0); 5];
        let movement = est.estimate(&frames);
        for cumulative in &movement {
            assert_eq!(*cumulative, Point::new(0.0, 0.0));
        }
    }

    #[test]
    fn pan_is_detected_and_accumulated() {
        let est = CameraMotionEstimator::new(test_config());
        let frames = vec![
            make_frame(120, 60, 0),
            make_frame(120, 60, 8),
            make_frame(120, 60, 16),
        ];
        let movement = est.estimate(&frames);
        // Scene texture moves +8 px per pair; cumulative displacement follows.
        assert!((movement[1].x - 8.0).abs() < 1.5, "got {:?}", movement[1]);
        assert!((movement[2].x - 16.0).abs() < 3.0, "got {:?}", movement[2]);
        assert!(movement[1].y.abs() < 1.5);
    }

    #[test]
    fn sub_threshold_flow_adds_no_drift() {
        let est = CameraMotionEstimator::new(test_config());
        // 2 px shifts stay below the 5 px noise threshold.
        let frames = vec![
            make_frame(120, 60, 0),
            make_frame(120, 60, 2),
            make_frame(120, 60, 4),
        ];
        let movement = est.estimate(&frames);
        assert_eq!(movement[1], movement[0]);
        assert_eq!(movement[2], movement[1]);
    }

    #[test]
    fn adjustment_subtracts_cumulative_displacement() {
        use crate::types::{BBox, Detection, DetectionClass};

        let frames = vec![
            vec![Detection {
                class: DetectionClass::Player,
                id: 4,
                bbox: BBox::new(100.0, 100.0, 120.0, 140.0),
                confidence: 0.9,
            }],
            vec![Detection {
                class: DetectionClass::Player,
                id: 4,
                bbox: BBox::new(100.0, 100.0, 120.0, 140.0),
                confidence: 0.9,
            }],
        ];
        let mut store = TrackStore::from_detections(&frames).unwrap();
        let movement = vec![Point::new(0.0, 0.0), Point::new(10.0, -4.0)];
        adjust_track_positions(&mut store, &movement);

        let p0 = &store.players[0][&4];
        let p1 = &store.players[1][&4];
        assert_eq!(p0.adjusted_anchor, Some(Point::new(110.0, 140.0)));
        assert_eq!(p1.adjusted_anchor, Some(Point::new(100.0, 144.0)));
    }
}
