// src/view_transform.rs
//
// Fixed-homography mapping from camera-stabilized pixel anchors to pitch
// coordinates in meters.
//
// The homography is fit once from the 4 calibration corner correspondences
// and reused for the whole video. Anchors outside the calibration
// quadrilateral get no world position at all: the mapping is undefined
// there and extrapolated values would poison speed and distance downstream.

use crate::error::{PipelineError, Result};
use crate::track_store::TrackStore;
use crate::types::{CalibrationConfig, Point};
use nalgebra::{Matrix3, SMatrix, SVector};
use tracing::debug;

pub struct ViewTransformer {
    homography: Matrix3<f64>,
    quad: [Point; 4],
}

impl ViewTransformer {
    /// Fit the pixel-to-world homography from the calibration constants.
    /// Corner order: bottom-left, top-left, top-right, bottom-right, mapped
    /// to (0, W), (0, 0), (L, 0), (L, W) in meters.
    pub fn new(calibration: &CalibrationConfig) -> Result<Self> {
        let length = calibration.pitch_length_m as f64;
        let width = calibration.pitch_width_m as f64;
        if length <= 0.0 || width <= 0.0 {
            return Err(PipelineError::InvalidCalibration(format!(
                "pitch dimensions must be positive, got {}x{} m",
                length, width
            )));
        }

        let world = [
            (0.0, width),
            (0.0, 0.0),
            (length, 0.0),
            (length, width),
        ];

        let homography = fit_homography(&calibration.corners, &world)?;
        debug!(corners = ?calibration.corners, length, width, "homography fitted");

        Ok(Self {
            homography,
            quad: calibration.corners,
        })
    }

    /// Map a stabilized pixel anchor to pitch meters. Returns None outside
    /// the calibration quadrilateral (boundary counts as inside).
    pub fn transform_point(&self, p: Point) -> Option<Point> {
        if !point_in_quad(p, &self.quad) {
            return None;
        }
        let v = self.homography * nalgebra::Vector3::new(p.x as f64, p.y as f64, 1.0);
        if v.z.abs() < 1e-12 {
            return None;
        }
        Some(Point::new((v.x / v.z) as f32, (v.y / v.z) as f32))
    }

    /// Fill `world_position` for every record from its stabilized anchor
    /// (raw anchor when stabilization has not run).
    pub fn apply_to_tracks(&self, store: &mut TrackStore) {
        for frame_idx in 0..store.num_frames() {
            for person in store.players[frame_idx].values_mut() {
                let anchor = person.adjusted_anchor.unwrap_or(person.anchor);
                person.world_position = self.transform_point(anchor);
            }
            for person in store.referees[frame_idx].values_mut() {
                let anchor = person.adjusted_anchor.unwrap_or(person.anchor);
                person.world_position = self.transform_point(anchor);
            }
            if let Some(ball) = store.ball[frame_idx].as_mut() {
                let anchor = ball.adjusted_anchor.unwrap_or(ball.anchor);
                ball.world_position = self.transform_point(anchor);
            }
        }
    }
}

/// Solve the 8-unknown planar homography from 4 point correspondences.
fn fit_homography(pixel: &[Point; 4], world: &[(f64, f64); 4]) -> Result<Matrix3<f64>> {
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for (i, (src, &(u, v))) in pixel.iter().zip(world.iter()).enumerate() {
        let (x, y) = (src.x as f64, src.y as f64);
        let r = i * 2;
        a[(r, 0)] = x;
        a[(r, 1)] = y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -u * x;
        a[(r, 7)] = -u * y;
        b[r] = u;

        a[(r + 1, 3)] = x;
        a[(r + 1, 4)] = y;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -v * x;
        a[(r + 1, 7)] = -v * y;
        b[r + 1] = v;
    }

    let h = a.lu().solve(&b).ok_or_else(|| {
        PipelineError::InvalidCalibration(
            "degenerate corner configuration, homography is singular".to_string(),
        )
    })?;

    let homography = Matrix3::new(
        h[0], h[1], h[2], //
        h[3], h[4], h[5], //
        h[6], h[7], 1.0,
    );

    // A near-singular system can still "solve" in floating point; reject
    // any fit that does not reproduce the correspondences.
    for (src, &(u, v)) in pixel.iter().zip(world.iter()) {
        let m = homography * nalgebra::Vector3::new(src.x as f64, src.y as f64, 1.0);
        if m.z.abs() < 1e-9 || (m.x / m.z - u).abs() > 1e-6 || (m.y / m.z - v).abs() > 1e-6 {
            return Err(PipelineError::InvalidCalibration(
                "degenerate corner configuration, homography is singular".to_string(),
            ));
        }
    }

    Ok(homography)
}

/// Ray-casting point-in-polygon test for the calibration quadrilateral.
/// Points exactly on an edge are treated as inside.
fn point_in_quad(p: Point, quad: &[Point; 4]) -> bool {
    for i in 0..4 {
        if on_segment(p, quad[i], quad[(i + 1) % 4]) {
            return true;
        }
    }

    let mut inside = false;
    let mut j = 3;
    for i in 0..4 {
        let (pi, pj) = (quad[i], quad[j]);
        if (pi.y > p.y) != (pj.y > p.y) {
            let x_cross = (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn on_segment(p: Point, a: Point, b: Point) -> bool {
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    if cross.abs() > 1e-3 {
        return false;
    }
    p.x >= a.x.min(b.x) - 1e-6
        && p.x <= a.x.max(b.x) + 1e-6
        && p.y >= a.y.min(b.y) - 1e-6
        && p.y <= a.y.max(b.y) + 1e-6
}
