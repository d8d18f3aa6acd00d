// src/team_classifier.rs
//
// One-shot team color model: fit from frame 0, frozen, then per-player
// nearest-centroid classification.
//
// Jersey extraction per player: crop the upper half of the box (torso,
// avoiding legs and grass), 2-means over the crop's RGB pixels, discard the
// cluster that owns the crop corners (background-dominant), keep the other
// as the jersey color. The team model is a second 2-means over the
// per-player jersey colors of frame 0.
//
// The 2-means initialization is deterministic (extreme-luma points), so a
// given video always yields the same model, with no RNG involved.
//
// Classification policy: a player's team is invariant, so each player ID is
// classified once (first frame it appears) and cached. Re-running the crop
// clustering every frame could flip a player's team when lighting changes
// mid-video.

use crate::track_store::TrackStore;
use crate::types::{BBox, Frame, Team, TeamConfig};
use std::collections::HashMap;
use tracing::{debug, warn};

type Color = [f32; 3];

#[inline]
fn luma(c: &Color) -> f32 {
    0.299 * c[0] + 0.587 * c[1] + 0.114 * c[2]
}

#[inline]
fn dist_sq(a: &Color, b: &Color) -> f32 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

// ============================================================================
// 2-MEANS
// ============================================================================

/// Lloyd's algorithm with k = 2 and extreme-luma initialization.
/// Returns (centroids, per-point labels).
fn kmeans2(points: &[Color], max_iters: usize) -> ([Color; 2], Vec<usize>) {
    debug_assert!(!points.is_empty());

    let darkest = points
        .iter()
        .min_by(|a, b| luma(a).total_cmp(&luma(b)))
        .unwrap();
    let brightest = points
        .iter()
        .max_by(|a, b| luma(a).total_cmp(&luma(b)))
        .unwrap();
    let mut centroids = [*darkest, *brightest];
    let mut labels = vec![0usize; points.len()];

    for _ in 0..max_iters {
        let mut changed = false;
        for (p, label) in points.iter().zip(labels.iter_mut()) {
            let next = if dist_sq(p, &centroids[0]) <= dist_sq(p, &centroids[1]) {
                0
            } else {
                1
            };
            if next != *label {
                *label = next;
                changed = true;
            }
        }

        let mut sums = [[0.0f32; 3]; 2];
        let mut counts = [0usize; 2];
        for (p, &label) in points.iter().zip(labels.iter()) {
            for c in 0..3 {
                sums[label][c] += p[c];
            }
            counts[label] += 1;
        }
        for k in 0..2 {
            if counts[k] > 0 {
                for c in 0..3 {
                    centroids[k][c] = sums[k][c] / counts[k] as f32;
                }
            }
        }

        if !changed {
            break;
        }
    }

    (centroids, labels)
}

// ============================================================================
// MODEL
// ============================================================================

/// Two RGB team centroids, fit once and immutable afterward.
#[derive(Debug, Clone)]
pub struct TeamColorModel {
    centroids: [Color; 2],
}

impl TeamColorModel {
    pub fn classify(&self, jersey: Color) -> Team {
        if dist_sq(&jersey, &self.centroids[0]) <= dist_sq(&jersey, &self.centroids[1]) {
            Team::Home
        } else {
            Team::Away
        }
    }

    /// Representative RGB for a team, for downstream overlay rendering.
    pub fn team_color(&self, team: Team) -> [u8; 3] {
        let c = match team {
            Team::Home => self.centroids[0],
            Team::Away => self.centroids[1],
        };
        [c[0] as u8, c[1] as u8, c[2] as u8]
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct TeamClassifier {
    config: TeamConfig,
}

impl TeamClassifier {
    pub fn new(config: TeamConfig) -> Self {
        Self { config }
    }

    /// Extract one jersey color from the upper half of a player's box.
    /// Returns None when the crop is empty (box outside the frame).
    pub fn jersey_color(&self, frame: &Frame, bbox: &BBox) -> Option<Color> {
        let x_lo = (bbox.x1.max(0.0) as usize).min(frame.width);
        let x_hi = (bbox.x2.max(0.0) as usize).min(frame.width);
        let y_lo = (bbox.y1.max(0.0) as usize).min(frame.height);
        let y_full = (bbox.y2.max(0.0) as usize).min(frame.height);
        // Torso region only.
        let y_hi = y_lo + (y_full.saturating_sub(y_lo)) / 2;

        if x_hi <= x_lo || y_hi <= y_lo {
            return None;
        }

        let crop_w = x_hi - x_lo;
        let crop_h = y_hi - y_lo;
        let mut pixels: Vec<Color> = Vec::with_capacity(crop_w * crop_h);
        for y in y_lo..y_hi {
            for x in x_lo..x_hi {
                let [r, g, b] = frame.pixel(x, y);
                pixels.push([r as f32, g as f32, b as f32]);
            }
        }

        let (centroids, labels) = kmeans2(&pixels, self.config.kmeans_max_iters);

        // The crop corners are assumed background-dominant; the cluster that
        // owns most of them is discarded.
        let corner_idx = [
            0,
            crop_w - 1,
            (crop_h - 1) * crop_w,
            crop_h * crop_w - 1,
        ];
        let corner_votes: usize = corner_idx.iter().map(|&i| labels[i]).sum();
        let background = if corner_votes * 2 >= corner_idx.len() {
            1
        } else {
            0
        };
        let jersey = 1 - background;

        // Degenerate crop (single color): fall back to the overall mean.
        if !labels.iter().any(|&l| l == jersey) {
            let mut mean = [0.0f32; 3];
            for p in &pixels {
                for c in 0..3 {
                    mean[c] += p[c];
                }
            }
            for c in mean.iter_mut() {
                *c /= pixels.len() as f32;
            }
            return Some(mean);
        }

        Some(centroids[jersey])
    }

    /// Fit the two team centroids from the players of frame 0. With fewer
    /// than two usable jersey colors the model degenerates to a single
    /// centroid and every player classifies as the default team (degraded,
    /// continue).
    pub fn fit(&self, frame: &Frame, store: &TrackStore) -> TeamColorModel {
        let mut colors: Vec<Color> = Vec::new();
        for person in store.players[0].values() {
            if let Some(color) = self.jersey_color(frame, &person.bbox) {
                colors.push(color);
            }
        }

        if colors.len() < 2 {
            warn!(
                players = colors.len(),
                "not enough players in frame 0 to separate teams"
            );
            let c = colors.first().copied().unwrap_or([128.0, 128.0, 128.0]);
            return TeamColorModel { centroids: [c, c] };
        }

        let (centroids, _) = kmeans2(&colors, self.config.kmeans_max_iters);
        debug!(
            home = ?centroids[0],
            away = ?centroids[1],
            players = colors.len(),
            "team color model fitted"
        );
        TeamColorModel { centroids }
    }
}

/// Applies the frozen model to every player record, classifying each player
/// ID once and caching the result.
pub struct TeamAssigner {
    classifier: TeamClassifier,
    model: TeamColorModel,
    cache: HashMap<u32, Team>,
}

impl TeamAssigner {
    pub fn new(classifier: TeamClassifier, model: TeamColorModel) -> Self {
        Self {
            classifier,
            model,
            cache: HashMap::new(),
        }
    }

    pub fn model(&self) -> &TeamColorModel {
        &self.model
    }

    /// Fill `team` and `team_color` for every player record. Unclassifiable
    /// players (empty crop on first appearance) default to Home.
    pub fn assign_teams(&mut self, frames: &[Frame], store: &mut TrackStore) {
        for (frame_idx, frame) in frames.iter().enumerate() {
            for person in store.players[frame_idx].values_mut() {
                let team = if let Some(&t) = self.cache.get(&person.id) {
                    t
                } else {
                    let t = self
                        .classifier
                        .jersey_color(frame, &person.bbox)
                        .map(|c| self.model.classify(c))
                        .unwrap_or(Team::Home);
                    self.cache.insert(person.id, t);
                    t
                };
                person.team = Some(team);
                person.team_color = Some(self.model.team_color(team));
            }
        }
    }
}
