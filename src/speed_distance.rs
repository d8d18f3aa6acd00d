// src/speed_distance.rs
//
// Windowed differencing of world positions into per-player speed and
// cumulative distance.
//
// Speed is a step function: one value per window, assigned to every frame
// in the window. A window with an undefined endpoint (player absent or
// anchor outside the calibration region) gets no speed and contributes no
// distance; gaps are never assumed to be zero motion. Speed and distance
// are player statistics; referees and the ball are not aggregated.

use crate::track_store::TrackStore;
use crate::types::{SpeedConfig, VideoConfig};
use std::collections::BTreeSet;
use tracing::debug;

const MPS_TO_KMH: f32 = 3.6;

pub struct SpeedDistanceAggregator {
    fps: f32,
    window: usize,
}

impl SpeedDistanceAggregator {
    pub fn new(video: &VideoConfig, speed: &SpeedConfig) -> Self {
        let window = ((video.fps * speed.window_seconds).round() as usize).max(1);
        Self {
            fps: video.fps,
            window,
        }
    }

    /// Window length in frames.
    pub fn window(&self) -> usize {
        self.window
    }

    pub fn apply(&self, store: &mut TrackStore) {
        let n = store.num_frames();

        let ids: BTreeSet<u32> = store
            .players
            .iter()
            .flat_map(|frame| frame.keys().copied())
            .collect();

        for id in ids {
            let mut total_distance = 0.0f32;

            let mut start = 0;
            while start < n.saturating_sub(1) {
                // Trailing partial window uses the actual available span.
                let end = (start + self.window).min(n - 1);

                let start_pos = store.players[start]
                    .get(&id)
                    .and_then(|p| p.world_position);
                let end_pos = store.players[end].get(&id).and_then(|p| p.world_position);

                let measured = match (start_pos, end_pos) {
                    (Some(a), Some(b)) => {
                        let distance = a.distance(&b);
                        let elapsed = (end - start) as f32 / self.fps;
                        total_distance += distance;
                        Some(distance / elapsed * MPS_TO_KMH)
                    }
                    _ => None,
                };

                if let Some(speed_kmh) = measured {
                    for frame_idx in start..end {
                        if let Some(person) = store.players[frame_idx].get_mut(&id) {
                            person.speed_kmh = Some(speed_kmh);
                            person.distance_m = Some(total_distance);
                        }
                    }
                }

                start = end;
            }
        }

        debug!(window = self.window, "speed and distance aggregated");
    }
}
