// src/track_store.rs
//
// Shared per-video data structure mutated in place by every pipeline stage.
//
// Person tracks (players, referees) and the ball are kept as separate
// variants rather than one generic container: persons carry many stable IDs
// per frame, the ball has exactly one logical ID for the whole video and its
// gaps are filled by interpolation.

use crate::error::{PipelineError, Result};
use crate::types::{BBox, Detection, DetectionClass, Point, Team};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The single logical ball identity across the whole video.
pub const BALL_ID: u32 = 1;

/// One player or referee record for one frame. Enrichment fields start as
/// `None` and are filled in by the stage that owns them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonTrack {
    pub id: u32,
    pub bbox: BBox,
    pub confidence: f32,
    /// Bottom-center of the box, the assumed foot position.
    pub anchor: Point,
    /// Anchor minus cumulative camera displacement.
    pub adjusted_anchor: Option<Point>,
    /// Pitch position in meters; `None` outside the calibration region.
    pub world_position: Option<Point>,
    pub speed_kmh: Option<f32>,
    /// Running total distance covered up to and including this frame.
    pub distance_m: Option<f32>,
    pub team: Option<Team>,
    pub team_color: Option<[u8; 3]>,
    pub has_ball: bool,
}

impl PersonTrack {
    fn from_detection(det: &Detection) -> Self {
        Self {
            id: det.id,
            bbox: det.bbox,
            confidence: det.confidence,
            anchor: anchor_point(det.class, &det.bbox),
            adjusted_anchor: None,
            world_position: None,
            speed_kmh: None,
            distance_m: None,
            team: None,
            team_color: None,
            has_ball: false,
        }
    }
}

/// Ball record for one frame. Boxes synthesized by gap interpolation carry
/// `interpolated = true` and no confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallTrack {
    pub bbox: BBox,
    pub confidence: Option<f32>,
    pub interpolated: bool,
    /// Box center; the ball has no foot position.
    pub anchor: Point,
    pub adjusted_anchor: Option<Point>,
    pub world_position: Option<Point>,
}

impl BallTrack {
    fn from_detection(det: &Detection) -> Self {
        Self {
            bbox: det.bbox,
            confidence: Some(det.confidence),
            interpolated: false,
            anchor: anchor_point(DetectionClass::Ball, &det.bbox),
            adjusted_anchor: None,
            world_position: None,
        }
    }

    fn synthetic(bbox: BBox) -> Self {
        Self {
            bbox,
            confidence: None,
            interpolated: true,
            anchor: bbox.center(),
            adjusted_anchor: None,
            world_position: None,
        }
    }
}

/// The pixel used to represent an object's ground position: bottom-center
/// of the box for persons, box center for the ball.
pub fn anchor_point(class: DetectionClass, bbox: &BBox) -> Point {
    match class {
        DetectionClass::Player | DetectionClass::Referee => bbox.bottom_center(),
        DetectionClass::Ball => bbox.center(),
    }
}

/// Per-class, ordered-by-frame track records for one video run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackStore {
    pub players: Vec<BTreeMap<u32, PersonTrack>>,
    pub referees: Vec<BTreeMap<u32, PersonTrack>>,
    pub ball: Vec<Option<BallTrack>>,
}

impl TrackStore {
    /// Build the store from per-frame detector output. Applies the
    /// single-ball rule: only the highest-confidence ball detection in a
    /// frame survives, under the fixed [`BALL_ID`].
    pub fn from_detections(per_frame: &[Vec<Detection>]) -> Result<Self> {
        if per_frame.is_empty() {
            return Err(PipelineError::NoFrames);
        }

        let n = per_frame.len();
        let mut players: Vec<BTreeMap<u32, PersonTrack>> = vec![BTreeMap::new(); n];
        let mut referees: Vec<BTreeMap<u32, PersonTrack>> = vec![BTreeMap::new(); n];
        let mut ball: Vec<Option<BallTrack>> = vec![None; n];

        for (frame_idx, detections) in per_frame.iter().enumerate() {
            let mut best_ball: Option<&Detection> = None;
            for det in detections {
                match det.class {
                    DetectionClass::Player => {
                        players[frame_idx].insert(det.id, PersonTrack::from_detection(det));
                    }
                    DetectionClass::Referee => {
                        referees[frame_idx].insert(det.id, PersonTrack::from_detection(det));
                    }
                    DetectionClass::Ball => {
                        if best_ball.map_or(true, |b| det.confidence > b.confidence) {
                            best_ball = Some(det);
                        }
                    }
                }
            }
            ball[frame_idx] = best_ball.map(BallTrack::from_detection);
        }

        Ok(Self {
            players,
            referees,
            ball,
        })
    }

    pub fn num_frames(&self) -> usize {
        self.players.len()
    }

    /// Fill every frame in [0, N) with a ball box.
    ///
    /// Interior gaps: each box coordinate interpolated linearly by frame
    /// position within the gap. Leading/trailing gaps: the nearest known box
    /// held constant. A video with no ball detections at all stays empty
    /// (degraded, continue).
    pub fn interpolate_ball_gaps(&mut self) {
        let known: Vec<usize> = self
            .ball
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|_| i))
            .collect();

        if known.is_empty() {
            warn!("ball never detected in any frame, skipping interpolation");
            return;
        }

        let n = self.ball.len();
        let first = known[0];
        let last = *known.last().unwrap();

        // Leading gap: back-fill from the first known box.
        let first_box = self.ball[first].as_ref().unwrap().bbox;
        for i in 0..first {
            self.ball[i] = Some(BallTrack::synthetic(first_box));
        }

        // Interior gaps: linear interpolation between surrounding known boxes.
        for pair in known.windows(2) {
            let (i0, i1) = (pair[0], pair[1]);
            if i1 - i0 < 2 {
                continue;
            }
            let b0 = self.ball[i0].as_ref().unwrap().bbox;
            let b1 = self.ball[i1].as_ref().unwrap().bbox;
            for i in (i0 + 1)..i1 {
                let t = (i - i0) as f32 / (i1 - i0) as f32;
                let bbox = BBox::new(
                    b0.x1 + (b1.x1 - b0.x1) * t,
                    b0.y1 + (b1.y1 - b0.y1) * t,
                    b0.x2 + (b1.x2 - b0.x2) * t,
                    b0.y2 + (b1.y2 - b0.y2) * t,
                );
                self.ball[i] = Some(BallTrack::synthetic(bbox));
            }
        }

        // Trailing gap: forward-fill from the last known box.
        let last_box = self.ball[last].as_ref().unwrap().bbox;
        for i in (last + 1)..n {
            self.ball[i] = Some(BallTrack::synthetic(last_box));
        }

        debug!(
            known = known.len(),
            synthesized = n - known.len(),
            "ball gaps interpolated"
        );
    }
}
