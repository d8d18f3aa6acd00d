// src/possession.rs
//
// Per-frame ball-possession resolution with last-known-team fallback.
//
// Distance is measured from the ball anchor to each player's nearest
// bottom box corner (feet). The resolver carries the previous controlling
// team across frames, so the possession sequence has no gaps; before any
// qualifying frame the fixed default is the home team.

use crate::track_store::TrackStore;
use crate::types::{PossessionConfig, Team};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Controlling team before any player has qualified for possession.
/// Arbitrary but deterministic.
pub const DEFAULT_TEAM: Team = Team::Home;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PossessionSummary {
    pub frames: usize,
    pub home_frames: usize,
    pub away_frames: usize,
}

impl PossessionSummary {
    pub fn from_sequence(possession: &[Team]) -> Self {
        let home_frames = possession.iter().filter(|&&t| t == Team::Home).count();
        Self {
            frames: possession.len(),
            home_frames,
            away_frames: possession.len() - home_frames,
        }
    }

    pub fn home_pct(&self) -> f32 {
        if self.frames == 0 {
            return 0.0;
        }
        100.0 * self.home_frames as f32 / self.frames as f32
    }

    pub fn away_pct(&self) -> f32 {
        if self.frames == 0 {
            return 0.0;
        }
        100.0 * self.away_frames as f32 / self.frames as f32
    }
}

pub struct PossessionResolver {
    config: PossessionConfig,
}

impl PossessionResolver {
    pub fn new(config: PossessionConfig) -> Self {
        Self { config }
    }

    /// Build the full-length possession sequence, marking `has_ball` on the
    /// possessing player's record. Append-only in frame order: one label per
    /// frame, never revisited.
    pub fn resolve(&self, store: &mut TrackStore) -> Vec<Team> {
        let n = store.num_frames();
        let mut possession: Vec<Team> = Vec::with_capacity(n);
        let mut last_team: Option<Team> = None;

        for frame_idx in 0..n {
            let ball_anchor = store.ball[frame_idx].as_ref().map(|b| b.anchor);

            let assigned = ball_anchor.and_then(|ball| {
                let mut best: Option<(u32, f32)> = None;
                for person in store.players[frame_idx].values() {
                    let (left, right) = person.bbox.foot_corners();
                    let d = ball.distance(&left).min(ball.distance(&right));
                    if d <= self.config.max_player_ball_distance
                        && best.map_or(true, |(_, bd)| d < bd)
                    {
                        best = Some((person.id, d));
                    }
                }
                best.map(|(id, _)| id)
            });

            let team = match assigned {
                Some(player_id) => {
                    let person = store.players[frame_idx]
                        .get_mut(&player_id)
                        .expect("assigned player exists in frame");
                    person.has_ball = true;
                    let team = person.team.unwrap_or(DEFAULT_TEAM);
                    last_team = Some(team);
                    team
                }
                // No player close enough, or ball unavailable: propagate.
                None => last_team.unwrap_or(DEFAULT_TEAM),
            };
            possession.push(team);
        }

        debug!(
            frames = possession.len(),
            "possession sequence resolved"
        );
        possession
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BBox, Detection, DetectionClass, PossessionConfig};

    fn player(id: u32, x: f32, team: Team) -> (Detection, Team) {
        (
            Detection {
                class: DetectionClass::Player,
                id,
                bbox: BBox::new(x, 0.0, x + 10.0, 30.0),
                confidence: 0.9,
            },
            team,
        )
    }

    fn ball_at(x: f32, y: f32) -> Detection {
        Detection {
            class: DetectionClass::Ball,
            id: 1,
            bbox: BBox::new(x - 2.0, y - 2.0, x + 2.0, y + 2.0),
            confidence: 0.9,
        }
    }

    fn build_store(frames: Vec<(Vec<(Detection, Team)>, Option<Detection>)>) -> TrackStore {
        let raw: Vec<Vec<Detection>> = frames
            .iter()
            .map(|(players, ball)| {
                let mut dets: Vec<Detection> = players.iter().map(|(d, _)| *d).collect();
                if let Some(b) = ball {
                    dets.push(*b);
                }
                dets
            })
            .collect();
        let mut store = TrackStore::from_detections(&raw).unwrap();
        for (frame_idx, (players, _)) in frames.iter().enumerate() {
            for (det, team) in players {
                store.players[frame_idx].get_mut(&det.id).unwrap().team = Some(*team);
            }
        }
        store
    }

    fn resolver() -> PossessionResolver {
        PossessionResolver::new(PossessionConfig {
            max_player_ball_distance: 70.0,
        })
    }

    #[test]
    fn nearest_player_within_threshold_gets_the_ball() {
        let mut store = build_store(vec![(
            vec![player(1, 0.0, Team::Home), player(2, 40.0, Team::Away)],
            // Ball sits on player 2's feet.
            Some(ball_at(45.0, 30.0)),
        )]);

        let possession = resolver().resolve(&mut store);
        assert_eq!(possession, vec![Team::Away]);
        assert!(!store.players[0][&1].has_ball);
        assert!(store.players[0][&2].has_ball);
    }

    #[test]
    fn far_ball_propagates_previous_team() {
        let mut store = build_store(vec![
            (
                vec![player(1, 0.0, Team::Away)],
                Some(ball_at(5.0, 30.0)), // close: Away takes control
            ),
            (
                vec![player(1, 0.0, Team::Away)],
                Some(ball_at(500.0, 30.0)), // far: carry Away forward
            ),
        ]);

        let possession = resolver().resolve(&mut store);
        assert_eq!(possession, vec![Team::Away, Team::Away]);
        assert!(!store.players[1][&1].has_ball);
    }

    #[test]
    fn default_team_before_first_assignment() {
        let mut store = build_store(vec![
            (vec![player(1, 0.0, Team::Away)], Some(ball_at(500.0, 30.0))),
            (vec![player(1, 0.0, Team::Away)], None),
        ]);

        let possession = resolver().resolve(&mut store);
        assert_eq!(possession, vec![DEFAULT_TEAM, DEFAULT_TEAM]);
    }

    #[test]
    fn sequence_covers_every_frame() {
        let frames = vec![
            (vec![player(1, 0.0, Team::Home)], Some(ball_at(5.0, 30.0))),
            (vec![player(1, 0.0, Team::Home)], None),
            (vec![], None),
            (vec![player(1, 0.0, Team::Home)], Some(ball_at(5.0, 30.0))),
        ];
        let mut store = build_store(frames);
        let possession = resolver().resolve(&mut store);
        assert_eq!(possession.len(), 4);
    }

    #[test]
    fn summary_percentages() {
        let possession = vec![Team::Home, Team::Home, Team::Home, Team::Away];
        let summary = PossessionSummary::from_sequence(&possession);
        assert_eq!(summary.frames, 4);
        assert!((summary.home_pct() - 75.0).abs() < 1e-4);
        assert!((summary.away_pct() - 25.0).abs() < 1e-4);
    }
}
