// src/pipeline.rs
//
// The single ordered pass over one video: detections → track store → ball
// interpolation → camera motion → stabilization → perspective transform →
// speed/distance → team assignment → possession.
//
// One synchronous call per video run; no state survives between runs. The
// surrounding job layer owns cancellation and may only touch the store
// between calls, never concurrently with a run in progress.

use crate::camera_motion::{adjust_track_positions, CameraMotionEstimator};
use crate::capabilities::{DetectAndTrack, ProgressSink};
use crate::error::{PipelineError, Result};
use crate::possession::{PossessionResolver, PossessionSummary};
use crate::speed_distance::SpeedDistanceAggregator;
use crate::stub_cache::{CacheKey, StubCache};
use crate::team_classifier::{TeamAssigner, TeamClassifier};
use crate::track_store::TrackStore;
use crate::types::{Config, Frame, Point, Team};
use crate::view_transform::ViewTransformer;
use tracing::{info, warn};

/// Everything downstream renderers and statistics aggregators need for one
/// video run.
#[derive(Debug)]
pub struct Analysis {
    pub tracks: TrackStore,
    pub camera_movement: Vec<Point>,
    pub possession: Vec<Team>,
    pub summary: PossessionSummary,
}

pub fn analyze(
    config: &Config,
    frames: &[Frame],
    detector: &mut dyn DetectAndTrack,
    sink: &dyn ProgressSink,
) -> Result<Analysis> {
    analyze_with_cache(config, frames, detector, sink, None)
}

/// Run the full pipeline. With `cache` set, a valid stub artifact for the
/// same input skips the detection and camera-estimation stages.
pub fn analyze_with_cache(
    config: &Config,
    frames: &[Frame],
    detector: &mut dyn DetectAndTrack,
    sink: &dyn ProgressSink,
    cache: Option<(&StubCache, &str)>,
) -> Result<Analysis> {
    config.validate()?;
    if frames.is_empty() {
        return Err(PipelineError::NoFrames);
    }

    // Fail fast on a bad calibration before any heavy work.
    let transformer = ViewTransformer::new(&config.calibration)?;

    info!(frames = frames.len(), "pipeline run starting");

    let cached = cache.and_then(|(cache, source_id)| {
        let key = CacheKey::for_input(source_id, frames);
        cache.load(&key)
    });

    let (mut store, camera_movement) = match cached {
        Some((store, movement)) => {
            info!("using cached tracks and camera movement");
            sink.report(40, "loading cached tracks");
            (store, movement)
        }
        None => {
            sink.report(20, "collecting detections");
            let mut per_frame = Vec::with_capacity(frames.len());
            for (frame_idx, frame) in frames.iter().enumerate() {
                let detections = detector
                    .detect_and_track(frame, frame_idx)
                    .map_err(|source| PipelineError::Detector {
                        frame: frame_idx,
                        source,
                    })?;
                per_frame.push(detections);
            }
            let store = TrackStore::from_detections(&per_frame)?;

            sink.report(30, "estimating camera movement");
            let estimator = CameraMotionEstimator::new(config.camera.clone());
            let movement = estimator.estimate(frames);

            if let Some((cache, source_id)) = cache {
                let key = CacheKey::for_input(source_id, frames);
                if let Err(e) = cache.store(&key, &store, &movement) {
                    // Cache is a side-channel; never fail the run for it.
                    warn!(error = %e, "failed to write stub artifact");
                }
            }
            (store, movement)
        }
    };

    sink.report(45, "interpolating ball positions");
    store.interpolate_ball_gaps();

    adjust_track_positions(&mut store, &camera_movement);

    sink.report(50, "transforming view");
    transformer.apply_to_tracks(&mut store);

    sink.report(60, "estimating speed and distance");
    let aggregator = SpeedDistanceAggregator::new(&config.video, &config.speed);
    aggregator.apply(&mut store);

    sink.report(70, "assigning teams");
    let classifier = TeamClassifier::new(config.team.clone());
    let model = classifier.fit(&frames[0], &store);
    let mut assigner = TeamAssigner::new(classifier, model);
    assigner.assign_teams(frames, &mut store);

    sink.report(85, "assigning ball possession");
    let resolver = PossessionResolver::new(config.possession.clone());
    let possession = resolver.resolve(&mut store);
    let summary = PossessionSummary::from_sequence(&possession);

    sink.report(100, "completed");
    info!(
        frames = frames.len(),
        home_pct = summary.home_pct(),
        away_pct = summary.away_pct(),
        "pipeline run complete"
    );

    Ok(Analysis {
        tracks: store,
        camera_movement,
        possession,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::NoProgress;
    use crate::types::{
        BBox, CalibrationConfig, ColumnSpan, Detection, DetectionClass,
    };

    const GRASS: [u8; 3] = [40, 140, 60];
    const RED: [u8; 3] = [200, 30, 30];
    const BLUE: [u8; 3] = [30, 40, 190];

    const PLAYER_A: BBox = BBox {
        x1: 5.0,
        y1: 5.0,
        x2: 25.0,
        y2: 45.0,
    };
    const PLAYER_B: BBox = BBox {
        x1: 40.0,
        y1: 5.0,
        x2: 60.0,
        y2: 45.0,
    };

    /// 200x120 grass frame with the two jersey patches, identical for every
    /// frame index (stationary camera, stationary players).
    fn make_frame() -> Frame {
        let (width, height) = (200usize, 120usize);
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&GRASS);
        }
        let mut frame = Frame::new(data, width, height);
        for (bbox, color) in [(PLAYER_A, RED), (PLAYER_B, BLUE)] {
            for y in (bbox.y1 as usize + 2)..(bbox.y2 as usize - 2) {
                for x in (bbox.x1 as usize + 2)..(bbox.x2 as usize - 2) {
                    let idx = (y * width + x) * 3;
                    frame.data[idx..idx + 3].copy_from_slice(&color);
                }
            }
        }
        frame
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.video.fps = 10.0;
        config.speed.window_seconds = 0.5;
        config.camera.mask_columns = vec![
            ColumnSpan { start: 0, end: 4 },
            ColumnSpan {
                start: 190,
                end: 200,
            },
        ];
        config.camera.patch_size = 7;
        config.camera.search_range = 8;
        config.calibration = CalibrationConfig {
            corners: [
                Point::new(0.0, 120.0),
                Point::new(0.0, 0.0),
                Point::new(200.0, 0.0),
                Point::new(200.0, 120.0),
            ],
            pitch_length_m: 50.0,
            pitch_width_m: 20.0,
        };
        config
    }

    fn player_det(id: u32, bbox: BBox) -> Detection {
        Detection {
            class: DetectionClass::Player,
            id,
            bbox,
            confidence: 0.9,
        }
    }

    /// Two stationary players every frame; ball detected only at frames 0
    /// and 9, drifting right by 2 px per frame, far from both players.
    struct ScriptedDetector;

    impl DetectAndTrack for ScriptedDetector {
        fn detect_and_track(
            &mut self,
            _frame: &Frame,
            frame_index: usize,
        ) -> anyhow::Result<Vec<Detection>> {
            let mut detections = vec![player_det(1, PLAYER_A), player_det(2, PLAYER_B)];
            if frame_index == 0 || frame_index == 9 {
                let x1 = 140.0 + 2.0 * frame_index as f32;
                detections.push(Detection {
                    class: DetectionClass::Ball,
                    id: 1,
                    bbox: BBox::new(x1, 20.0, x1 + 8.0, 28.0),
                    confidence: 0.8,
                });
            }
            Ok(detections)
        }
    }

    /// Players shifted 100 px right of the scripted positions, no ball.
    struct ShiftedDetector;

    impl DetectAndTrack for ShiftedDetector {
        fn detect_and_track(
            &mut self,
            _frame: &Frame,
            _frame_index: usize,
        ) -> anyhow::Result<Vec<Detection>> {
            let shift = |b: BBox| BBox::new(b.x1 + 100.0, b.y1, b.x2 + 100.0, b.y2);
            Ok(vec![
                player_det(1, shift(PLAYER_A)),
                player_det(2, shift(PLAYER_B)),
            ])
        }
    }

    struct FailingDetector;

    impl DetectAndTrack for FailingDetector {
        fn detect_and_track(
            &mut self,
            _frame: &Frame,
            _frame_index: usize,
        ) -> anyhow::Result<Vec<Detection>> {
            anyhow::bail!("detector must not run on a cache hit")
        }
    }

    #[test]
    fn empty_input_aborts_with_no_frames() {
        let result = analyze(&test_config(), &[], &mut ScriptedDetector, &NoProgress);
        assert!(matches!(result, Err(PipelineError::NoFrames)));
    }

    #[test]
    fn end_to_end_interpolation_and_possession() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("pitch_analytics=debug")
            .with_test_writer()
            .try_init();

        let frames: Vec<Frame> = (0..10).map(|_| make_frame()).collect();
        let analysis = analyze(&test_config(), &frames, &mut ScriptedDetector, &NoProgress)
            .expect("pipeline runs");

        // Ball box exists for every frame; gaps interpolate linearly.
        for i in 0..10 {
            let ball = analysis.tracks.ball[i].as_ref().expect("ball box");
            assert!((ball.bbox.x1 - (140.0 + 2.0 * i as f32)).abs() < 1e-3);
            assert_eq!(ball.interpolated, i != 0 && i != 9);
        }

        // Ball is always farther than the threshold from both players, so
        // possession stays on the default team for the whole run.
        assert_eq!(analysis.possession.len(), 10);
        assert!(analysis
            .possession
            .iter()
            .all(|&t| t == crate::possession::DEFAULT_TEAM));
        for frame in &analysis.tracks.players {
            assert!(frame.values().all(|p| !p.has_ball));
        }

        // Opposing kits land in opposing teams, stable across frames.
        let team_a = analysis.tracks.players[0][&1].team.unwrap();
        let team_b = analysis.tracks.players[0][&2].team.unwrap();
        assert_ne!(team_a, team_b);
        for frame in &analysis.tracks.players {
            assert_eq!(frame[&1].team, Some(team_a));
            assert_eq!(frame[&2].team, Some(team_b));
        }
    }

    #[test]
    fn end_to_end_stationary_camera() {
        let frames: Vec<Frame> = (0..10).map(|_| make_frame()).collect();
        let config = test_config();
        let analysis =
            analyze(&config, &frames, &mut ScriptedDetector, &NoProgress).expect("pipeline runs");

        // Zero background flow: cumulative displacement stays (0,0).
        for cumulative in &analysis.camera_movement {
            assert_eq!(*cumulative, Point::new(0.0, 0.0));
        }

        // World positions equal the transform of the raw, unstabilized
        // anchors.
        let transformer = ViewTransformer::new(&config.calibration).unwrap();
        for frame in &analysis.tracks.players {
            for person in frame.values() {
                assert_eq!(person.adjusted_anchor, Some(person.anchor));
                let expected = transformer.transform_point(person.anchor).unwrap();
                let got = person.world_position.unwrap();
                assert!((got.x - expected.x).abs() < 1e-5);
                assert!((got.y - expected.y).abs() < 1e-5);
            }
        }

        // Stationary players cover no distance.
        let p = &analysis.tracks.players[0][&1];
        assert!((p.speed_kmh.unwrap() - 0.0).abs() < 1e-4);
        assert!((p.distance_m.unwrap() - 0.0).abs() < 1e-4);
    }

    #[test]
    fn cache_hit_skips_detection() {
        let dir = std::env::temp_dir().join("pitch-analytics-pipeline-cache");
        let _ = std::fs::remove_dir_all(&dir);
        let cache = StubCache::new(dir).unwrap();

        let frames: Vec<Frame> = (0..10).map(|_| make_frame()).collect();
        let config = test_config();

        let first = analyze_with_cache(
            &config,
            &frames,
            &mut ScriptedDetector,
            &NoProgress,
            Some((&cache, "match-01")),
        )
        .expect("first run");

        // Second run over identical input must not invoke the detector.
        let second = analyze_with_cache(
            &config,
            &frames,
            &mut FailingDetector,
            &NoProgress,
            Some((&cache, "match-01")),
        )
        .expect("cache hit");

        assert_eq!(second.possession, first.possession);
        assert_eq!(second.camera_movement, first.camera_movement);

        // A different video under the same source id and resolution must
        // recompute, never serve the previous video's tracks.
        let mut repainted: Vec<Frame> = (0..10).map(|_| make_frame()).collect();
        for frame in &mut repainted {
            frame.data[0] ^= 0xff;
        }
        let recomputed = analyze_with_cache(
            &config,
            &repainted,
            &mut ShiftedDetector,
            &NoProgress,
            Some((&cache, "match-01")),
        )
        .expect("recomputed run");
        assert_eq!(
            recomputed.tracks.players[0][&1].bbox.x1,
            PLAYER_A.x1 + 100.0
        );
        assert_eq!(first.tracks.players[0][&1].bbox.x1, PLAYER_A.x1);

        // A different source id misses and hits the failing detector.
        let result = analyze_with_cache(
            &config,
            &frames,
            &mut FailingDetector,
            &NoProgress,
            Some((&cache, "match-02")),
        );
        assert!(matches!(result, Err(PipelineError::Detector { .. })));
    }

    #[test]
    fn milestones_reach_completion() {
        use std::sync::Mutex;

        let reports: Mutex<Vec<(u8, String)>> = Mutex::new(Vec::new());
        let sink = |percent: u8, label: &str| {
            reports.lock().unwrap().push((percent, label.to_string()));
        };

        let frames: Vec<Frame> = (0..10).map(|_| make_frame()).collect();
        analyze(&test_config(), &frames, &mut ScriptedDetector, &sink).expect("pipeline runs");

        let reports = reports.into_inner().unwrap();
        assert_eq!(reports.last().map(|(p, _)| *p), Some(100));
        let percents: Vec<u8> = reports.iter().map(|(p, _)| *p).collect();
        let mut sorted = percents.clone();
        sorted.sort_unstable();
        assert_eq!(percents, sorted, "progress must be monotone");
    }
}
