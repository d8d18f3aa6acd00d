//! Frame-sequential analytics pipeline for annotated sports broadcasts.
//!
//! Turns raw per-frame bounding boxes (from an external detector+associator)
//! into enriched per-track records: stable identity, pitch position in
//! meters, speed and cumulative distance, team label, and ball-possession
//! flag. Video decode/encode, the detection model, and the web/job layer are
//! external collaborators; see the [`capabilities`] traits.

pub mod camera_motion;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod possession;
pub mod speed_distance;
pub mod stub_cache;
pub mod team_classifier;
pub mod track_store;
pub mod types;
pub mod view_transform;

pub use capabilities::{DetectAndTrack, NoProgress, ProgressSink};
pub use error::{PipelineError, Result};
pub use pipeline::{analyze, analyze_with_cache, Analysis};
pub use possession::PossessionSummary;
pub use stub_cache::{CacheKey, StubCache};
pub use track_store::{BallTrack, PersonTrack, TrackStore, BALL_ID};
pub use types::{BBox, Config, Detection, DetectionClass, Frame, Point, Team};
