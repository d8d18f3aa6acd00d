use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub video: VideoConfig,
    pub camera: CameraMotionConfig,
    pub calibration: CalibrationConfig,
    pub speed: SpeedConfig,
    pub team: TeamConfig,
    pub possession: PossessionConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            video: VideoConfig::default(),
            camera: CameraMotionConfig::default(),
            calibration: CalibrationConfig::default(),
            speed: SpeedConfig::default(),
            team: TeamConfig::default(),
            possession: PossessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Frame rate of the input video. Real time of frame i = i / fps.
    pub fps: f32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self { fps: 24.0 }
    }
}

/// Column band of the frame treated as background for camera-motion
/// feature selection (far margins where players rarely appear).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ColumnSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraMotionConfig {
    /// Background mask: features are only seeded inside these column bands.
    pub mask_columns: Vec<ColumnSpan>,
    /// Maximum number of feature points tracked per frame pair.
    pub max_features: usize,
    /// Minimum pixel spacing between selected features.
    pub min_feature_spacing: usize,
    /// Minimum gradient energy for a pixel to qualify as a feature.
    pub min_feature_quality: u32,
    /// Square patch side used for SAD matching (odd).
    pub patch_size: usize,
    /// Search window half-extent in pixels, both axes.
    pub search_range: usize,
    /// Maximum average per-pixel SAD for a match to count as valid.
    pub max_match_error: f32,
    /// Displacements below this magnitude are treated as a stationary frame.
    pub min_camera_movement: f32,
}

impl Default for CameraMotionConfig {
    fn default() -> Self {
        Self {
            mask_columns: vec![
                ColumnSpan { start: 0, end: 20 },
                ColumnSpan {
                    start: 900,
                    end: 1050,
                },
            ],
            max_features: 100,
            min_feature_spacing: 3,
            min_feature_quality: 40,
            patch_size: 11,
            search_range: 30,
            max_match_error: 30.0,
            min_camera_movement: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Pixel-space corners of the calibrated pitch region, in order:
    /// bottom-left, top-left, top-right, bottom-right.
    pub corners: [Point; 4],
    /// Real-world extent along the touchline direction, meters.
    pub pitch_length_m: f32,
    /// Real-world extent across the pitch, meters.
    pub pitch_width_m: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            corners: [
                Point { x: 110.0, y: 1035.0 },
                Point { x: 265.0, y: 275.0 },
                Point { x: 910.0, y: 260.0 },
                Point { x: 1640.0, y: 915.0 },
            ],
            pitch_length_m: 23.32,
            pitch_width_m: 68.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedConfig {
    /// Real-time span of one differencing window, seconds.
    /// Window length in frames = max(1, round(fps * window_seconds)).
    pub window_seconds: f32,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            window_seconds: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Maximum Lloyd iterations for the 2-means color fits.
    pub kmeans_max_iters: usize,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            kmeans_max_iters: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PossessionConfig {
    /// Maximum ball-to-player distance (pixels) for a possession assignment.
    pub max_player_ball_distance: f32,
}

impl Default for PossessionConfig {
    fn default() -> Self {
        Self {
            max_player_ball_distance: 70.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// GEOMETRY PRIMITIVES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned bounding box in pixel coordinates, (x1, y1) top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Assumed foot position for a person detection.
    pub fn bottom_center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, self.y2)
    }

    /// Bottom corners, used for ball-to-player distance measurement.
    pub fn foot_corners(&self) -> (Point, Point) {
        (Point::new(self.x1, self.y2), Point::new(self.x2, self.y2))
    }
}

/// One decoded video frame, packed RGB (3 bytes per pixel, row-major).
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Self {
        debug_assert_eq!(data.len(), width * height * 3);
        Self {
            data,
            width,
            height,
        }
    }

    /// RGB value at (x, y). Caller guarantees bounds.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * self.width + x) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }
}

// ============================================================================
// DETECTIONS AND TEAMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionClass {
    Player,
    Referee,
    Ball,
}

/// One raw detection from the external detector+associator.
/// `id` is a persistent per-person identity; it is ignored for the ball,
/// which gets the fixed ball ID inside the track store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Detection {
    pub class: DetectionClass,
    pub id: u32,
    pub bbox: BBox,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Home,
    Away,
}

impl Team {
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::Home => "HOME",
            Team::Away => "AWAY",
        }
    }
}
