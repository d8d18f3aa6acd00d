use crate::error::{PipelineError, Result};
use crate::types::Config;
use std::fs;
use std::path::Path;

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config =
            serde_yaml::from_str(&contents).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Malformed calibration or timing constants are fatal-input conditions:
    /// every downstream stage would silently produce garbage.
    pub fn validate(&self) -> Result<()> {
        if self.video.fps <= 0.0 {
            return Err(PipelineError::Config(format!(
                "fps must be positive, got {}",
                self.video.fps
            )));
        }
        if self.calibration.pitch_length_m <= 0.0 || self.calibration.pitch_width_m <= 0.0 {
            return Err(PipelineError::InvalidCalibration(format!(
                "pitch dimensions must be positive, got {}x{} m",
                self.calibration.pitch_length_m, self.calibration.pitch_width_m
            )));
        }
        for span in &self.camera.mask_columns {
            if span.end <= span.start {
                return Err(PipelineError::Config(format!(
                    "empty camera mask column band {}..{}",
                    span.start, span.end
                )));
            }
        }
        if self.camera.patch_size % 2 == 0 {
            return Err(PipelineError::Config(
                "camera patch_size must be odd".to_string(),
            ));
        }
        if self.speed.window_seconds <= 0.0 {
            return Err(PipelineError::Config(
                "speed window_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
