use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::MaterialCatalog;

#[derive(Debug, Error, PartialEq)]
pub enum PipelineConfigError {
    #[error("frame_count must be at least 1")]
    NoFrames,
    #[error("resolution must be between 1 and {max}, got {got}")]
    Resolution { got: u32, max: u32 },
    #[error("supersample must be between 1 and 4, got {0}")]
    Supersample(u32),
    #[error("resolution {resolution} x supersample {supersample} exceeds {max} samples per edge")]
    SampleBudget {
        resolution: u32,
        supersample: u32,
        max: u32,
    },
    #[error("camera fov_deg must be in (0, 180), got {0}")]
    FieldOfView(f32),
    #[error("camera fill must be in (0, 1], got {0}")]
    Fill(f32),
}

/// Fixed studio camera used for every frame of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov_deg: f32,
    /// Height of the camera above the turntable plane, in degrees.
    pub elevation_deg: f32,
    /// Fraction of the smaller viewport half-extent the bounding sphere covers.
    pub fill: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 35.0,
            elevation_deg: 0.0,
            fill: 0.85,
        }
    }
}

/// Settings that shape every render job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub frame_count: u32,
    /// Edge length of the square output frames in pixels.
    pub resolution: u32,
    /// Per-axis supersampling factor.
    pub supersample: u32,
    pub frame_timeout_ms: u64,
    /// RGBA clear color.
    pub background: [u8; 4],
    pub camera: CameraConfig,
    pub materials: MaterialCatalog,
}

impl PipelineConfig {
    pub const MAX_RESOLUTION: u32 = 4096;
    /// Upper bound on the supersampled render target edge.
    pub const MAX_SAMPLE_EDGE: u32 = 8192;

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), PipelineConfigError> {
        if self.frame_count == 0 {
            return Err(PipelineConfigError::NoFrames);
        }
        if self.resolution == 0 || self.resolution > Self::MAX_RESOLUTION {
            return Err(PipelineConfigError::Resolution {
                got: self.resolution,
                max: Self::MAX_RESOLUTION,
            });
        }
        if !(1..=4).contains(&self.supersample) {
            return Err(PipelineConfigError::Supersample(self.supersample));
        }
        if self.resolution * self.supersample > Self::MAX_SAMPLE_EDGE {
            return Err(PipelineConfigError::SampleBudget {
                resolution: self.resolution,
                supersample: self.supersample,
                max: Self::MAX_SAMPLE_EDGE,
            });
        }
        let fov = self.camera.fov_deg;
        if !(fov.is_finite() && fov > 0.0 && fov < 180.0) {
            return Err(PipelineConfigError::FieldOfView(fov));
        }
        let fill = self.camera.fill;
        if !(fill.is_finite() && fill > 0.0 && fill <= 1.0) {
            return Err(PipelineConfigError::Fill(fill));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_count: 36,
            resolution: 1024,
            supersample: 2,
            frame_timeout_ms: 10_000,
            background: [255, 255, 255, 255],
            camera: CameraConfig::default(),
            materials: MaterialCatalog::default(),
        }
    }
}
