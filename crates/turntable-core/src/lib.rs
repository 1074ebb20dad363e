//! Core value types shared by the pipeline crates, the server and the web tool.

use serde::{Deserialize, Serialize};

mod config;
mod material;

pub use config::{CameraConfig, PipelineConfig, PipelineConfigError};
pub use material::{CatalogError, MaterialCatalog, MaterialConfig, Rgb};

/// One-time correction that centers a model's bounding box in the viewport.
///
/// `scale` multiplies projected coordinates, `offset_x`/`offset_y` are added
/// afterwards. Both act in normalized device coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CenteringTransform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl CenteringTransform {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };
}

/// Interactive nudge applied on top of the centering transform.
///
/// Measured as a fraction of the viewport: `dx = 0.1` shifts the image right by
/// a tenth of its width, `dy = 0.1` shifts it up by a tenth of its height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UserOffset {
    pub dx: f32,
    pub dy: f32,
}

impl UserOffset {
    pub const ZERO: Self = Self { dx: 0.0, dy: 0.0 };

    pub fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }

    pub fn is_finite(&self) -> bool {
        self.dx.is_finite() && self.dy.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_offset_defaults_to_zero() {
        assert_eq!(UserOffset::default(), UserOffset::ZERO);
        assert!(UserOffset::new(0.25, -0.1).is_finite());
        assert!(!UserOffset::new(f32::NAN, 0.0).is_finite());
    }

    #[test]
    fn centering_serializes_flat() {
        let centering = CenteringTransform {
            scale: 1.5,
            offset_x: 0.0,
            offset_y: -0.25,
        };
        let json = serde_json::to_value(centering).unwrap();
        assert_eq!(json["scale"], 1.5);
        assert_eq!(json["offset_y"], -0.25);
    }
}
