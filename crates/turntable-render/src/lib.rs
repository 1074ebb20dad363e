//! Deterministic software renderer for turntable frames.

use std::time::Instant;

use thiserror::Error;
use turntable_core::PipelineConfig;
use turntable_geom::{CameraTransform, SceneAsset};

mod png;
mod raster;
mod shading;

pub use png::encode_png;

/// Upper bound for the exposure multiplier.
pub const MAX_BRIGHTNESS: f32 = 8.0;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("brightness must be within 0..={max}, got {value}")]
    InvalidExposure { value: f32, max: f32 },
    #[error("scene has no triangles to draw")]
    EmptyScene,
    #[error("frame {frame} exceeded its render deadline")]
    Timeout { frame: u32 },
    #[error("frame buffer does not match {width}x{height} RGBA8")]
    BufferSize { width: u32, height: u32 },
    #[error("png encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Checks a brightness value before any job is allowed to start.
pub fn validate_exposure(brightness: f32) -> Result<(), RenderError> {
    if brightness.is_finite() && (0.0..=MAX_BRIGHTNESS).contains(&brightness) {
        Ok(())
    } else {
        Err(RenderError::InvalidExposure {
            value: brightness,
            max: MAX_BRIGHTNESS,
        })
    }
}

/// One rendered still, tightly packed RGBA8, row-major from the top-left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameImage {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl FrameImage {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Edge length of the square output in pixels.
    pub resolution: u32,
    pub supersample: u32,
    pub background: [u8; 4],
}

impl RenderSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            resolution: config.resolution,
            supersample: config.supersample.max(1),
            background: config.background,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Owns the color and depth targets. Only one frame renders at a time.
///
/// Targets are sized on the first frame and reused afterwards.
#[derive(Default)]
pub struct Renderer {
    settings: RenderSettings,
    target: raster::Target,
}

impl Renderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            target: raster::Target::default(),
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn render_frame(
        &mut self,
        index: u32,
        asset: &SceneAsset,
        camera: &CameraTransform,
        brightness: f32,
        deadline: Option<Instant>,
    ) -> Result<FrameImage, RenderError> {
        validate_exposure(brightness)?;
        if asset.mesh().indices.is_empty() {
            return Err(RenderError::EmptyScene);
        }

        let size = self.settings.resolution.max(1) * self.settings.supersample.max(1);
        self.target.reset(size, size);
        let vertices = raster::project_vertices(asset, camera, &self.target);
        let mut drawn = 0usize;
        for surface in asset.surfaces() {
            let shading = shading::SurfaceShading::for_surface(surface);
            let indices = &asset.mesh().indices[surface.indices.clone()];
            for tri in indices.chunks_exact(3) {
                if drawn % 256 == 0 && deadline.is_some_and(|d| Instant::now() >= d) {
                    tracing::warn!(frame = index, "render deadline exceeded");
                    return Err(RenderError::Timeout { frame: index });
                }
                drawn += 1;
                let corners = [tri[0], tri[1], tri[2]].map(|i| vertices[i as usize]);
                raster::draw_triangle(&mut self.target, corners, camera.eye, &shading);
            }
        }

        let pixels = self.target.resolve(
            self.settings.resolution,
            self.settings.supersample,
            self.settings.background,
            brightness,
        );
        Ok(FrameImage {
            index,
            width: self.settings.resolution,
            height: self.settings.resolution,
            pixels,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use turntable_core::{CameraConfig, MaterialCatalog, UserOffset};
    use turntable_geom::{bind_material, camera_transform, resolve_centering, OrbitRig, TriMesh};

    fn cube(center: [f32; 3], half: f32) -> SceneAsset {
        let [cx, cy, cz] = center;
        let mut positions = Vec::new();
        for z in [-half, half] {
            for y in [-half, half] {
                for x in [-half, half] {
                    positions.push([cx + x, cy + y, cz + z]);
                }
            }
        }
        // Corner index = x + 2y + 4z.
        let indices = vec![
            0, 2, 3, 0, 3, 1, 4, 5, 7, 4, 7, 6, 0, 1, 5, 0, 5, 4, 2, 6, 7, 2, 7, 3, 0, 4, 6, 0,
            6, 2, 1, 3, 7, 1, 7, 5,
        ];
        SceneAsset::from_mesh(
            "cube",
            TriMesh {
                positions,
                normals: Vec::new(),
                indices,
            },
        )
        .unwrap()
    }

    fn settings() -> RenderSettings {
        RenderSettings {
            resolution: 64,
            supersample: 2,
            background: [255, 255, 255, 255],
        }
    }

    fn camera_for(asset: &SceneAsset, angle: f32, offset: UserOffset) -> CameraTransform {
        let config = CameraConfig::default();
        let centering = resolve_centering(asset, 1.0, &config).unwrap();
        let rig = OrbitRig::frame(&asset.bounds(), &config, 1.0).unwrap();
        camera_transform(&rig, angle, &centering, &offset)
    }

    #[test]
    fn identical_inputs_give_identical_bytes() {
        let catalog = MaterialCatalog::default();
        let mut asset = cube([0.0, 2.0, 0.0], 1.0);
        bind_material(&mut asset, &catalog, catalog.get("18k-rose-gold").unwrap()).unwrap();
        let camera = camera_for(&asset, 30.0, UserOffset::ZERO);

        let mut renderer = Renderer::new(settings());
        let first = renderer.render_frame(3, &asset, &camera, 1.2, None).unwrap();
        let second = renderer.render_frame(3, &asset, &camera, 1.2, None).unwrap();
        let fresh = Renderer::new(settings())
            .render_frame(3, &asset, &camera, 1.2, None)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first, fresh);
        assert_eq!(first.pixels.len(), 64 * 64 * 4);
    }

    #[test]
    fn model_covers_center_and_corners_stay_background() {
        let asset = cube([0.0, 2.0, 0.0], 1.0);
        let camera = camera_for(&asset, 0.0, UserOffset::ZERO);
        let frame = Renderer::new(settings())
            .render_frame(0, &asset, &camera, 1.0, None)
            .unwrap();
        assert_ne!(frame.pixel(32, 32), [255, 255, 255, 255]);
        assert_eq!(frame.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(frame.pixel(63, 63), [255, 255, 255, 255]);
    }

    #[test]
    fn user_offset_moves_the_model() {
        let asset = cube([0.0, 0.0, 0.0], 1.0);
        let mut renderer = Renderer::new(settings());
        let shifted = camera_for(&asset, 0.0, UserOffset::new(0.45, 0.0));
        let frame = renderer.render_frame(0, &asset, &shifted, 1.0, None).unwrap();
        assert_eq!(frame.pixel(10, 32), [255, 255, 255, 255]);
        assert_ne!(frame.pixel(60, 32), [255, 255, 255, 255]);
    }

    #[test]
    fn brightness_scales_model_not_background() {
        let asset = cube([0.0, 0.0, 0.0], 1.0);
        let camera = camera_for(&asset, 20.0, UserOffset::ZERO);
        let mut renderer = Renderer::new(settings());
        let dim = renderer.render_frame(0, &asset, &camera, 0.5, None).unwrap();
        let bright = renderer.render_frame(0, &asset, &camera, 2.0, None).unwrap();
        let luma = |p: [u8; 4]| p[0] as u32 + p[1] as u32 + p[2] as u32;
        assert!(luma(bright.pixel(32, 32)) > luma(dim.pixel(32, 32)));
        assert_eq!(dim.pixel(0, 0), bright.pixel(0, 0));
    }

    #[test]
    fn invalid_exposure_is_rejected() {
        for value in [-0.1, f32::NAN, f32::INFINITY, MAX_BRIGHTNESS + 1.0] {
            assert!(matches!(
                validate_exposure(value),
                Err(RenderError::InvalidExposure { .. })
            ));
        }
        assert!(validate_exposure(0.0).is_ok());
        assert!(validate_exposure(MAX_BRIGHTNESS).is_ok());

        let asset = cube([0.0, 0.0, 0.0], 1.0);
        let camera = camera_for(&asset, 0.0, UserOffset::ZERO);
        let result = Renderer::new(settings()).render_frame(0, &asset, &camera, -1.0, None);
        assert!(matches!(result, Err(RenderError::InvalidExposure { .. })));
    }

    #[test]
    fn expired_deadline_fails_the_frame() {
        let asset = cube([0.0, 0.0, 0.0], 1.0);
        let camera = camera_for(&asset, 0.0, UserOffset::ZERO);
        let past = Instant::now() - Duration::from_millis(5);
        let result = Renderer::new(settings()).render_frame(7, &asset, &camera, 1.0, Some(past));
        assert!(matches!(result, Err(RenderError::Timeout { frame: 7 })));
    }

    #[test]
    fn materials_change_the_image() {
        let catalog = MaterialCatalog::default();
        let mut asset = cube([0.0, 0.0, 0.0], 1.0);
        let camera = camera_for(&asset, 40.0, UserOffset::ZERO);
        let mut renderer = Renderer::new(settings());

        bind_material(&mut asset, &catalog, catalog.get("platinum").unwrap()).unwrap();
        let platinum = renderer.render_frame(0, &asset, &camera, 1.0, None).unwrap();
        bind_material(&mut asset, &catalog, catalog.get("18k-yellow-gold").unwrap()).unwrap();
        let gold = renderer.render_frame(0, &asset, &camera, 1.0, None).unwrap();
        assert_ne!(platinum.pixels, gold.pixels);
    }
}
