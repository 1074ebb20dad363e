//! Turntable camera: evenly spaced azimuths and the per-frame clip transform.

use glam::{Mat4, Vec3, Vec4};
use turntable_core::{CameraConfig, CenteringTransform, UserOffset};

use crate::{Aabb, GeomError};

/// Azimuths in degrees for a full turn, `i * 360 / frame_count` for frame `i`.
pub fn angles_for(frame_count: u32) -> Vec<f32> {
    if frame_count == 0 {
        return Vec::new();
    }
    let step = 360.0 / frame_count as f64;
    (0..frame_count).map(|i| (i as f64 * step) as f32).collect()
}

/// Fixed studio camera framed around one model's bounding sphere.
///
/// The camera sits on the +Z side looking at the world origin; the model turns
/// about the vertical axis through its bounding-box center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitRig {
    pivot: Vec3,
    eye: Vec3,
    view: Mat4,
    proj: Mat4,
    distance: f32,
    fov_y: f32,
}

impl OrbitRig {
    pub fn frame(bounds: &Aabb, camera: &CameraConfig, aspect: f32) -> Result<Self, GeomError> {
        if !(aspect.is_finite() && aspect > 0.0) {
            return Err(GeomError::InvalidViewport(aspect));
        }
        if bounds.is_degenerate() {
            return Err(GeomError::DegenerateModel {
                size: bounds.size().to_array(),
            });
        }

        let pivot = bounds.center();
        let radius = bounds.bounding_radius();
        let fov_y = camera.fov_deg.to_radians();
        let offset = pivot.length();
        // Far enough that the bounding sphere fits the vertical field of view
        // wherever the model sits relative to the origin.
        let distance = radius / (fov_y * 0.5).sin() + offset;

        let elevation = camera.elevation_deg.clamp(-80.0, 80.0).to_radians();
        let eye = Vec3::new(0.0, distance * elevation.sin(), distance * elevation.cos());
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);

        let nearest = distance - offset - radius;
        let near = (nearest * 0.5).max(radius * 1.0e-3);
        let far = (distance + offset + radius) * 1.5;
        let proj = Mat4::perspective_rh(fov_y, aspect, near, far);

        Ok(Self {
            pivot,
            eye,
            view,
            proj,
            distance,
            fov_y,
        })
    }

    pub fn pivot(&self) -> Vec3 {
        self.pivot
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj * self.view
    }

    /// Turns the model by `-angle` so the frame shows it from azimuth `angle`.
    pub fn orbit(&self, angle_deg: f32) -> Mat4 {
        Mat4::from_translation(self.pivot)
            * Mat4::from_rotation_y(-angle_deg.to_radians())
            * Mat4::from_translation(-self.pivot)
    }
}

/// Per-frame transform, kept as separate terms.
///
/// Orbit and projection belong to the scene, centering is fixed per model and
/// the user offset belongs to the viewport. They are only multiplied together
/// in [`CameraTransform::clip_from_model`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTransform {
    pub angle_deg: f32,
    pub orbit: Mat4,
    pub view_proj: Mat4,
    pub centering: Mat4,
    pub user_offset: Mat4,
    pub eye: Vec3,
}

pub fn camera_transform(
    rig: &OrbitRig,
    angle_deg: f32,
    centering: &CenteringTransform,
    user_offset: &UserOffset,
) -> CameraTransform {
    CameraTransform {
        angle_deg,
        orbit: rig.orbit(angle_deg),
        view_proj: rig.view_proj(),
        centering: centering_matrix(centering),
        user_offset: user_offset_matrix(user_offset),
        eye: rig.eye(),
    }
}

/// NDC affine `p * scale + offset`, expressed on homogeneous clip coordinates.
fn centering_matrix(centering: &CenteringTransform) -> Mat4 {
    Mat4::from_translation(Vec3::new(centering.offset_x, centering.offset_y, 0.0))
        * Mat4::from_scale(Vec3::new(centering.scale, centering.scale, 1.0))
}

fn user_offset_matrix(offset: &UserOffset) -> Mat4 {
    // NDC spans two units per viewport edge.
    Mat4::from_translation(Vec3::new(offset.dx * 2.0, offset.dy * 2.0, 0.0))
}

impl CameraTransform {
    pub fn world_from_model(&self) -> Mat4 {
        self.orbit
    }

    pub fn clip_from_model(&self) -> Mat4 {
        self.user_offset * self.centering * self.view_proj * self.orbit
    }

    /// Pixel position of a model-space point, origin at the top-left corner.
    pub fn project_to_pixel(&self, point: Vec3, width: u32, height: u32) -> Option<[f32; 2]> {
        let clip: Vec4 = self.clip_from_model() * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        Some([
            (ndc_x + 1.0) * 0.5 * width as f32,
            (1.0 - ndc_y) * 0.5 * height as f32,
        ])
    }
}
