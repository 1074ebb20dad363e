//! Geometry layer: model loading, bounds, centering and the orbit camera.

use glam::{Mat3, Mat4, Vec3};
use thiserror::Error;

mod centering;
mod loader;
mod orbit;
mod scene;

pub use centering::resolve_centering;
pub use loader::{load, LoadError};
pub use orbit::{angles_for, camera_transform, CameraTransform, OrbitRig};
pub use scene::{bind_material, SceneAsset, Surface};

#[derive(Debug, Error)]
pub enum GeomError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("model bounding box has zero volume (size {size:?})")]
    DegenerateModel { size: [f32; 3] },
    #[error("viewport aspect must be positive and finite, got {0}")]
    InvalidViewport(f32),
    #[error("unknown material `{0}`")]
    UnknownMaterial(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl TriMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn append_transformed(&mut self, other: &TriMesh, transform: Mat4) {
        let base = self.positions.len() as u32;
        let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();
        self.positions.extend(other.positions.iter().map(|p| {
            let p = Vec3::from_array(*p);
            transform.transform_point3(p).to_array()
        }));
        self.normals.extend(other.normals.iter().map(|n| {
            let n = normal_matrix * Vec3::from_array(*n);
            if n.length_squared() > 1.0e-12 {
                n.normalize().to_array()
            } else {
                [0.0, 1.0, 0.0]
            }
        }));
        self.indices
            .extend(other.indices.iter().copied().map(|idx| idx + base));
    }

    /// Fills `normals` with area-weighted vertex normals.
    pub fn compute_normals(&mut self) {
        let mut acc = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let p0 = Vec3::from_array(self.positions[i0]);
            let p1 = Vec3::from_array(self.positions[i1]);
            let p2 = Vec3::from_array(self.positions[i2]);
            // Cross product length is twice the area, which is the weight we want.
            let n = (p1 - p0).cross(p2 - p0);
            acc[i0] += n;
            acc[i1] += n;
            acc[i2] += n;
        }
        self.normals = acc
            .into_iter()
            .map(|n| {
                if n.length_squared() > 1.0e-12 {
                    n.normalize().to_array()
                } else {
                    [0.0, 1.0, 0.0]
                }
            })
            .collect();
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.positions)
    }
}

impl Aabb {
    pub fn from_points(points: &[[f32; 3]]) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for p in points {
            let v = Vec3::from_array(*p);
            min = min.min(v);
            max = max.max(v);
        }
        if !min.is_finite() || !max.is_finite() {
            return Aabb::default();
        }
        Aabb {
            min: min.to_array(),
            max: max.to_array(),
        }
    }

    pub fn center(&self) -> Vec3 {
        (Vec3::from_array(self.min) + Vec3::from_array(self.max)) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        Vec3::from_array(self.max) - Vec3::from_array(self.min)
    }

    /// Radius of the sphere through the box corners.
    pub fn bounding_radius(&self) -> f32 {
        self.size().length() * 0.5
    }

    pub fn is_degenerate(&self) -> bool {
        let size = self.size();
        !size.is_finite() || size.min_element() <= 1.0e-6
    }
}
