use glam::{Mat3, Vec2, Vec3};
use turntable_geom::{CameraTransform, SceneAsset};

use crate::shading::SurfaceShading;

/// Supersampled color + depth buffers.
#[derive(Default)]
pub(crate) struct Target {
    width: u32,
    height: u32,
    color: Vec<Vec3>,
    depth: Vec<f32>,
}

/// Vertex mapped into sample space, with world-space shading inputs.
#[derive(Clone, Copy)]
pub(crate) struct Projected {
    screen: Vec2,
    depth: f32,
    inv_w: f32,
    world: Vec3,
    normal: Vec3,
}

impl Target {
    /// Clears both buffers, reallocating only when the size changes.
    pub(crate) fn reset(&mut self, width: u32, height: u32) {
        let len = (width * height) as usize;
        self.width = width;
        self.height = height;
        self.color.clear();
        self.color.resize(len, Vec3::ZERO);
        self.depth.clear();
        self.depth.resize(len, f32::INFINITY);
    }

    /// Box-filters `factor`x`factor` samples into one tone-mapped RGBA8 pixel.
    pub(crate) fn resolve(
        &self,
        resolution: u32,
        factor: u32,
        background: [u8; 4],
        brightness: f32,
    ) -> Vec<u8> {
        let bg = background.map(|c| c as f32 / 255.0);
        let samples = (factor * factor) as f32;
        let mut out = Vec::with_capacity((resolution * resolution * 4) as usize);

        for py in 0..resolution {
            for px in 0..resolution {
                let mut acc = [0.0f32; 4];
                for sy in 0..factor {
                    for sx in 0..factor {
                        let x = px * factor + sx;
                        let y = py * factor + sy;
                        let i = (y * self.width + x) as usize;
                        let sample = if self.depth[i].is_finite() {
                            let c = display(self.color[i] * brightness);
                            [c.x, c.y, c.z, 1.0]
                        } else {
                            bg
                        };
                        for (a, s) in acc.iter_mut().zip(sample) {
                            *a += s;
                        }
                    }
                }
                out.extend(acc.map(|a| ((a / samples) * 255.0).round().clamp(0.0, 255.0) as u8));
            }
        }
        out
    }
}

/// Reinhard tone map followed by display gamma.
fn display(radiance: Vec3) -> Vec3 {
    let mapped = radiance / (Vec3::ONE + radiance);
    mapped.powf(1.0 / 2.2)
}

pub(crate) fn project_vertices(
    asset: &SceneAsset,
    camera: &CameraTransform,
    target: &Target,
) -> Vec<Option<Projected>> {
    let clip_from_model = camera.clip_from_model();
    let world_from_model = camera.world_from_model();
    let normal_matrix = Mat3::from_mat4(world_from_model).inverse().transpose();
    let (w, h) = (target.width as f32, target.height as f32);
    let mesh = asset.mesh();

    mesh.positions
        .iter()
        .zip(&mesh.normals)
        .map(|(p, n)| {
            let p = Vec3::from_array(*p);
            let clip = clip_from_model * p.extend(1.0);
            if clip.w <= 1.0e-6 {
                return None;
            }
            let inv_w = 1.0 / clip.w;
            let ndc = clip.truncate() * inv_w;
            Some(Projected {
                screen: Vec2::new((ndc.x + 1.0) * 0.5 * w, (1.0 - ndc.y) * 0.5 * h),
                depth: ndc.z,
                inv_w,
                world: world_from_model.transform_point3(p),
                normal: (normal_matrix * Vec3::from_array(*n)).normalize_or_zero(),
            })
        })
        .collect()
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (p.x - a.x) * (b.y - a.y) - (p.y - a.y) * (b.x - a.x)
}

pub(crate) fn draw_triangle(
    target: &mut Target,
    corners: [Option<Projected>; 3],
    eye: Vec3,
    shading: &SurfaceShading,
) {
    let [Some(v0), Some(v1), Some(v2)] = corners else {
        return;
    };
    let area = edge(v0.screen, v1.screen, v2.screen);
    if area.abs() < 1.0e-12 {
        return;
    }

    let min = v0.screen.min(v1.screen).min(v2.screen);
    let max = v0.screen.max(v1.screen).max(v2.screen);
    if max.x < 0.0 || max.y < 0.0 || min.x >= target.width as f32 || min.y >= target.height as f32 {
        return;
    }
    let x0 = min.x.floor().max(0.0) as u32;
    let y0 = min.y.floor().max(0.0) as u32;
    let x1 = (max.x.ceil() as u32).min(target.width - 1);
    let y1 = (max.y.ceil() as u32).min(target.height - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let b0 = edge(v1.screen, v2.screen, p) / area;
            let b1 = edge(v2.screen, v0.screen, p) / area;
            let b2 = edge(v0.screen, v1.screen, p) / area;
            if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                continue;
            }

            let z = b0 * v0.depth + b1 * v1.depth + b2 * v2.depth;
            let i = (y * target.width + x) as usize;
            if !(0.0..=1.0).contains(&z) || z >= target.depth[i] {
                continue;
            }

            // Perspective-correct weights for world-space attributes.
            let iw = b0 * v0.inv_w + b1 * v1.inv_w + b2 * v2.inv_w;
            let (p0, p1, p2) = (b0 * v0.inv_w / iw, b1 * v1.inv_w / iw, b2 * v2.inv_w / iw);
            let world = v0.world * p0 + v1.world * p1 + v2.world * p2;
            let normal = (v0.normal * p0 + v1.normal * p1 + v2.normal * p2).normalize_or_zero();

            target.depth[i] = z;
            target.color[i] = shading.shade(normal, (eye - world).normalize_or_zero());
        }
    }
}
