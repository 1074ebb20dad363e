//! Studio lighting for metal finishes.

use std::f32::consts::PI;

use glam::Vec3;
use turntable_geom::Surface;

struct Light {
    /// Unit vector pointing at the light.
    direction: Vec3,
    radiance: Vec3,
}

/// Key, fill and rim lights, fixed relative to the camera.
fn studio_lights() -> [Light; 3] {
    [
        Light {
            direction: Vec3::new(-0.5, 0.8, 0.9).normalize(),
            radiance: Vec3::splat(2.4),
        },
        Light {
            direction: Vec3::new(0.8, 0.25, 0.6).normalize(),
            radiance: Vec3::new(0.95, 0.97, 1.0),
        },
        Light {
            direction: Vec3::new(0.0, 0.5, -1.0).normalize(),
            radiance: Vec3::splat(1.4),
        },
    ]
}

/// Soft gradient standing in for a photo-studio environment.
fn environment(direction: Vec3) -> Vec3 {
    let t = direction.y * 0.5 + 0.5;
    Vec3::splat(0.18).lerp(Vec3::new(1.05, 1.05, 1.1), t)
}

pub(crate) struct SurfaceShading {
    base: Vec3,
    metallic: f32,
    roughness: f32,
    lights: [Light; 3],
}

impl SurfaceShading {
    pub(crate) fn for_surface(surface: &Surface) -> Self {
        let (base, metallic, roughness) = match surface.material() {
            Some(material) => (
                Vec3::from_array(material.base_color),
                material.metallic,
                material.roughness,
            ),
            None => (Vec3::from_array(surface.fallback_color), 0.0, 0.6),
        };
        Self {
            base,
            metallic: metallic.clamp(0.0, 1.0),
            roughness: roughness.clamp(0.02, 1.0),
            lights: studio_lights(),
        }
    }

    /// Outgoing linear radiance for unit normal `n` and unit view vector `v`.
    pub(crate) fn shade(&self, n: Vec3, v: Vec3) -> Vec3 {
        // Open meshes show their inside; light both sides.
        let n = if n.dot(v) < 0.0 { -n } else { n };
        let n_dot_v = n.dot(v).max(0.0);

        let f0 = Vec3::splat(0.04).lerp(self.base, self.metallic);
        let diffuse = self.base * (1.0 - self.metallic);
        let alpha = self.roughness * self.roughness;
        let shininess = (2.0 / (alpha * alpha) - 2.0).clamp(1.0, 4096.0);
        let norm = (shininess + 8.0) / (8.0 * PI);

        let mut color = Vec3::ZERO;
        for light in &self.lights {
            let n_dot_l = n.dot(light.direction);
            if n_dot_l <= 0.0 {
                continue;
            }
            let h = (light.direction + v).normalize_or_zero();
            let n_dot_h = n.dot(h).max(0.0);
            let fresnel = schlick(f0, h.dot(v).max(0.0));
            let specular = fresnel * norm * n_dot_h.powf(shininess);
            color += light.radiance * n_dot_l * (diffuse + specular);
        }

        let reflected = (n * (2.0 * n_dot_v) - v).normalize_or_zero();
        let gloss = 1.0 - self.roughness * 0.7;
        color += environment(reflected) * schlick(f0, n_dot_v) * gloss;
        color += diffuse * environment(n) * 0.15;
        color
    }
}

fn schlick(f0: Vec3, cos_theta: f32) -> Vec3 {
    f0 + (Vec3::ONE - f0) * (1.0 - cos_theta).powi(5)
}
