use turntable_core::{CameraConfig, CenteringTransform};

use crate::{GeomError, OrbitRig, SceneAsset};

/// Computes the one-time scale/offset that centers `asset` in the viewport.
///
/// Depends only on the asset's bounding box, the viewport aspect and the fixed
/// camera. Interactive offsets are applied later as a separate term and never
/// feed back into this result.
pub fn resolve_centering(
    asset: &SceneAsset,
    viewport_aspect: f32,
    camera: &CameraConfig,
) -> Result<CenteringTransform, GeomError> {
    let bounds = asset.bounds();
    let rig = OrbitRig::frame(&bounds, camera, viewport_aspect)?;

    // The pivot is fixed by every orbit step and the bounding sphere turns into
    // itself, so one projection covers all frames.
    let center = rig.view().transform_point3(rig.pivot());
    let radius = bounds.bounding_radius();
    let depth = -center.z;
    let tan_half = (rig.fov_y() * 0.5).tan();

    let (mid_x, half_x) = sphere_span(center.x, depth, radius);
    let (mid_y, half_y) = sphere_span(center.y, depth, radius);
    let ndc_x = mid_x / (tan_half * viewport_aspect);
    let ndc_y = mid_y / tan_half;
    let extent_x = half_x / (tan_half * viewport_aspect);
    let extent_y = half_y / tan_half;

    let scale = camera.fill / extent_x.max(extent_y);
    let centering = CenteringTransform {
        scale,
        offset_x: -ndc_x * scale,
        offset_y: -ndc_y * scale,
    };
    tracing::debug!(
        asset = asset.name(),
        scale = centering.scale,
        offset_x = centering.offset_x,
        offset_y = centering.offset_y,
        "centering resolved"
    );
    Ok(centering)
}

/// Projected center and half-extent of a sphere along one view axis.
///
/// Values are slopes `a / depth`. A plane through the eye with slope `u` is
/// tangent to the sphere when `(a - u * depth)^2 = r^2 * (1 + u^2)`; the
/// half-extent is the larger distance from the projected center to either root.
fn sphere_span(a: f32, depth: f32, radius: f32) -> (f32, f32) {
    let mid = a / depth;
    let qa = depth * depth - radius * radius;
    let qb = -2.0 * a * depth;
    let qc = a * a - radius * radius;
    let disc = (qb * qb - 4.0 * qa * qc).max(0.0).sqrt();
    let t0 = (-qb + disc) / (2.0 * qa);
    let t1 = (-qb - disc) / (2.0 * qa);
    let half = (t0 - mid).abs().max((t1 - mid).abs());
    (mid, half)
}
