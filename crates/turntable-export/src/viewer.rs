use serde::{Deserialize, Serialize};

use crate::naming::index_width;
use crate::{ExportError, SequenceName};

/// Per-variant record read by the product-page 360° viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerConfig {
    /// Directory holding the frames; equals the sequence name.
    pub asset_path: String,
    pub image_count: usize,
    /// Material slug the sequence was rendered with.
    pub material: String,
    /// printf-style frame file pattern, e.g. `name-%03d.png`.
    pub frame_pattern: String,
}

impl ViewerConfig {
    pub fn for_sequence(name: &SequenceName, image_count: usize) -> Self {
        Self {
            asset_path: name.to_string(),
            image_count,
            material: name.material_slug().to_string(),
            frame_pattern: format!("{name}-%0{}d.png", index_width(image_count)),
        }
    }

    /// Recovers product and material from the asset path.
    pub fn sequence_name(&self) -> Result<SequenceName, ExportError> {
        let dir = self.asset_path.trim_end_matches('/');
        let last = dir.rsplit('/').next().unwrap_or(dir);
        SequenceName::parse(last)
    }

    /// Frame shown after dragging by `drag_delta_deg` from frame 0.
    pub fn frame_for_drag(&self, drag_delta_deg: f32) -> u32 {
        frame_for_drag(drag_delta_deg, self.image_count as u32)
    }
}

/// `round(delta / step) mod frame_count`, always in `0..frame_count`.
pub fn frame_for_drag(drag_delta_deg: f32, frame_count: u32) -> u32 {
    if frame_count == 0 || !drag_delta_deg.is_finite() {
        return 0;
    }
    let step = 360.0 / frame_count as f64;
    let steps = (drag_delta_deg as f64 / step).round() as i64;
    steps.rem_euclid(frame_count as i64) as u32
}
