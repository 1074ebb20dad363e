//! Batch export: sequence naming, contiguity checks and archive packaging.

use thiserror::Error;
use turntable_render::{FrameImage, RenderError};

mod archive;
mod naming;
mod viewer;

pub use archive::SequenceArchive;
pub use naming::{frame_file_name, slugify_material, slugify_product, SequenceName};
pub use viewer::{frame_for_drag, ViewerConfig};

#[derive(Debug, Error)]
pub enum ExportError {
    /// Frames handed to the packager do not form `0..expected`.
    #[error("incomplete sequence: {reason}")]
    IncompleteSequence { reason: String },
    #[error("invalid sequence name: {0}")]
    InvalidName(String),
    #[error(transparent)]
    Encode(#[from] RenderError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn incomplete(reason: String) -> ExportError {
    ExportError::IncompleteSequence { reason }
}

/// Checks that `frames` hold exactly the indices `0..expected_count` with one
/// shared size, and freezes them into an archive ordered by index.
pub fn package_sequence(
    mut frames: Vec<FrameImage>,
    name: SequenceName,
    expected_count: u32,
) -> Result<SequenceArchive, ExportError> {
    if expected_count == 0 {
        return Err(incomplete("expected frame count is zero".to_string()));
    }
    if frames.len() != expected_count as usize {
        return Err(incomplete(format!(
            "expected {expected_count} frames, got {}",
            frames.len()
        )));
    }

    frames.sort_by_key(|f| f.index);
    for (slot, frame) in frames.iter().enumerate() {
        let want = slot as u32;
        if frame.index >= expected_count {
            return Err(incomplete(format!(
                "frame index {} is outside 0..{expected_count}",
                frame.index
            )));
        }
        if frame.index < want {
            return Err(incomplete(format!("frame {} appears twice", frame.index)));
        }
        if frame.index > want {
            return Err(incomplete(format!("frame {want} is missing")));
        }
    }

    let (width, height) = (frames[0].width, frames[0].height);
    if let Some(odd) = frames
        .iter()
        .find(|f| f.width != width || f.height != height)
    {
        return Err(incomplete(format!(
            "frame {} is {}x{}, expected {width}x{height}",
            odd.index, odd.width, odd.height
        )));
    }

    tracing::debug!(sequence = %name, frames = frames.len(), "sequence packaged");
    Ok(SequenceArchive::new(name, frames))
}
