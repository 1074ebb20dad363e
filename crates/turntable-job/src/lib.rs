//! Pipeline orchestration: the interactive stage, render jobs and their state
//! machine, and exclusive access to the single renderer.

use std::fmt;

use thiserror::Error;
use turntable_core::PipelineConfigError;
use turntable_export::ExportError;
use turntable_geom::{GeomError, LoadError};
use turntable_render::RenderError;

mod run;
mod slot;
mod stage;

pub use run::{CancelToken, JobOutcome, JobRun};
pub use slot::{RenderLease, RenderSlot};
pub use stage::{Controls, ModelInfo, RenderJob, Stage};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("could not load model: {0}")]
    Load(#[from] LoadError),
    #[error("model has a zero-volume bounding box (size {size:?})")]
    DegenerateModel { size: [f32; 3] },
    #[error("unknown material `{0}`")]
    UnknownMaterial(String),
    #[error("invalid brightness: {0}")]
    InvalidExposure(#[source] RenderError),
    #[error("offset ({dx}, {dy}) is not finite")]
    InvalidOffset { dx: f32, dy: f32 },
    #[error("invalid viewport aspect {0}")]
    InvalidViewport(f32),
    #[error("no model is loaded")]
    NoModel,
    #[error("renderer is busy with another job")]
    Busy,
    #[error("frame {frame} failed to render: {source}")]
    FrameRender {
        frame: u32,
        #[source]
        source: RenderError,
    },
    #[error("internal error: {reason}")]
    IncompleteSequence { reason: String },
    #[error(transparent)]
    Export(ExportError),
    #[error(transparent)]
    Config(#[from] PipelineConfigError),
}

impl JobError {
    /// True for upstream defects the user cannot fix by changing inputs.
    pub fn is_internal(&self) -> bool {
        matches!(self, JobError::IncompleteSequence { .. })
    }
}

impl From<GeomError> for JobError {
    fn from(err: GeomError) -> Self {
        match err {
            GeomError::Load(err) => JobError::Load(err),
            GeomError::DegenerateModel { size } => JobError::DegenerateModel { size },
            GeomError::InvalidViewport(aspect) => JobError::InvalidViewport(aspect),
            GeomError::UnknownMaterial(id) => JobError::UnknownMaterial(id),
        }
    }
}

impl From<ExportError> for JobError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::IncompleteSequence { reason } => JobError::IncompleteSequence { reason },
            other => JobError::Export(other),
        }
    }
}

/// Lifecycle of the stage and of one render job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Idle,
    ModelLoaded,
    Centered,
    /// `frame` is the last frame that finished rendering.
    Rendering { frame: u32 },
    Packaging,
    Complete,
    Failed(String),
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed(_) | JobState::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Idle => f.write_str("idle"),
            JobState::ModelLoaded => f.write_str("model loaded"),
            JobState::Centered => f.write_str("centered"),
            JobState::Rendering { frame } => write!(f, "rendering frame {frame}"),
            JobState::Packaging => f.write_str("packaging"),
            JobState::Complete => f.write_str("complete"),
            JobState::Failed(reason) => write!(f, "failed: {reason}"),
            JobState::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use turntable_core::PipelineConfig;
    use turntable_geom::{SceneAsset, TriMesh};

    /// Closed cube, corner index = x + 2y + 4z.
    pub fn cube(center: [f32; 3], half: f32) -> SceneAsset {
        let mut positions = Vec::new();
        for z in [-half, half] {
            for y in [-half, half] {
                for x in [-half, half] {
                    positions.push([center[0] + x, center[1] + y, center[2] + z]);
                }
            }
        }
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

    pub fn small_config(frame_count: u32) -> PipelineConfig {
        PipelineConfig {
            frame_count,
            resolution: 16,
            supersample: 1,
            ..PipelineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_incomplete_sequence_is_internal() {
        let incomplete: JobError = ExportError::IncompleteSequence {
            reason: "frame 17 is missing".into(),
        }
        .into();
        assert!(incomplete.is_internal());
        assert!(incomplete.to_string().contains("frame 17 is missing"));

        let unknown: JobError = GeomError::UnknownMaterial("bronze".into()).into();
        assert!(matches!(&unknown, JobError::UnknownMaterial(id) if id == "bronze"));
        assert!(!unknown.is_internal());
        assert!(!JobError::Busy.is_internal());
        assert!(!JobError::FrameRender {
            frame: 3,
            source: RenderError::Timeout { frame: 3 }
        }
        .is_internal());
    }

    #[test]
    fn terminal_states() {
        assert!(JobState::Complete.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(JobState::Failed("x".into()).is_terminal());
        assert!(!JobState::Rendering { frame: 2 }.is_terminal());
        assert_eq!(JobState::Rendering { frame: 2 }.to_string(), "rendering frame 2");
    }
}
