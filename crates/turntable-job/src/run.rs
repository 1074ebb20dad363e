use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use turntable_export::{package_sequence, SequenceArchive};
use turntable_geom::{angles_for, bind_material, camera_transform};
use turntable_render::FrameImage;

use crate::{JobError, JobState, RenderJob, RenderLease};

/// Shared flag checked between frames.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub enum JobOutcome {
    Complete(SequenceArchive),
    Cancelled,
}

/// One job in flight. Each [`JobRun::step`] renders a single frame or
/// packages the finished sequence, so cancellation lands between frames.
pub struct JobRun {
    job: RenderJob,
    renderer: RenderLease,
    cancel: CancelToken,
    angles: Vec<f32>,
    frames: Vec<FrameImage>,
    state: JobState,
    archive: Option<SequenceArchive>,
}

impl JobRun {
    pub fn new(job: RenderJob, renderer: RenderLease, cancel: CancelToken) -> Self {
        let angles = angles_for(job.frame_count);
        Self {
            frames: Vec::with_capacity(angles.len()),
            job,
            renderer,
            cancel,
            angles,
            state: JobState::Centered,
            archive: None,
        }
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn job(&self) -> &RenderJob {
        &self.job
    }

    pub fn frames_rendered(&self) -> usize {
        self.frames.len()
    }

    /// Most recent frame, while the sequence is still being rendered.
    pub fn last_frame(&self) -> Option<&FrameImage> {
        self.frames.last()
    }

    pub fn archive(&self) -> Option<&SequenceArchive> {
        self.archive.as_ref()
    }

    /// Advances the job by one unit of work.
    ///
    /// Any error moves the job to `Failed` and drops every rendered frame.
    /// Terminal states are returned unchanged.
    pub fn step(&mut self) -> Result<&JobState, JobError> {
        if self.state.is_terminal() {
            return Ok(&self.state);
        }
        if self.cancel.is_cancelled() {
            let rendered = self.frames.len();
            self.frames.clear();
            self.state = JobState::Cancelled;
            tracing::info!(sequence = %self.job.name, rendered, "job cancelled");
            return Ok(&self.state);
        }

        let result = match self.state {
            JobState::Packaging => self.package(),
            _ => self.render_next(),
        };
        match result {
            Ok(next) => {
                self.state = next;
                Ok(&self.state)
            }
            Err(err) => {
                self.frames.clear();
                self.state = JobState::Failed(err.to_string());
                if err.is_internal() {
                    tracing::error!(sequence = %self.job.name, error = %err, "job failed");
                } else {
                    tracing::warn!(sequence = %self.job.name, error = %err, "job failed");
                }
                Err(err)
            }
        }
    }

    fn render_next(&mut self) -> Result<JobState, JobError> {
        let index = self.frames.len() as u32;
        let angle = self.angles[index as usize];
        let job = &mut self.job;

        bind_material(&mut job.asset, &job.catalog, &job.material)?;
        let camera = camera_transform(&job.rig, angle, &job.centering, &job.user_offset);
        let deadline = Instant::now() + job.frame_timeout;
        let frame = self
            .renderer
            .render_frame(index, &job.asset, &camera, job.brightness, Some(deadline))
            .map_err(|source| JobError::FrameRender {
                frame: index,
                source,
            })?;
        self.frames.push(frame);
        tracing::debug!(sequence = %job.name, frame = index, angle, "frame rendered");

        if self.frames.len() == self.angles.len() {
            Ok(JobState::Packaging)
        } else {
            Ok(JobState::Rendering { frame: index })
        }
    }

    fn package(&mut self) -> Result<JobState, JobError> {
        let frames = std::mem::take(&mut self.frames);
        let archive = package_sequence(frames, self.job.name.clone(), self.job.frame_count)?;
        tracing::info!(sequence = %self.job.name, frames = archive.frame_count(), "job complete");
        self.archive = Some(archive);
        Ok(JobState::Complete)
    }

    /// Steps to completion, calling `on_frame` after each rendered frame.
    pub fn run(mut self, mut on_frame: impl FnMut(&FrameImage)) -> Result<JobOutcome, JobError> {
        loop {
            let state = self.step()?.clone();
            match state {
                JobState::Rendering { .. } | JobState::Packaging => {
                    if let Some(frame) = self.frames.last() {
                        on_frame(frame);
                    }
                }
                JobState::Complete => {
                    return match self.archive.take() {
                        Some(archive) => Ok(JobOutcome::Complete(archive)),
                        None => Err(JobError::IncompleteSequence {
                            reason: "job completed without an archive".to_string(),
                        }),
                    };
                }
                JobState::Cancelled => return Ok(JobOutcome::Cancelled),
                JobState::Failed(reason) => {
                    return Err(JobError::IncompleteSequence {
                        reason: format!("run resumed after failure: {reason}"),
                    })
                }
                JobState::Idle | JobState::ModelLoaded | JobState::Centered => {}
            }
        }
    }

    pub fn into_archive(self) -> Option<SequenceArchive> {
        self.archive
    }
}
