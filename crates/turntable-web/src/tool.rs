//! Browser-independent state of the sequence tool.

use turntable_core::UserOffset;
use turntable_protocol::{ClientMsg, ServerMsg};

const LOG_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct ControlsView {
    pub user_offset: UserOffset,
    pub brightness: f32,
    pub material: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum JobView {
    #[default]
    Idle,
    Running {
        job_id: u64,
        sequence: String,
        done: u32,
        total: u32,
    },
    Complete {
        sequence: String,
        archive_url: String,
    },
    Failed {
        reason: String,
    },
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct ToolState {
    pub frame_count: u32,
    pub controls: Option<ControlsView>,
    pub job: JobView,
    pub log: Vec<String>,
}

impl ToolState {
    pub fn apply(&mut self, msg: ServerMsg) {
        match msg {
            ServerMsg::HelloAck { frame_count } => self.frame_count = frame_count,
            ServerMsg::Log { text } => self.push_log(text),
            ServerMsg::Controls {
                user_offset,
                brightness,
                material,
            } => {
                self.controls = Some(ControlsView {
                    user_offset,
                    brightness,
                    material,
                })
            }
            ServerMsg::JobAccepted {
                job_id,
                sequence,
                frame_count,
            } => {
                self.job = JobView::Running {
                    job_id,
                    sequence,
                    done: 0,
                    total: frame_count,
                }
            }
            ServerMsg::JobRejected { reason } => self.push_log(format!("not started: {reason}")),
            ServerMsg::FrameRendered { job_id, index, .. } => {
                if let JobView::Running {
                    job_id: running,
                    done,
                    ..
                } = &mut self.job
                {
                    if *running == job_id {
                        *done = index + 1;
                    }
                }
            }
            ServerMsg::JobComplete {
                job_id,
                sequence,
                archive_url,
                ..
            } => {
                if self.is_running(job_id) {
                    self.job = JobView::Complete {
                        sequence,
                        archive_url,
                    };
                }
            }
            ServerMsg::JobFailed {
                job_id,
                reason,
                internal,
            } => {
                if self.is_running(job_id) {
                    let reason = if internal {
                        format!("internal error, please report: {reason}")
                    } else {
                        reason
                    };
                    self.push_log(reason.clone());
                    self.job = JobView::Failed { reason };
                }
            }
            ServerMsg::JobCancelled { job_id } => {
                if self.is_running(job_id) {
                    self.job = JobView::Cancelled;
                }
            }
        }
    }

    fn is_running(&self, id: u64) -> bool {
        matches!(self.job, JobView::Running { job_id, .. } if job_id == id)
    }

    fn push_log(&mut self, line: String) {
        if self.log.len() == LOG_LIMIT {
            self.log.remove(0);
        }
        self.log.push(line);
    }

    pub fn running_job(&self) -> Option<u64> {
        match self.job {
            JobView::Running { job_id, .. } => Some(job_id),
            _ => None,
        }
    }

    /// Swatches and Generate are disabled while a sequence renders.
    pub fn controls_locked(&self) -> bool {
        self.running_job().is_some()
    }

    pub fn status_line(&self) -> String {
        match &self.job {
            JobView::Idle => "ready".to_string(),
            JobView::Running {
                sequence,
                done,
                total,
                ..
            } => format!("{sequence}: {done}/{total} frames"),
            JobView::Complete { sequence, .. } => format!("{sequence} ready to download"),
            JobView::Failed { reason } => format!("failed: {reason}"),
            JobView::Cancelled => "cancelled, nothing was saved".to_string(),
        }
    }
}

pub fn encode(msg: &ClientMsg) -> Option<String> {
    serde_json::to_string(msg).ok()
}

pub fn decode(text: &str) -> Option<ServerMsg> {
    serde_json::from_str(text).ok()
}

/// WebSocket endpoint for a page served from `protocol//hostname:port`.
/// A dev server on another local port talks to the render server on 8080.
pub fn ws_url(protocol: &str, hostname: &str, port: &str) -> String {
    let local = hostname == "localhost" || hostname == "127.0.0.1";
    let host = if port == "8080" || !local {
        if port.is_empty() {
            hostname.to_string()
        } else {
            format!("{hostname}:{port}")
        }
    } else {
        format!("{hostname}:8080")
    };
    let scheme = if protocol == "https:" { "wss" } else { "ws" };
    format!("{scheme}://{host}/ws")
}

/// `nonce` defeats the browser cache after a control change.
pub fn preview_url(angle_deg: f32, nonce: u32) -> String {
    format!("/api/preview?angle={angle_deg}&v={nonce}")
}
