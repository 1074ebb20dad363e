use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::Ordering;

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use turntable_core::UserOffset;
use turntable_export::{ExportError, SequenceArchive};
use turntable_job::{CancelToken, JobError, JobOutcome, JobRun};
use turntable_protocol::{ClientMsg, ServerMsg};

use crate::app::{ActiveJob, AppState};

/// A prepared job waiting for the worker. It already holds the render lease.
pub struct QueuedJob {
    pub id: u64,
    pub run: JobRun,
    pub respond_to: mpsc::Sender<ServerMsg>,
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMsg>(64);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_tx.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    let frame_count = state.stage.lock().await.config().frame_count;
    let _ = out_tx.send(ServerMsg::HelloAck { frame_count }).await;
    send_controls(&state, &out_tx).await;

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMsg>(&text) {
                Ok(client_msg) => dispatch(&state, client_msg, &out_tx).await,
                Err(_) => log(&out_tx, format!("unrecognized payload: {text}")).await,
            },
            Message::Binary(_) => log(&out_tx, "binary message ignored").await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    drop(out_tx);
    let _ = send_task.await;
    warn!("websocket closed");
}

async fn log(out: &mpsc::Sender<ServerMsg>, text: impl Into<String>) {
    let _ = out.send(ServerMsg::Log { text: text.into() }).await;
}

async fn send_controls(state: &AppState, out: &mpsc::Sender<ServerMsg>) {
    let controls = state.stage.lock().await.controls().clone();
    let _ = out
        .send(ServerMsg::Controls {
            user_offset: controls.user_offset,
            brightness: controls.brightness,
            material: controls.material,
        })
        .await;
}

/// Applies one client message. Replies go to `out`.
pub async fn dispatch(state: &AppState, msg: ClientMsg, out: &mpsc::Sender<ServerMsg>) {
    match msg {
        ClientMsg::Hello { client_version } => {
            let frame_count = state.stage.lock().await.config().frame_count;
            let _ = out.send(ServerMsg::HelloAck { frame_count }).await;
            log(out, format!("client hello: {client_version}")).await;
        }
        ClientMsg::SetUserOffset { dx, dy } => {
            let result = state.stage.lock().await.set_user_offset(UserOffset::new(dx, dy));
            reply_controls(state, out, result).await;
        }
        ClientMsg::SetBrightness { value } => {
            let result = state.stage.lock().await.set_brightness(value);
            reply_controls(state, out, result).await;
        }
        ClientMsg::SelectMaterial { id } => {
            let running = state.active().as_ref().map(|job| job.id);
            if let Some(job_id) = running {
                log(out, format!("material is locked while job {job_id} is rendering")).await;
                send_controls(state, out).await;
                return;
            }
            let result = state.stage.lock().await.select_material(&id).map(|_| ());
            reply_controls(state, out, result).await;
        }
        ClientMsg::Generate { product, ring_type } => generate(state, &product, &ring_type, out).await,
        ClientMsg::Cancel { job_id } => {
            let active = state.active().clone();
            match active {
                Some(job) if job.id == job_id => {
                    job.cancel.cancel();
                    info!(job_id, "cancel requested");
                    log(out, format!("cancelling job {job_id}")).await;
                }
                _ => log(out, format!("job {job_id} is not running")).await,
            }
        }
    }
}

async fn reply_controls(state: &AppState, out: &mpsc::Sender<ServerMsg>, result: Result<(), JobError>) {
    match result {
        Ok(()) => send_controls(state, out).await,
        Err(err) => log(out, err.to_string()).await,
    }
}

async fn generate(state: &AppState, product: &str, ring_type: &str, out: &mpsc::Sender<ServerMsg>) {
    let rejected = |err: JobError| ServerMsg::JobRejected {
        reason: err.to_string(),
    };
    let prepared = state.stage.lock().await.prepare_job(product, ring_type);
    let job = match prepared {
        Ok(job) => job,
        Err(err) => {
            let _ = out.send(rejected(err)).await;
            return;
        }
    };
    let lease = match state.slot.try_lease() {
        Ok(lease) => lease,
        Err(err) => {
            let _ = out.send(rejected(err)).await;
            return;
        }
    };

    let id = state.next_job_id.fetch_add(1, Ordering::Relaxed);
    let cancel = CancelToken::new();
    *state.active() = Some(ActiveJob {
        id,
        cancel: cancel.clone(),
    });
    let sequence = job.name().to_string();
    let frame_count = job.frame_count();
    info!(job_id = id, sequence = %sequence, material = %job.material().id, "job accepted");
    let _ = out
        .send(ServerMsg::JobAccepted {
            job_id: id,
            sequence,
            frame_count,
        })
        .await;

    let queued = QueuedJob {
        id,
        run: JobRun::new(job, lease, cancel),
        respond_to: out.clone(),
    };
    if state.job_tx.send(queued).await.is_err() {
        clear_active(state, id);
        let _ = out
            .send(ServerMsg::JobFailed {
                job_id: id,
                reason: "job queue unavailable".to_string(),
                internal: true,
            })
            .await;
    }
}

fn clear_active(state: &AppState, id: u64) {
    let mut active = state.active();
    if active.as_ref().is_some_and(|job| job.id == id) {
        *active = None;
    }
}

/// Result of a job that did not fail.
#[derive(Debug, PartialEq)]
pub enum Finished {
    Complete {
        sequence: String,
        file_name: String,
        image_count: u32,
    },
    Cancelled,
}

/// Runs a job to the end on the current thread and stores its archive.
pub fn execute(run: JobRun, output_dir: &Path, mut on_frame: impl FnMut(u32)) -> Result<Finished, JobError> {
    match run.run(|frame| on_frame(frame.index))? {
        JobOutcome::Cancelled => Ok(Finished::Cancelled),
        JobOutcome::Complete(archive) => {
            let file_name = store_archive(&archive, output_dir)?;
            Ok(Finished::Complete {
                sequence: archive.name().to_string(),
                file_name,
                image_count: archive.frame_count() as u32,
            })
        }
    }
}

/// Writes next to the final path and renames, so a download never sees a
/// half-written archive.
fn store_archive(archive: &SequenceArchive, output_dir: &Path) -> Result<String, ExportError> {
    std::fs::create_dir_all(output_dir)?;
    let file_name = archive.archive_file_name();
    let partial = output_dir.join(format!("{file_name}.part"));

    let written = File::create(&partial)
        .map_err(ExportError::from)
        .and_then(|file| archive.write_tar(BufWriter::new(file)))
        .and_then(|writer| writer.into_inner().map_err(|err| err.into_error().into()))
        .and_then(|file| file.sync_all().map_err(ExportError::from));
    if let Err(err) = written {
        let _ = std::fs::remove_file(&partial);
        return Err(err);
    }
    std::fs::rename(&partial, output_dir.join(&file_name))?;
    Ok(file_name)
}

/// Frame callback for the render thread. Ticks are dropped when the client's
/// queue is full, so a socket that stops reading never holds the renderer.
fn progress_reporter(job_id: u64, total: u32, out: mpsc::Sender<ServerMsg>) -> impl FnMut(u32) {
    move |index| {
        let tick = ServerMsg::FrameRendered { job_id, index, total };
        if let Err(mpsc::error::TrySendError::Full(_)) = out.try_send(tick) {
            debug!(job_id, frame = index, "client queue full, progress tick dropped");
        }
    }
}

pub async fn job_worker(mut rx: mpsc::Receiver<QueuedJob>, state: AppState) {
    while let Some(job) = rx.recv().await {
        let QueuedJob { id, run, respond_to } = job;
        let total = run.job().frame_count();
        let on_frame = progress_reporter(id, total, respond_to.clone());
        let output_dir = state.output_dir.clone();

        let result = tokio::task::spawn_blocking(move || execute(run, &output_dir, on_frame)).await;
        clear_active(&state, id);

        let msg = match result {
            Ok(Ok(Finished::Complete {
                sequence,
                file_name,
                image_count,
            })) => {
                info!(job_id = id, file = %file_name, "archive ready");
                ServerMsg::JobComplete {
                    job_id: id,
                    sequence,
                    archive_url: format!("/api/archives/{file_name}"),
                    image_count,
                }
            }
            Ok(Ok(Finished::Cancelled)) => ServerMsg::JobCancelled { job_id: id },
            Ok(Err(err)) => ServerMsg::JobFailed {
                job_id: id,
                reason: err.to_string(),
                internal: err.is_internal(),
            },
            Err(err) => {
                warn!(job_id = id, error = %err, "job task aborted");
                ServerMsg::JobFailed {
                    job_id: id,
                    reason: "render task aborted".to_string(),
                    internal: true,
                }
            }
        };
        // A stalled client only delays its own result, not the next job.
        tokio::spawn(async move {
            let _ = respond_to.send(msg).await;
        });
    }
}
