use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use turntable_core::MaterialConfig;
use turntable_export::{ExportError, SequenceName};
use turntable_job::{CancelToken, JobError, ModelInfo, RenderSlot, Stage};
use turntable_protocol::{ErrorBody, ModelSummary};
use turntable_render::{encode_png, RenderError, Renderer};

use crate::config::ServerConfig;
use crate::ws::{ws_handler, QueuedJob};

/// Job currently holding the render slot.
#[derive(Debug, Clone)]
pub struct ActiveJob {
    pub id: u64,
    pub cancel: CancelToken,
}

#[derive(Clone)]
pub struct AppState {
    pub stage: Arc<tokio::sync::Mutex<Stage>>,
    pub slot: RenderSlot,
    pub active: Arc<Mutex<Option<ActiveJob>>>,
    pub job_tx: mpsc::Sender<QueuedJob>,
    pub next_job_id: Arc<AtomicU64>,
    pub output_dir: PathBuf,
}

impl AppState {
    pub fn new(config: &ServerConfig, job_tx: mpsc::Sender<QueuedJob>) -> Result<Self, JobError> {
        let stage = Stage::new(config.pipeline.clone())?;
        let slot = RenderSlot::new(Renderer::new(stage.render_settings()));
        Ok(Self {
            stage: Arc::new(tokio::sync::Mutex::new(stage)),
            slot,
            active: Arc::new(Mutex::new(None)),
            job_tx,
            next_job_id: Arc::new(AtomicU64::new(1)),
            output_dir: config.output_dir.clone(),
        })
    }

    pub fn active(&self) -> MutexGuard<'_, Option<ActiveJob>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let index_file = config.dist_dir.join("index.html");
    Router::new()
        .route(
            "/api/model",
            post(upload_model).layer(DefaultBodyLimit::max(config.max_model_bytes)),
        )
        .route("/api/materials", get(list_materials))
        .route("/api/preview", get(preview))
        .route("/api/archives/:file", get(download_archive))
        .route("/ws", get(ws_handler))
        .fallback_service(
            ServeDir::new(&config.dist_dir)
                .append_index_html_on_directories(true)
                .not_found_service(ServeFile::new(index_file)),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// HTTP status for a pipeline error: user input is 400, contention 409,
/// everything else 500.
pub fn status_for(err: &JobError) -> StatusCode {
    match err {
        JobError::Load(_)
        | JobError::DegenerateModel { .. }
        | JobError::UnknownMaterial(_)
        | JobError::InvalidExposure(_)
        | JobError::InvalidOffset { .. }
        | JobError::InvalidViewport(_)
        | JobError::Export(ExportError::InvalidName(_)) => StatusCode::BAD_REQUEST,
        JobError::Busy | JobError::NoModel => StatusCode::CONFLICT,
        JobError::FrameRender {
            source: RenderError::InvalidExposure { .. },
            ..
        } => StatusCode::BAD_REQUEST,
        JobError::FrameRender { .. }
        | JobError::IncompleteSequence { .. }
        | JobError::Export(_)
        | JobError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn job_error(err: JobError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    api_error(status, err.to_string())
}

fn join_error(err: tokio::task::JoinError) -> ApiError {
    tracing::error!(error = %err, "blocking task failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "render task failed")
}

#[derive(Debug, Deserialize)]
struct ModelQuery {
    name: Option<String>,
}

async fn upload_model(
    State(state): State<AppState>,
    Query(query): Query<ModelQuery>,
    body: Bytes,
) -> Result<Json<ModelSummary>, ApiError> {
    if body.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "model file is empty"));
    }
    let name = query.name.unwrap_or_else(|| "model.glb".to_string());
    let stage = state.stage.clone();
    let info = tokio::task::spawn_blocking(move || stage.blocking_lock().load_model(&name, &body))
        .await
        .map_err(join_error)?
        .map_err(job_error)?;
    Ok(Json(summary(info)))
}

fn summary(info: ModelInfo) -> ModelSummary {
    ModelSummary {
        name: info.name,
        triangles: info.triangles,
        bounds_min: info.bounds.min,
        bounds_max: info.bounds.max,
        centering: info.centering,
    }
}

async fn list_materials(State(state): State<AppState>) -> Json<Vec<MaterialConfig>> {
    Json(state.stage.lock().await.catalog().entries().to_vec())
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    #[serde(default)]
    angle: f32,
}

async fn preview(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> Result<Response, ApiError> {
    if !query.angle.is_finite() {
        return Err(api_error(StatusCode::BAD_REQUEST, "angle must be finite"));
    }
    let mut lease = state.slot.try_lease().map_err(job_error)?;
    let stage = state.stage.clone();
    let png = tokio::task::spawn_blocking(move || {
        let frame = stage.blocking_lock().render_preview(&mut lease, query.angle)?;
        encode_png(&frame).map_err(|source| JobError::FrameRender { frame: 0, source })
    })
    .await
    .map_err(join_error)?
    .map_err(job_error)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// Only `{sequence-name}.tar` files are served.
fn archive_sequence(file: &str) -> Option<SequenceName> {
    SequenceName::parse(file.strip_suffix(".tar")?).ok()
}

async fn download_archive(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let not_found = || api_error(StatusCode::NOT_FOUND, format!("archive `{file}` not found"));
    if archive_sequence(&file).is_none() {
        return Err(not_found());
    }
    let bytes = match tokio::fs::read(state.output_dir.join(&file)).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(err) => {
            tracing::error!(file = %file, error = %err, "archive read failed");
            return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "archive unreadable"));
        }
    };
    let disposition = format!("attachment; filename=\"{file}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/x-tar".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
