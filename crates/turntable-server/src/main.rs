mod app;
mod config;
mod ws;

use tokio::sync::mpsc;
use tracing::info;

use crate::app::{router, AppState};
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env()?;
    let (job_tx, job_rx) = mpsc::channel(1);
    let state = AppState::new(&config, job_tx)?;
    tokio::spawn(ws::job_worker(job_rx, state.clone()));

    let app = router(state, &config);
    info!(
        output_dir = %config.output_dir.display(),
        frames = config.pipeline.frame_count,
        resolution = config.pipeline.resolution,
        "listening on http://{}",
        config.addr
    );
    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
