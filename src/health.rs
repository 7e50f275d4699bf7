//! Minimal HTTP status endpoint for the process supervisor.
//!
//! Serves a one-page status view at `/` and a bare `ok` at `/healthz`.
//! No contract beyond "the process answers" is promised.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;

use crate::jobs::JobStore;

#[derive(Clone)]
struct HealthState {
    started: Instant,
    jobs: Arc<JobStore>,
}

/// Runs the health server until the process exits.
pub async fn run_health_server(port: u16, jobs: Arc<JobStore>) -> anyhow::Result<()> {
    let state = HealthState {
        started: Instant::now(),
        jobs,
    };

    let app = Router::new()
        .route("/", get(status_page))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    log::info!("health endpoint listening on port {}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn status_page(State(state): State<HealthState>) -> Html<String> {
    let uptime = state.started.elapsed().as_secs();
    let active = state.jobs.active_count().await;
    Html(render_status_page(uptime, active))
}

fn render_status_page(uptime_secs: u64, active_jobs: usize) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>EpicTube status</title></head>\n<body>\n\
         <h1>🤖 EpicTube is running</h1>\n\
         <p>Uptime: {}h {}m</p>\n\
         <p>Active jobs: {}</p>\n\
         </body>\n</html>\n",
        uptime_secs / 3600,
        (uptime_secs % 3600) / 60,
        active_jobs
    )
}
