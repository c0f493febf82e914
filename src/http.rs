use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::agent::Agent;
use crate::error::CronmeshError;
use crate::scheduler::Job;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(e: CronmeshError) -> (StatusCode, Json<ErrorBody>) {
    let status = match e {
        CronmeshError::JobNotFound(_) => StatusCode::NOT_FOUND,
        CronmeshError::BadSchedule(_, _) | CronmeshError::BadTagExpression(_, _) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: e.to_string(),
        }),
    )
}

/// Serve the HTTP API: membership and job inspection plus job upsert
/// and manual dispatch.
pub async fn run_http(addr: SocketAddr, agent: Arc<Agent>) {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/members", get(list_members_handler))
        .route("/api/jobs", get(list_jobs_handler))
        .route("/api/jobs", post(set_job_handler))
        .route("/api/jobs/:name", delete(delete_job_handler))
        .route("/api/jobs/:name/run", post(run_job_handler))
        .route("/api/jobs/:name/executions", get(list_executions_handler))
        .layer(cors)
        .with_state(agent);

    tracing::info!(addr = %addr, "Starting HTTP API");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind HTTP API");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "HTTP API failed");
    }
}

async fn list_members_handler(State(agent): State<Arc<Agent>>) -> impl IntoResponse {
    Json(agent.view().members())
}

async fn list_jobs_handler(State(agent): State<Arc<Agent>>) -> impl IntoResponse {
    match agent.store().list_jobs().await {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

async fn set_job_handler(
    State(agent): State<Arc<Agent>>,
    Json(job): Json<Job>,
) -> impl IntoResponse {
    let name = job.name.clone();
    match agent.set_job(job).await {
        Ok(()) => (StatusCode::CREATED, Json(serde_json::json!({ "name": name }))).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

async fn delete_job_handler(
    State(agent): State<Arc<Agent>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match agent.delete_job(&name).await {
        Ok(job) => Json(job).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

async fn run_job_handler(
    State(agent): State<Arc<Agent>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match agent.run_job(&name).await {
        Ok(job) => Json(job).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

async fn list_executions_handler(
    State(agent): State<Arc<Agent>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match agent.store().executions(&name).await {
        Ok(executions) => Json(executions).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}
