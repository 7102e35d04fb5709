use crate::infra::{AppState, KioskState};
use academy_desk::error::AppError;
use academy_desk::intake::{InputMode, IntakeBackend, IntakeReport, IntakeSnapshot};
use academy_desk::notifications::{NotificationJob, NotificationTransport};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct InputRequest {
    pub(crate) value: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SubmitRequest {
    #[serde(default)]
    pub(crate) code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModeRequest {
    pub(crate) mode: InputMode,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotificationRequest {
    pub(crate) jobs: Vec<NotificationJob>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BoardView {
    #[serde(flatten)]
    pub(crate) snapshot: IntakeSnapshot,
    pub(crate) summary_generation: u64,
}

pub(crate) fn kiosk_router<B, T>(state: Arc<KioskState<B, T>>) -> Router
where
    B: IntakeBackend + 'static,
    T: NotificationTransport + 'static,
{
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/intake/:channel/input", post(input_handler::<B, T>))
        .route("/api/v1/intake/:channel/submit", post(submit_handler::<B, T>))
        .route("/api/v1/intake/:channel/mode", put(mode_handler::<B, T>))
        .route("/api/v1/intake/:channel/board", get(board_handler::<B, T>))
        .route("/api/v1/notifications", post(notify_handler::<B, T>))
        .with_state(state)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn report_response(report: IntakeReport) -> Response {
    let status = match report {
        IntakeReport::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::OK,
    };
    (status, Json(report)).into_response()
}

pub(crate) async fn input_handler<B, T>(
    State(state): State<Arc<KioskState<B, T>>>,
    Path(channel): Path<String>,
    Json(request): Json<InputRequest>,
) -> Result<Response, AppError>
where
    B: IntakeBackend + 'static,
    T: NotificationTransport + 'static,
{
    let coordinator = state.coordinator(&channel)?;
    let ack = coordinator.observe_input(request.value);
    let status = if ack.settling { "settling" } else { "pending" };
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": status, "buffer_len": ack.buffer_len })),
    )
        .into_response())
}

pub(crate) async fn submit_handler<B, T>(
    State(state): State<Arc<KioskState<B, T>>>,
    Path(channel): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Result<Response, AppError>
where
    B: IntakeBackend + 'static,
    T: NotificationTransport + 'static,
{
    let coordinator = state.coordinator(&channel)?;
    let report = match request.code {
        Some(code) => coordinator.submit(&code).await,
        None => coordinator.submit_buffer().await,
    };
    Ok(report_response(report))
}

pub(crate) async fn mode_handler<B, T>(
    State(state): State<Arc<KioskState<B, T>>>,
    Path(channel): Path<String>,
    Json(request): Json<ModeRequest>,
) -> Result<Json<IntakeSnapshot>, AppError>
where
    B: IntakeBackend + 'static,
    T: NotificationTransport + 'static,
{
    let coordinator = state.coordinator(&channel)?;
    coordinator.set_mode(request.mode);
    Ok(Json(coordinator.snapshot()))
}

pub(crate) async fn board_handler<B, T>(
    State(state): State<Arc<KioskState<B, T>>>,
    Path(channel): Path<String>,
) -> Result<Json<BoardView>, AppError>
where
    B: IntakeBackend + 'static,
    T: NotificationTransport + 'static,
{
    let coordinator = state.coordinator(&channel)?;
    Ok(Json(BoardView {
        snapshot: coordinator.snapshot(),
        summary_generation: state.summary.current(),
    }))
}

pub(crate) async fn notify_handler<B, T>(
    State(state): State<Arc<KioskState<B, T>>>,
    Json(request): Json<NotificationRequest>,
) -> Response
where
    B: IntakeBackend + 'static,
    T: NotificationTransport + 'static,
{
    if request.jobs.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "no notification jobs supplied" })),
        )
            .into_response();
    }

    let report = state.notifications.send_batch(request.jobs).await;
    let status = if report.all_delivered() {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(report)).into_response()
}
