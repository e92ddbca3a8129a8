//! HTTP surface of the matching daemon.
//!
//! Invoked by the web CRUD layer after uploads complete, and by the
//! operator CLI. Handlers are thin: validate, call the engine or
//! store, shape the response.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use facefind_api::FaceServiceClient;
use facefind_core::MatchReport;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::pipeline::{MatchEngine, PipelineError, RefreshReport};
use crate::store::{MatchRecord, SqliteStore, StoreError};

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchEngine<SqliteStore, FaceServiceClient>>,
    pub store: SqliteStore,
    pub started_at: DateTime<Utc>,
}

/// API error type, mapped onto HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": { "code": code, "message": self.to_string() } })))
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.started_at);
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
    })
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub participant_id: String,
    pub selfie_url: String,
    pub event_id: String,
}

/// POST /match — run the full matching pipeline for one participant.
async fn run_match(
    State(state): State<AppState>,
    Json(req): Json<MatchRequest>,
) -> ApiResult<Json<MatchReport>> {
    require("participant_id", &req.participant_id)?;
    require("selfie_url", &req.selfie_url)?;
    require("event_id", &req.event_id)?;

    let report = state
        .engine
        .run_match(&req.participant_id, &req.selfie_url, &req.event_id)
        .await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct AddPhotoRequest {
    pub event_id: String,
    pub original_url: String,
}

#[derive(Debug, Serialize)]
pub struct AddPhotoResponse {
    pub photo_id: String,
}

/// POST /photos — register an uploaded photo.
async fn add_photo(
    State(state): State<AppState>,
    Json(req): Json<AddPhotoRequest>,
) -> ApiResult<Json<AddPhotoResponse>> {
    require("event_id", &req.event_id)?;
    require("original_url", &req.original_url)?;

    let photo_id = state.store.add_photo(&req.event_id, &req.original_url).await?;
    Ok(Json(AddPhotoResponse { photo_id }))
}

#[derive(Debug, Default, Deserialize)]
pub struct DetectRequest {
    /// Overrides the stored photo URL, e.g. for a freshly signed one.
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub photo_id: String,
    pub face_count: usize,
}

/// POST /photos/{id}/detect — run a detection pass for one photo.
async fn detect_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<String>,
    Json(req): Json<DetectRequest>,
) -> ApiResult<Json<DetectResponse>> {
    let Some(photo) = state.store.get_photo(&photo_id).await? else {
        return Err(ApiError::NotFound(format!("photo {photo_id}")));
    };

    let image_url = req.image_url.unwrap_or(photo.original_url);
    let face_count = state.engine.ingest_photo(&photo.id, &image_url).await?;
    Ok(Json(DetectResponse { photo_id: photo.id, face_count }))
}

/// DELETE /photos/{id} — drop a photo; faces and matches cascade.
async fn delete_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.store.delete_photo(&photo_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("photo {photo_id}")))
    }
}

#[derive(Debug, Deserialize)]
pub struct AddParticipantRequest {
    pub event_id: String,
    pub selfie_url: String,
    #[serde(default)]
    pub contact: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddParticipantResponse {
    pub participant_id: String,
}

/// POST /participants — register a participant who submitted a selfie.
async fn add_participant(
    State(state): State<AppState>,
    Json(req): Json<AddParticipantRequest>,
) -> ApiResult<Json<AddParticipantResponse>> {
    require("event_id", &req.event_id)?;
    require("selfie_url", &req.selfie_url)?;

    let participant_id = state
        .store
        .add_participant(&req.event_id, req.contact.as_deref(), &req.selfie_url)
        .await?;
    Ok(Json(AddParticipantResponse { participant_id }))
}

/// DELETE /participants/{id} — drop a participant and their matches.
async fn delete_participant(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.store.delete_participant(&participant_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("participant {participant_id}")))
    }
}

#[derive(Debug, Serialize)]
pub struct MatchListResponse {
    pub participant_id: String,
    pub matches: Vec<MatchRecord>,
}

/// GET /participants/{id}/matches — persisted matches for a participant.
async fn list_matches(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
) -> ApiResult<Json<MatchListResponse>> {
    if state.store.participant_photo_count(&participant_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("participant {participant_id}")));
    }
    let matches = state.store.matches_for_participant(&participant_id).await?;
    Ok(Json(MatchListResponse { participant_id, matches }))
}

/// POST /events/{id}/refresh — re-detect faces across the event.
async fn refresh_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<RefreshReport>> {
    let report = state.engine.refresh_event(&event_id).await?;
    Ok(Json(report))
}

/// Assemble the daemon's router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/match", post(run_match))
        .route("/photos", post(add_photo))
        .route("/photos/:id/detect", post(detect_photo))
        .route("/photos/:id", delete(delete_photo))
        .route("/participants", post(add_participant))
        .route("/participants/:id", delete(delete_participant))
        .route("/participants/:id/matches", get(list_matches))
        .route("/events/:id/refresh", post(refresh_event))
        .with_state(state)
}
