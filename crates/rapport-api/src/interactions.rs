use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, warn};

use rapport_types::api::{HealthResponse, ReactionRequest, ReportRequest};
use rapport_types::{Direction, InteractionKind, InteractionRecord};

use crate::error::ApiError;
use crate::state::AppState;

const INVALID_BODY: &str = "Invalid request body";

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(req)| req).map_err(|e| {
        debug!("Rejected request body: {}", e);
        ApiError::BadRequest(INVALID_BODY)
    })
}

async fn save(
    state: &AppState,
    record: InteractionRecord,
) -> Result<(StatusCode, Json<InteractionRecord>), ApiError> {
    let failure = match record.kind {
        InteractionKind::Report => "Failed to save report",
        InteractionKind::Like => "Failed to save like",
        InteractionKind::Dislike => "Failed to save dislike",
        InteractionKind::Unspecified => "Failed to save interaction",
    };

    state
        .store
        .append(record.clone(), &state.op_context())
        .await
        .map_err(|_| ApiError::Internal(failure))?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn report(
    State(state): State<AppState>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = body(payload)?;
    if req.actor_id.is_empty() || req.target_id.is_empty() || req.message.is_empty() {
        return Err(ApiError::BadRequest(
            "Missing required fields: actorId, targetId, message",
        ));
    }

    let record = InteractionRecord::report(
        req.actor_id,
        req.target_id,
        req.message,
        state.clock.now_nanos(),
    );
    save(&state, record).await
}

fn reaction(
    state: &AppState,
    payload: Result<Json<ReactionRequest>, JsonRejection>,
    kind: InteractionKind,
) -> Result<InteractionRecord, ApiError> {
    let req = body(payload)?;
    if req.actor_id.is_empty() || req.target_id.is_empty() {
        return Err(ApiError::BadRequest("Missing required fields: actorId, targetId"));
    }

    Ok(InteractionRecord {
        actor_id: req.actor_id,
        target_id: req.target_id,
        kind,
        message: String::new(),
        timestamp: state.clock.now_nanos(),
    })
}

pub async fn like(
    State(state): State<AppState>,
    payload: Result<Json<ReactionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let record = reaction(&state, payload, InteractionKind::Like)?;
    save(&state, record).await
}

pub async fn dislike(
    State(state): State<AppState>,
    payload: Result<Json<ReactionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let record = reaction(&state, payload, InteractionKind::Dislike)?;
    save(&state, record).await
}

pub async fn user_interactions(
    State(state): State<AppState>,
    Path((user_id, direction)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let direction: Direction = direction.parse().map_err(|e| {
        warn!("{}", e);
        ApiError::NotFound("Not found")
    })?;

    let records = state
        .store
        .interactions_for(&user_id, direction, &state.op_context())
        .await
        .map_err(|_| ApiError::Internal("Failed to retrieve interactions"))?;

    Ok(Json(records))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}
