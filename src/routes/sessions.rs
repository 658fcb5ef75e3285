use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::session_dto::{
        CreateSessionRequest, ListSessionsQuery, SessionResponse, SubmitAnswerRequest,
    },
    error::Result,
    middleware::auth::Claims,
    AppState,
};

#[axum::debug_handler]
pub async fn create_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let user_id = claims.user_id()?;
    let session = state
        .session_service
        .create_session(user_id, payload, &state.selector, &state.analytics_service)
        .await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

#[axum::debug_handler]
pub async fn start_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let session = state
        .session_service
        .start_session(id, claims.user_id()?)
        .await?;
    Ok(Json(SessionResponse::from(session)))
}

#[axum::debug_handler]
pub async fn current_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let question = state
        .session_service
        .current_question(id, claims.user_id()?)
        .await?;
    Ok(Json(question))
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let response = state
        .session_service
        .submit_answer(id, claims.user_id()?, payload)
        .await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn pause_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let session = state
        .session_service
        .pause_session(id, claims.user_id()?)
        .await?;
    Ok(Json(SessionResponse::from(session)))
}

#[axum::debug_handler]
pub async fn resume_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let session = state
        .session_service
        .resume_session(id, claims.user_id()?)
        .await?;
    Ok(Json(SessionResponse::from(session)))
}

#[axum::debug_handler]
pub async fn session_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let progress = state.session_service.progress(id, claims.user_id()?).await?;
    Ok(Json(progress))
}

#[axum::debug_handler]
pub async fn session_results(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let results = state.session_service.results(id, claims.user_id()?).await?;
    Ok(Json(results))
}

#[axum::debug_handler]
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<impl IntoResponse> {
    let sessions = state
        .session_service
        .list_sessions(claims.user_id()?, &query)
        .await?;
    Ok(Json(sessions))
}

#[axum::debug_handler]
pub async fn available_filters(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let filters = state.question_service.available_filters().await?;
    Ok(Json(filters))
}

/// Admin sweep: move sessions idle beyond the configured grace window to
/// `abandoned`.
#[axum::debug_handler]
pub async fn abandon_idle(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let abandoned = state
        .session_service
        .abandon_idle(state.config.abandon_after_minutes)
        .await?;
    Ok(Json(serde_json::json!({ "abandoned": abandoned })))
}
