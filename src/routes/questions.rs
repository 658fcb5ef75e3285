use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::question_dto::{
        CreateQuestionRequest, CreateQuestionResponse, ListQuestionsQuery, UpdateQuestionRequest,
    },
    error::Result,
    AppState,
};

#[axum::debug_handler]
pub async fn create_question(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let question = state.question_service.create_question(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateQuestionResponse {
            id: question.id,
            category: question.category,
            difficulty: question.difficulty,
        }),
    ))
}

#[axum::debug_handler]
pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let question = state.question_service.update_question(id, payload).await?;
    Ok(Json(question))
}

#[axum::debug_handler]
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let question = state.question_service.get_question(id).await?;
    Ok(Json(question))
}

#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<ListQuestionsQuery>,
) -> Result<impl IntoResponse> {
    let questions = state.question_service.list_questions(&query).await?;
    Ok(Json(questions))
}
