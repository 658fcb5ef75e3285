use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Session is terminated: {0}")]
    SessionTerminated(String),

    #[error("Session is paused: {0}")]
    SessionPaused(String),

    #[error("Out of sequence submission: {0}")]
    OutOfSequenceSubmission(String),

    #[error("Question not found: {0}")]
    QuestionNotFound(String),

    #[error("Insufficient question pool: {0}")]
    InsufficientQuestionPool(String),

    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable kind, paired with the message in responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::BadRequest(_) => "bad_request",
            Error::Unauthorized(_) => "unauthorized",
            Error::NotFound(_) => "not_found",
            Error::InvalidStateTransition(_) => "invalid_state_transition",
            Error::SessionTerminated(_) => "session_terminated",
            Error::SessionPaused(_) => "session_paused",
            Error::OutOfSequenceSubmission(_) => "out_of_sequence_submission",
            Error::QuestionNotFound(_) => "question_not_found",
            Error::InsufficientQuestionPool(_) => "insufficient_question_pool",
            Error::EvaluationFailed(_) => "evaluation_failed",
            Error::Database(_) => "database_error",
            Error::Validation(_) => "validation_error",
            Error::Json(_) => "json_error",
            Error::Anyhow(_) => "internal_error",
            Error::Internal(_) => "internal_error",
            Error::Io(_) => "io_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let kind = self.kind();
        let (status, error_message) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::Unauthorized(msg) => (StatusCode::FORBIDDEN, msg),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::InvalidStateTransition(msg) => (StatusCode::CONFLICT, msg),
            Error::SessionTerminated(msg) => (StatusCode::CONFLICT, msg),
            Error::SessionPaused(msg) => (StatusCode::CONFLICT, msg),
            Error::OutOfSequenceSubmission(msg) => (StatusCode::CONFLICT, msg),
            Error::QuestionNotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::InsufficientQuestionPool(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            Error::EvaluationFailed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Error::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Error::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            Error::Anyhow(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred".to_string(),
            ),
        };

        let body = Json(json!({ "error": kind, "message": error_message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}
