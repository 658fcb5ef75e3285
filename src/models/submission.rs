use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Submission lifecycle. Aptitude questions are scored synchronously, so the
/// normal path is `submitted → evaluated` in one write; `evaluating` exists
/// for future question types with asynchronous grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    Evaluating,
    Evaluated,
    Failed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Evaluating => "evaluating",
            SubmissionStatus::Evaluated => "evaluated",
            SubmissionStatus::Failed => "failed",
        }
    }
}

/// One evaluated answer event. A session owns its submissions; deleting the
/// session cascades here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Submission {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question_id: Uuid,
    pub user_id: Uuid,
    pub user_answer: String,
    pub is_correct: bool,
    pub score: Decimal,
    pub max_score: Decimal,
    pub time_taken_seconds: i32,
    pub over_time_limit: bool,
    pub status: String,
    pub feedback: Option<String>,
    pub category: String,
    pub difficulty: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
