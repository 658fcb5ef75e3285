use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use crate::models::question::{QuestionSnapshot, QuestionType};
use crate::models::session::TestSession;

fn default_test_type() -> String {
    "aptitude".to_string()
}

fn default_algorithm() -> String {
    "random".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[serde(default = "default_test_type")]
    pub test_type: String,
    #[validate(range(min = 1, max = 200))]
    pub total_questions: i32,
    #[validate(range(min = 1))]
    pub time_limit_seconds: Option<i32>,
    #[validate(range(min = 1))]
    pub time_per_question_seconds: Option<i32>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub difficulties: Option<Vec<i16>>,
    #[serde(default)]
    pub companies: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default = "default_algorithm")]
    pub selection_algorithm: String,
    #[serde(default)]
    pub randomize_questions: bool,
    #[serde(default)]
    pub randomize_options: bool,
    #[serde(default)]
    pub allow_review: bool,
    #[serde(default = "default_true")]
    pub show_results: bool,
    #[validate(range(min = 0.0, max = 100.0))]
    pub passing_score: Option<f64>,
    #[serde(default)]
    pub negative_marking: bool,
    /// Fraction of a question's value deducted for a wrong answer.
    #[validate(range(min = 0.0, max = 1.0))]
    pub negative_marking_ratio: Option<f64>,
    /// Difficulty level ("1".."5") to question count; must sum to
    /// `total_questions` when `selection_algorithm` is `difficulty_based`.
    #[serde(default)]
    pub difficulty_distribution: Option<BTreeMap<String, i32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test_type: String,
    pub status: String,
    pub total_questions: i32,
    pub current_question_index: i32,
    pub time_limit_seconds: Option<i32>,
    pub time_per_question_seconds: Option<i32>,
    pub selection_algorithm: String,
    pub allow_review: bool,
    pub show_results: bool,
    pub passing_score: Option<f64>,
    pub negative_marking: bool,
    pub negative_marking_ratio: f64,
    pub score: f64,
    pub max_score: f64,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
    pub skipped_answers: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub total_pause_seconds: i64,
    pub created_at: DateTime<Utc>,
}

impl From<TestSession> for SessionResponse {
    fn from(s: TestSession) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            test_type: s.test_type,
            status: s.status,
            total_questions: s.total_questions,
            current_question_index: s.current_question_index,
            time_limit_seconds: s.time_limit_seconds,
            time_per_question_seconds: s.time_per_question_seconds,
            selection_algorithm: s.selection_algorithm,
            allow_review: s.allow_review,
            show_results: s.show_results,
            passing_score: s.passing_score.and_then(|d| d.to_f64()),
            negative_marking: s.negative_marking,
            negative_marking_ratio: s.negative_marking_ratio.to_f64().unwrap_or(0.0),
            score: s.score.to_f64().unwrap_or(0.0),
            max_score: s.max_score.to_f64().unwrap_or(0.0),
            correct_answers: s.correct_answers,
            incorrect_answers: s.incorrect_answers,
            skipped_answers: s.skipped_answers,
            started_at: s.started_at,
            ended_at: s.ended_at,
            paused_at: s.paused_at,
            total_pause_seconds: s.total_pause_seconds,
            created_at: s.created_at,
        }
    }
}

/// Question as served to the client: no answer key, no explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServedQuestion {
    pub id: Uuid,
    pub question_type: QuestionType,
    pub category: String,
    pub subcategory: Option<String>,
    pub difficulty: i16,
    pub content: String,
    pub options: Option<Vec<String>>,
    pub hints: Option<Vec<String>>,
    pub max_score: i32,
    pub index: i32,
    pub total_questions: i32,
}

impl ServedQuestion {
    pub fn from_snapshot(q: QuestionSnapshot, index: i32, total_questions: i32) -> Self {
        Self {
            id: q.id,
            question_type: q.question_type,
            category: q.category,
            subcategory: q.subcategory,
            difficulty: q.difficulty,
            content: q.content,
            options: q.options,
            hints: q.hints,
            max_score: q.max_score,
            index,
            total_questions,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    pub question_id: Uuid,
    #[validate(length(min = 1, max = 4096))]
    pub user_answer: String,
    /// Client-measured seconds spent on this question.
    #[validate(range(min = 0))]
    pub time_taken: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub submission_id: Uuid,
    pub is_correct: bool,
    pub score: f64,
    pub max_score: f64,
    pub is_session_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub time_taken: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionProgressResponse {
    pub session_id: Uuid,
    pub status: String,
    pub current_question_index: i32,
    pub total_questions: i32,
    pub answered: i32,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
    pub score: f64,
    pub max_score: f64,
    pub elapsed_seconds: i64,
    pub remaining_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    pub total: i32,
    pub correct: i32,
    pub accuracy: f64,
    pub average_time: f64,
    pub average_score: f64,
    pub total_time: i64,
    pub total_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAnalysis {
    pub total_time: i64,
    pub average_time: f64,
    pub min_time: i64,
    pub max_time: i64,
    /// `1 − active_time / time_limit`, clamped to `[0, 1]`; null when the
    /// session has no overall limit.
    pub time_efficiency: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionDetail {
    pub question_id: Uuid,
    pub user_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub score: f64,
    pub max_score: f64,
    pub time_taken_seconds: i32,
    pub over_time_limit: bool,
    pub category: String,
    pub difficulty: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResultsResponse {
    pub session_id: Uuid,
    pub status: String,
    pub final_score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub passed: Option<bool>,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
    pub skipped_answers: i32,
    pub category_performance: BTreeMap<String, BucketStats>,
    pub difficulty_performance: BTreeMap<String, BucketStats>,
    pub time_analysis: TimeAnalysis,
    pub detailed_submissions: Vec<SubmissionDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListSessionsQuery {
    #[serde(default)]
    pub skip: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub test_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionResponse>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableFiltersResponse {
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub companies: Vec<String>,
    pub difficulty_levels: Vec<i16>,
    pub question_types: Vec<String>,
    pub algorithms: Vec<String>,
}
