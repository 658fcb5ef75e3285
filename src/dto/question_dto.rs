use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub question_type: String,
    #[validate(length(min = 1, max = 128))]
    pub category: String,
    pub subcategory: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub difficulty: i16,
    #[validate(length(min = 1))]
    pub content: String,
    pub options: Option<Vec<String>>,
    #[validate(length(min = 1))]
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub hints: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub companies: Vec<String>,
    #[validate(range(min = 1))]
    pub max_score: Option<i32>,
    pub numeric_tolerance: Option<f64>,
    #[serde(default)]
    pub is_premium: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    pub content: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<String>,
    pub explanation: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub difficulty: Option<i16>,
    pub is_active: Option<bool>,
    pub is_premium: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListQuestionsQuery {
    #[serde(default)]
    pub skip: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub difficulty: Option<i16>,
    #[serde(default)]
    pub question_type: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Bank question as returned to administrators (answer key included).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionListResponse {
    pub questions: Vec<crate::models::question::Question>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuestionResponse {
    pub id: Uuid,
    pub category: String,
    pub difficulty: i16,
}
