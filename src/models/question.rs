use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Objective question types the evaluator knows how to score. Each variant
/// has its own correctness check; see `services::evaluator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    FillBlank,
    Numeric,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::FillBlank => "fill_blank",
            QuestionType::Numeric => "numeric",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "true_false" => Ok(QuestionType::TrueFalse),
            "fill_blank" => Ok(QuestionType::FillBlank),
            "numeric" => Ok(QuestionType::Numeric),
            other => Err(Error::BadRequest(format!("Unknown question type: {}", other))),
        }
    }

    pub fn all() -> &'static [&'static str] {
        &["multiple_choice", "true_false", "fill_blank", "numeric"]
    }
}

/// Bank row. Owned by the content repository; the session engine reads it
/// at selection time and never mutates it beyond the usage counters.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub question_type: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub difficulty: i16,
    pub content: String,
    pub options: Option<JsonValue>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub hints: Option<JsonValue>,
    pub tags: JsonValue,
    pub companies: JsonValue,
    pub max_score: i32,
    pub numeric_tolerance: Option<f64>,
    pub is_active: bool,
    pub is_premium: bool,
    pub times_used: i32,
    pub times_correct: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    pub fn option_list(&self) -> Vec<String> {
        self.options
            .as_ref()
            .and_then(|v| serde_json::from_value::<Vec<String>>(v.clone()).ok())
            .unwrap_or_default()
    }
}

/// Frozen per-session copy of a question, stored on the session row as
/// JSONB. Option order is fixed here (shuffled once when
/// `randomize_options` is set), so repeated serves are stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSnapshot {
    pub id: Uuid,
    pub question_type: QuestionType,
    pub category: String,
    pub subcategory: Option<String>,
    pub difficulty: i16,
    pub content: String,
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub hints: Option<Vec<String>>,
    pub max_score: i32,
    pub numeric_tolerance: Option<f64>,
}

impl QuestionSnapshot {
    pub fn from_question(q: &Question) -> Result<Self> {
        let options = match &q.options {
            Some(v) => Some(serde_json::from_value::<Vec<String>>(v.clone())?),
            None => None,
        };
        let hints = match &q.hints {
            Some(v) => serde_json::from_value::<Option<Vec<String>>>(v.clone())?,
            None => None,
        };
        Ok(Self {
            id: q.id,
            question_type: QuestionType::parse(&q.question_type)?,
            category: q.category.clone(),
            subcategory: q.subcategory.clone(),
            difficulty: q.difficulty,
            content: q.content.clone(),
            options,
            correct_answer: q.correct_answer.clone(),
            explanation: q.explanation.clone(),
            hints,
            max_score: q.max_score.max(1),
            numeric_tolerance: q.numeric_tolerance,
        })
    }
}
