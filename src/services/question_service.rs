//! Question bank administration and the filter catalogue the session
//! creation UI offers.

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::question_dto::{
    CreateQuestionRequest, ListQuestionsQuery, QuestionListResponse, UpdateQuestionRequest,
};
use crate::dto::session_dto::AvailableFiltersResponse;
use crate::error::{Error, Result};
use crate::models::question::{Question, QuestionType};
use crate::services::selector_service::SelectionAlgorithm;

#[derive(Clone)]
pub struct QuestionService {
    pool: PgPool,
}

impl QuestionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_question(&self, req: CreateQuestionRequest) -> Result<Question> {
        let question_type = QuestionType::parse(&req.question_type)?;
        Self::check_answer_key(question_type, &req.correct_answer, req.options.as_deref())?;

        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (
                question_type, category, subcategory, difficulty, content,
                options, correct_answer, explanation, hints, tags, companies,
                max_score, numeric_tolerance, is_premium
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(question_type.as_str())
        .bind(&req.category)
        .bind(&req.subcategory)
        .bind(req.difficulty)
        .bind(&req.content)
        .bind(req.options.as_ref().map(|o| json!(o)))
        .bind(&req.correct_answer)
        .bind(&req.explanation)
        .bind(req.hints.as_ref().map(|h| json!(h)))
        .bind(json!(req.tags))
        .bind(json!(req.companies))
        .bind(req.max_score.unwrap_or(1))
        .bind(req.numeric_tolerance)
        .bind(req.is_premium)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            question_id = %question.id,
            category = %question.category,
            difficulty = question.difficulty,
            "Created question"
        );
        Ok(question)
    }

    pub async fn update_question(
        &self,
        question_id: Uuid,
        req: UpdateQuestionRequest,
    ) -> Result<Question> {
        let existing = self.get_question(question_id).await?;
        let question_type = QuestionType::parse(&existing.question_type)?;

        let correct_answer = req
            .correct_answer
            .unwrap_or_else(|| existing.correct_answer.clone());
        let options = match req.options {
            Some(options) => Some(options),
            None => existing
                .options
                .as_ref()
                .map(|_| existing.option_list()),
        };
        Self::check_answer_key(question_type, &correct_answer, options.as_deref())?;

        let question = sqlx::query_as::<_, Question>(
            r#"
            UPDATE questions
            SET content = COALESCE($2, content),
                options = COALESCE($3, options),
                correct_answer = $4,
                explanation = COALESCE($5, explanation),
                difficulty = COALESCE($6, difficulty),
                is_active = COALESCE($7, is_active),
                is_premium = COALESCE($8, is_premium),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(question_id)
        .bind(&req.content)
        .bind(options.as_ref().map(|o| json!(o)))
        .bind(&correct_answer)
        .bind(&req.explanation)
        .bind(req.difficulty)
        .bind(req.is_active)
        .bind(req.is_premium)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(question_id = %question_id, "Updated question");
        Ok(question)
    }

    pub async fn get_question(&self, question_id: Uuid) -> Result<Question> {
        sqlx::query_as::<_, Question>(r#"SELECT * FROM questions WHERE id = $1"#)
            .bind(question_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::QuestionNotFound(format!("Question {} not found", question_id)))
    }

    pub async fn list_questions(&self, query: &ListQuestionsQuery) -> Result<QuestionListResponse> {
        let skip = query.skip.unwrap_or(0).max(0);
        let limit = query.limit.unwrap_or(20).clamp(1, 100);

        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT * FROM questions
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::int2 IS NULL OR difficulty = $2)
              AND ($3::text IS NULL OR question_type = $3)
              AND ($4::bool IS NULL OR is_active = $4)
            ORDER BY created_at DESC, id DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(query.category.as_deref())
        .bind(query.difficulty)
        .bind(query.question_type.as_deref())
        .bind(query.is_active)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM questions
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::int2 IS NULL OR difficulty = $2)
              AND ($3::text IS NULL OR question_type = $3)
              AND ($4::bool IS NULL OR is_active = $4)
            "#,
        )
        .bind(query.category.as_deref())
        .bind(query.difficulty)
        .bind(query.question_type.as_deref())
        .bind(query.is_active)
        .fetch_one(&self.pool)
        .await?;

        Ok(QuestionListResponse {
            questions,
            total,
            skip,
            limit,
        })
    }

    /// Distinct filter values over the active bank, for the session
    /// creation form.
    pub async fn available_filters(&self) -> Result<AvailableFiltersResponse> {
        let categories: Vec<String> = sqlx::query_scalar(
            r#"SELECT DISTINCT category FROM questions WHERE is_active ORDER BY category"#,
        )
        .fetch_all(&self.pool)
        .await?;

        let tags: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT tag FROM questions, jsonb_array_elements_text(tags) AS tag
            WHERE is_active
            ORDER BY tag
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let companies: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT company
            FROM questions, jsonb_array_elements_text(companies) AS company
            WHERE is_active
            ORDER BY company
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let difficulty_levels: Vec<i16> = sqlx::query_scalar(
            r#"SELECT DISTINCT difficulty FROM questions WHERE is_active ORDER BY difficulty"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(AvailableFiltersResponse {
            categories,
            tags,
            companies,
            difficulty_levels,
            question_types: QuestionType::all().iter().map(|s| s.to_string()).collect(),
            algorithms: SelectionAlgorithm::all().iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Reject answer keys the evaluator would later fail on, so broken
    /// content never reaches a session snapshot.
    fn check_answer_key(
        question_type: QuestionType,
        correct_answer: &str,
        options: Option<&[String]>,
    ) -> Result<()> {
        match question_type {
            QuestionType::MultipleChoice => {
                let options = options.unwrap_or(&[]);
                if options.len() < 2 {
                    return Err(Error::BadRequest(
                        "Multiple choice questions need at least two options".to_string(),
                    ));
                }
                if !options.iter().any(|o| o == correct_answer) {
                    return Err(Error::BadRequest(
                        "Correct answer must be one of the options".to_string(),
                    ));
                }
            }
            QuestionType::TrueFalse => {
                let key = correct_answer.trim().to_ascii_lowercase();
                if key != "true" && key != "false" {
                    return Err(Error::BadRequest(
                        "True/false answer key must be 'true' or 'false'".to_string(),
                    ));
                }
            }
            QuestionType::Numeric => {
                if correct_answer.trim().parse::<f64>().is_err() {
                    return Err(Error::BadRequest(
                        "Numeric answer key must parse as a number".to_string(),
                    ));
                }
            }
            QuestionType::FillBlank => {
                if correct_answer.trim().is_empty() {
                    return Err(Error::BadRequest(
                        "Answer key must not be blank".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_choice_key_must_be_an_option() {
        let options = vec!["1".to_string(), "2".to_string()];
        assert!(QuestionService::check_answer_key(
            QuestionType::MultipleChoice,
            "2",
            Some(&options)
        )
        .is_ok());
        assert!(QuestionService::check_answer_key(
            QuestionType::MultipleChoice,
            "3",
            Some(&options)
        )
        .is_err());
        assert!(
            QuestionService::check_answer_key(QuestionType::MultipleChoice, "1", None).is_err()
        );
    }

    #[test]
    fn true_false_key_is_boolean() {
        assert!(QuestionService::check_answer_key(QuestionType::TrueFalse, "True", None).is_ok());
        assert!(QuestionService::check_answer_key(QuestionType::TrueFalse, "yes", None).is_err());
    }

    #[test]
    fn numeric_key_parses() {
        assert!(QuestionService::check_answer_key(QuestionType::Numeric, "3.14", None).is_ok());
        assert!(QuestionService::check_answer_key(QuestionType::Numeric, "pi", None).is_err());
    }
}
