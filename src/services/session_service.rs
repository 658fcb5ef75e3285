//! Session store and state machine. Every transition is a short
//! read-modify-write against the session row, serialized per session with
//! `SELECT … FOR UPDATE`, so two concurrent submits can never advance the
//! cursor from the same starting value.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::dto::session_dto::{
    CreateSessionRequest, ListSessionsQuery, ServedQuestion, SessionListResponse,
    SessionProgressResponse, SessionResponse, SessionResultsResponse, SubmitAnswerRequest,
    SubmitAnswerResponse,
};
use crate::error::{Error, Result};
use crate::models::question::QuestionSnapshot;
use crate::models::session::{SessionStatus, TestSession};
use crate::models::submission::{Submission, SubmissionStatus};
use crate::services::analytics_service::AnalyticsService;
use crate::services::selector_service::QuestionSelector;
use crate::services::{evaluator, results, timing};

#[derive(Clone)]
pub struct SessionService {
    pool: PgPool,
}

impl SessionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a session: select and freeze the question sequence, then
    /// persist the row in `created`. Nothing is persisted when the selector
    /// cannot satisfy the request.
    pub async fn create_session(
        &self,
        user_id: Uuid,
        req: CreateSessionRequest,
        selector: &QuestionSelector,
        analytics: &AnalyticsService,
    ) -> Result<TestSession> {
        let questions = selector.select(user_id, &req, analytics).await?;

        let mut snapshots = questions
            .iter()
            .map(QuestionSnapshot::from_question)
            .collect::<Result<Vec<_>>>()?;
        if req.randomize_options {
            let mut rng = rand::thread_rng();
            for snap in &mut snapshots {
                if let Some(options) = snap.options.as_mut() {
                    options.shuffle(&mut rng);
                }
            }
        }

        let question_ids: Vec<Uuid> = snapshots.iter().map(|q| q.id).collect();
        let max_score: i64 = snapshots.iter().map(|q| i64::from(q.max_score)).sum();
        let negative_marking_ratio = if req.negative_marking {
            Decimal::from_f64_retain(req.negative_marking_ratio.unwrap_or(0.25))
                .unwrap_or_default()
        } else {
            Decimal::ZERO
        };
        let passing_score = req.passing_score.and_then(Decimal::from_f64_retain);
        let filters = json!({
            "categories": req.categories,
            "difficulties": req.difficulties,
            "companies": req.companies,
            "tags": req.tags,
        });
        let distribution = req
            .difficulty_distribution
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let session = sqlx::query_as::<_, TestSession>(
            r#"
            INSERT INTO test_sessions (
                user_id, test_type, total_questions, time_limit_seconds,
                time_per_question_seconds, filters, selection_algorithm,
                randomize_questions, randomize_options, allow_review, show_results,
                passing_score, negative_marking, negative_marking_ratio,
                difficulty_distribution, question_ids, questions_snapshot, max_score
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18
            )
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&req.test_type)
        .bind(req.total_questions)
        .bind(req.time_limit_seconds)
        .bind(req.time_per_question_seconds)
        .bind(filters)
        .bind(&req.selection_algorithm)
        .bind(req.randomize_questions)
        .bind(req.randomize_options)
        .bind(req.allow_review)
        .bind(req.show_results)
        .bind(passing_score)
        .bind(req.negative_marking)
        .bind(negative_marking_ratio)
        .bind(distribution)
        .bind(&question_ids)
        .bind(serde_json::to_value(&snapshots)?)
        .bind(Decimal::from(max_score))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            session_id = %session.id,
            user_id = %user_id,
            questions = question_ids.len(),
            algorithm = %session.selection_algorithm,
            "Created test session"
        );
        Ok(session)
    }

    pub async fn start_session(&self, session_id: Uuid, user_id: Uuid) -> Result<TestSession> {
        let mut tx = self.pool.begin().await?;
        let session = Self::lock_owned(&mut tx, session_id, user_id).await?;
        let status = session.session_status()?;
        if status.is_terminal() {
            return Err(Error::SessionTerminated(format!("Session is {}", status)));
        }
        if status != SessionStatus::Created {
            return Err(Error::InvalidStateTransition(format!(
                "Cannot start a session in status {}",
                status
            )));
        }

        let now = Utc::now();
        let updated = sqlx::query_as::<_, TestSession>(
            r#"
            UPDATE test_sessions
            SET status = 'active', started_at = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(session_id = %session_id, "Session started");
        Ok(updated)
    }

    pub async fn pause_session(&self, session_id: Uuid, user_id: Uuid) -> Result<TestSession> {
        let mut tx = self.pool.begin().await?;
        let session = Self::lock_owned(&mut tx, session_id, user_id).await?;
        let (session, expired) = self.expire_if_due(&mut tx, session).await?;
        if expired {
            tx.commit().await?;
            return Err(Error::SessionTerminated("Session has expired".to_string()));
        }
        match session.session_status()? {
            SessionStatus::Active => {}
            status if status.is_terminal() => {
                return Err(Error::SessionTerminated(format!("Session is {}", status)))
            }
            status => {
                return Err(Error::InvalidStateTransition(format!(
                    "Cannot pause a session in status {}",
                    status
                )))
            }
        }

        let updated = sqlx::query_as::<_, TestSession>(
            r#"
            UPDATE test_sessions
            SET status = 'paused', paused_at = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(session_id = %session_id, "Session paused");
        Ok(updated)
    }

    pub async fn resume_session(&self, session_id: Uuid, user_id: Uuid) -> Result<TestSession> {
        let mut tx = self.pool.begin().await?;
        let session = Self::lock_owned(&mut tx, session_id, user_id).await?;
        // A paused session can still expire if the limit was already spent
        // before the pause was recorded.
        let (session, expired) = self.expire_if_due(&mut tx, session).await?;
        if expired {
            tx.commit().await?;
            return Err(Error::SessionTerminated("Session has expired".to_string()));
        }
        match session.session_status()? {
            SessionStatus::Paused => {}
            status if status.is_terminal() => {
                return Err(Error::SessionTerminated(format!("Session is {}", status)))
            }
            status => {
                return Err(Error::InvalidStateTransition(format!(
                    "Cannot resume a session in status {}",
                    status
                )))
            }
        }

        let paused_at = session
            .paused_at
            .ok_or_else(|| Error::Internal("Paused session has no pause timestamp".to_string()))?;
        let now = Utc::now();
        let pause_seconds = (now - paused_at).num_seconds().max(0);

        let updated = sqlx::query_as::<_, TestSession>(
            r#"
            UPDATE test_sessions
            SET status = 'active', paused_at = NULL,
                total_pause_seconds = total_pause_seconds + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(pause_seconds)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(session_id = %session_id, pause_seconds, "Session resumed");
        Ok(updated)
    }

    /// The question at the current cursor, sanitized for serving. `None`
    /// once the sequence is exhausted or the session is finished.
    pub async fn current_question(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ServedQuestion>> {
        let mut tx = self.pool.begin().await?;
        let session = Self::lock_owned(&mut tx, session_id, user_id).await?;
        let (session, _) = self.expire_if_due(&mut tx, session).await?;
        tx.commit().await?;

        Self::ensure_servable(session.session_status()?)?;
        if session.is_exhausted() {
            return Ok(None);
        }
        let index = session.current_question_index;
        let question = session
            .snapshot_question(index as usize)?
            .ok_or_else(|| Error::Internal("Question snapshot shorter than cursor".to_string()))?;
        Ok(Some(ServedQuestion::from_snapshot(
            question,
            index,
            session.total_questions,
        )))
    }

    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        req: SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse> {
        let mut tx = self.pool.begin().await?;
        let session = Self::lock_owned(&mut tx, session_id, user_id).await?;
        let (session, expired) = self.expire_if_due(&mut tx, session).await?;
        if expired {
            tx.commit().await?;
            return Err(Error::SessionTerminated(
                "Session time limit has been exceeded".to_string(),
            ));
        }
        match session.session_status()? {
            SessionStatus::Active => {}
            SessionStatus::Paused => {
                return Err(Error::SessionPaused(
                    "Cannot submit an answer while the session is paused".to_string(),
                ))
            }
            status if status.is_terminal() => {
                return Err(Error::SessionTerminated(format!("Session is {}", status)))
            }
            status => {
                return Err(Error::InvalidStateTransition(format!(
                    "Cannot submit to a session in status {}",
                    status
                )))
            }
        }

        let cursor = session.current_question_index as usize;
        let expected = session.question_ids.get(cursor).copied();
        let is_resubmission = if expected == Some(req.question_id) {
            false
        } else if session.allow_review
            && session.question_ids[..cursor.min(session.question_ids.len())]
                .contains(&req.question_id)
        {
            true
        } else {
            return Err(Error::OutOfSequenceSubmission(match expected {
                Some(id) => format!("Expected an answer for question {}", id),
                None => "No further questions are expected".to_string(),
            }));
        };

        let question = session
            .snapshot()?
            .into_iter()
            .find(|q| q.id == req.question_id)
            .ok_or_else(|| {
                Error::QuestionNotFound(format!("Question {} is not part of this session", req.question_id))
            })?;
        let over_time_limit = session
            .time_per_question_seconds
            .map(|limit| req.time_taken > limit)
            .unwrap_or(false);
        if over_time_limit {
            tracing::warn!(
                session_id = %session_id,
                question_id = %req.question_id,
                time_taken = req.time_taken,
                "Per-question time limit exceeded; submission scored but flagged"
            );
        }

        let evaluation = match evaluator::evaluate(
            &question,
            &req.user_answer,
            session.negative_marking,
            session.negative_marking_ratio,
        ) {
            Ok(evaluation) => evaluation,
            Err(err @ Error::EvaluationFailed(_)) => {
                // Leave the cursor unmoved and record the failure so the
                // client can retry the same question. A prior evaluated
                // submission (review path) is never overwritten by a failure.
                if !is_resubmission {
                    Self::upsert_submission(
                        &mut tx,
                        &session,
                        &question,
                        &req,
                        false,
                        Decimal::ZERO,
                        Decimal::from(question.max_score),
                        over_time_limit,
                        SubmissionStatus::Failed,
                        None,
                    )
                    .await?;
                    tx.commit().await?;
                }
                tracing::error!(session_id = %session_id, question_id = %req.question_id, error = %err, "Evaluation failed");
                return Err(err);
            }
            Err(other) => return Err(other),
        };

        // Read the prior submission before the upsert replaces it; its
        // contribution is backed out of the running totals on review.
        let prior = if is_resubmission {
            Some(Self::prior_submission(&mut tx, session_id, req.question_id).await?)
        } else {
            None
        };

        let feedback = if session.show_results {
            question.explanation.clone()
        } else {
            None
        };
        let submission = Self::upsert_submission(
            &mut tx,
            &session,
            &question,
            &req,
            evaluation.is_correct,
            evaluation.awarded,
            evaluation.max_score,
            over_time_limit,
            SubmissionStatus::Evaluated,
            feedback.clone(),
        )
        .await?;
        let mut score = session.score;
        let mut correct = session.correct_answers;
        let mut incorrect = session.incorrect_answers;
        if let Some(prior) = prior
            .as_ref()
            .filter(|p| p.status == SubmissionStatus::Evaluated.as_str())
        {
            score -= prior.score;
            if prior.is_correct {
                correct -= 1;
            } else {
                incorrect -= 1;
            }
        }
        score += evaluation.awarded;
        if evaluation.is_correct {
            correct += 1;
        } else {
            incorrect += 1;
        }
        let next_index = if is_resubmission {
            session.current_question_index
        } else {
            session.current_question_index + 1
        };

        if !is_resubmission {
            sqlx::query(
                r#"
                UPDATE questions
                SET times_used = times_used + 1,
                    times_correct = times_correct + CASE WHEN $2 THEN 1 ELSE 0 END,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(req.question_id)
            .bind(evaluation.is_correct)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query_as::<_, TestSession>(
            r#"
            UPDATE test_sessions
            SET score = $2, correct_answers = $3, incorrect_answers = $4,
                current_question_index = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(score)
        .bind(correct)
        .bind(incorrect)
        .bind(next_index)
        .fetch_one(&mut *tx)
        .await?;

        // Answering the last question completes the session and triggers
        // aggregation in the same transaction.
        let is_session_complete = !is_resubmission && updated.is_exhausted();
        if is_session_complete {
            self.finalize(&mut tx, updated, SessionStatus::Completed, Utc::now())
                .await?;
        }
        tx.commit().await?;

        Ok(SubmitAnswerResponse {
            submission_id: submission.id,
            is_correct: evaluation.is_correct,
            score: evaluation.awarded.to_f64().unwrap_or(0.0),
            max_score: evaluation.max_score.to_f64().unwrap_or(0.0),
            is_session_complete,
            feedback,
            time_taken: req.time_taken,
        })
    }

    pub async fn progress(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<SessionProgressResponse> {
        let mut tx = self.pool.begin().await?;
        let session = Self::lock_owned(&mut tx, session_id, user_id).await?;
        let (session, _) = self.expire_if_due(&mut tx, session).await?;
        tx.commit().await?;

        let now = Utc::now();
        let elapsed = if session.session_status()?.is_terminal() {
            i64::from(session.total_time_seconds)
        } else {
            timing::effective_elapsed_seconds(
                now,
                session.started_at,
                session.paused_at,
                session.total_pause_seconds,
            )
        };
        Ok(SessionProgressResponse {
            session_id: session.id,
            status: session.status.clone(),
            current_question_index: session.current_question_index,
            total_questions: session.total_questions,
            answered: session.correct_answers + session.incorrect_answers,
            correct_answers: session.correct_answers,
            incorrect_answers: session.incorrect_answers,
            score: session.score.to_f64().unwrap_or(0.0),
            max_score: session.max_score.to_f64().unwrap_or(0.0),
            elapsed_seconds: elapsed,
            remaining_seconds: timing::remaining_seconds(elapsed, session.time_limit_seconds),
        })
    }

    /// Final report for a terminal session. Served from the cached report;
    /// computed and cached on first read for sessions finalized without one
    /// (the abandon sweep).
    pub async fn results(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<SessionResultsResponse> {
        let mut tx = self.pool.begin().await?;
        let session = Self::lock_owned(&mut tx, session_id, user_id).await?;
        let (session, _) = self.expire_if_due(&mut tx, session).await?;

        if !session.session_status()?.is_terminal() {
            tx.commit().await?;
            return Err(Error::InvalidStateTransition(
                "Results are only available once the session is finished".to_string(),
            ));
        }
        if let Some(cached) = &session.results {
            let report: SessionResultsResponse = serde_json::from_value(cached.clone())?;
            tx.commit().await?;
            return Ok(report);
        }

        let submissions = Self::session_submissions(&mut tx, session_id).await?;
        let report = results::build_results(&session, &submissions)?;
        sqlx::query(
            r#"UPDATE test_sessions SET results = $2, updated_at = NOW() WHERE id = $1"#,
        )
        .bind(session_id)
        .bind(serde_json::to_value(&report)?)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(report)
    }

    pub async fn list_sessions(
        &self,
        user_id: Uuid,
        query: &ListSessionsQuery,
    ) -> Result<SessionListResponse> {
        let skip = query.skip.unwrap_or(0).max(0);
        let limit = query.limit.unwrap_or(20).clamp(1, 100);

        let sessions = sqlx::query_as::<_, TestSession>(
            r#"
            SELECT * FROM test_sessions
            WHERE user_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR test_type = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(user_id)
        .bind(query.status.as_deref())
        .bind(query.test_type.as_deref())
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM test_sessions
            WHERE user_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR test_type = $3)
            "#,
        )
        .bind(user_id)
        .bind(query.status.as_deref())
        .bind(query.test_type.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(SessionListResponse {
            sessions: sessions.into_iter().map(SessionResponse::from).collect(),
            total,
            skip,
            limit,
        })
    }

    /// Administrative sweep: sessions idle beyond the grace window move to
    /// `abandoned`. Their report is computed lazily on the next results
    /// read.
    pub async fn abandon_idle(&self, idle_minutes: i64) -> Result<u64> {
        let threshold = Utc::now() - chrono::Duration::minutes(idle_minutes.max(1));
        let affected = sqlx::query(
            r#"
            UPDATE test_sessions
            SET status = 'abandoned',
                ended_at = NOW(),
                total_time_seconds = GREATEST(0,
                    (EXTRACT(EPOCH FROM (NOW() - COALESCE(started_at, NOW()))))::int
                    - total_pause_seconds::int
                    - CASE WHEN paused_at IS NOT NULL
                        THEN (EXTRACT(EPOCH FROM (NOW() - paused_at)))::int
                        ELSE 0 END),
                skipped_answers = total_questions - correct_answers - incorrect_answers,
                paused_at = NULL,
                updated_at = NOW()
            WHERE status IN ('active', 'paused') AND updated_at < $1
            "#,
        )
        .bind(threshold)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected > 0 {
            tracing::info!(count = affected, idle_minutes, "Abandoned idle sessions");
        }
        Ok(affected)
    }

    async fn lock_owned(
        tx: &mut Transaction<'_, Postgres>,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<TestSession> {
        let session = sqlx::query_as::<_, TestSession>(
            r#"SELECT * FROM test_sessions WHERE id = $1 FOR UPDATE"#,
        )
        .bind(session_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session {} not found", session_id)))?;

        if session.user_id != user_id {
            return Err(Error::Unauthorized(
                "Session belongs to another user".to_string(),
            ));
        }
        Ok(session)
    }

    /// Questions are only served while the session is `active`. A terminal
    /// session fails like every other interaction with it; `null` is reserved
    /// for an active session whose sequence is exhausted.
    fn ensure_servable(status: SessionStatus) -> Result<()> {
        match status {
            SessionStatus::Active => Ok(()),
            status if status.is_terminal() => {
                Err(Error::SessionTerminated(format!("Session is {}", status)))
            }
            SessionStatus::Paused => Err(Error::SessionPaused("Session is paused".to_string())),
            status => Err(Error::InvalidStateTransition(format!(
                "Cannot serve a question for a session in status {}",
                status
            ))),
        }
    }

    /// Lazy expiry: flips the session to `expired` and finalizes it when the
    /// overall limit has been spent. Returns the (possibly replaced) session
    /// and whether expiry fired.
    async fn expire_if_due(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        session: TestSession,
    ) -> Result<(TestSession, bool)> {
        let now = Utc::now();
        if !timing::expiry_due(
            session.session_status()?,
            now,
            session.started_at,
            session.paused_at,
            session.total_pause_seconds,
            session.time_limit_seconds,
        ) {
            return Ok((session, false));
        }

        tracing::info!(session_id = %session.id, "Session time limit exceeded, expiring");
        let expired = self
            .finalize(tx, session, SessionStatus::Expired, now)
            .await?;
        Ok((expired, true))
    }

    /// Terminal transition: recomputes the totals from the persisted
    /// submission set, stamps `ended_at` exactly once, and caches the
    /// aggregated report.
    async fn finalize(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        session: TestSession,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<TestSession> {
        let current = session.session_status()?;
        if !current.can_transition_to(status) {
            return Err(Error::InvalidStateTransition(format!(
                "Cannot move a session from {} to {}",
                current, status
            )));
        }

        let mut elapsed = timing::effective_elapsed_seconds(
            now,
            session.started_at,
            session.paused_at,
            session.total_pause_seconds,
        );
        if status == SessionStatus::Expired {
            if let Some(limit) = session.time_limit_seconds {
                elapsed = elapsed.min(i64::from(limit));
            }
        }

        let submissions = Self::session_submissions(tx, session.id).await?;
        let evaluated: Vec<&Submission> = submissions
            .iter()
            .filter(|s| s.status == SubmissionStatus::Evaluated.as_str())
            .collect();
        let correct = evaluated.iter().filter(|s| s.is_correct).count() as i32;
        let incorrect = evaluated.len() as i32 - correct;
        let skipped = session.total_questions - evaluated.len() as i32;
        let score: Decimal = evaluated.iter().map(|s| s.score).sum();

        let mut finalized = session;
        finalized.status = status.as_str().to_string();
        finalized.ended_at = Some(now);
        finalized.paused_at = None;
        finalized.total_time_seconds = elapsed as i32;
        finalized.score = score;
        finalized.correct_answers = correct;
        finalized.incorrect_answers = incorrect;
        finalized.skipped_answers = skipped;

        let report = results::build_results(&finalized, &submissions)?;
        let updated = sqlx::query_as::<_, TestSession>(
            r#"
            UPDATE test_sessions
            SET status = $2, ended_at = $3, paused_at = NULL,
                total_time_seconds = $4, score = $5, correct_answers = $6,
                incorrect_answers = $7, skipped_answers = $8, results = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(finalized.id)
        .bind(status.as_str())
        .bind(now)
        .bind(finalized.total_time_seconds)
        .bind(score)
        .bind(correct)
        .bind(incorrect)
        .bind(skipped)
        .bind(serde_json::to_value(&report)?)
        .fetch_one(&mut **tx)
        .await?;

        tracing::info!(
            session_id = %updated.id,
            status = %status,
            score = %score,
            "Session finalized"
        );
        Ok(updated)
    }

    async fn session_submissions(
        tx: &mut Transaction<'_, Postgres>,
        session_id: Uuid,
    ) -> Result<Vec<Submission>> {
        Ok(sqlx::query_as::<_, Submission>(
            r#"SELECT * FROM submissions WHERE session_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(session_id)
        .fetch_all(&mut **tx)
        .await?)
    }

    async fn prior_submission(
        tx: &mut Transaction<'_, Postgres>,
        session_id: Uuid,
        question_id: Uuid,
    ) -> Result<Submission> {
        sqlx::query_as::<_, Submission>(
            r#"SELECT * FROM submissions WHERE session_id = $1 AND question_id = $2"#,
        )
        .bind(session_id)
        .bind(question_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| Error::Internal("Reviewed question has no prior submission".to_string()))
    }

    #[allow(clippy::too_many_arguments)]
    async fn upsert_submission(
        tx: &mut Transaction<'_, Postgres>,
        session: &TestSession,
        question: &QuestionSnapshot,
        req: &SubmitAnswerRequest,
        is_correct: bool,
        score: Decimal,
        max_score: Decimal,
        over_time_limit: bool,
        status: SubmissionStatus,
        feedback: Option<String>,
    ) -> Result<Submission> {
        let submission = sqlx::query_as::<_, Submission>(
            r#"
            INSERT INTO submissions (
                session_id, question_id, user_id, user_answer, is_correct,
                score, max_score, time_taken_seconds, over_time_limit, status,
                feedback, category, difficulty
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (session_id, question_id) DO UPDATE
            SET user_answer = EXCLUDED.user_answer,
                is_correct = EXCLUDED.is_correct,
                score = EXCLUDED.score,
                max_score = EXCLUDED.max_score,
                time_taken_seconds = EXCLUDED.time_taken_seconds,
                over_time_limit = EXCLUDED.over_time_limit,
                status = EXCLUDED.status,
                feedback = EXCLUDED.feedback,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(session.id)
        .bind(question.id)
        .bind(session.user_id)
        .bind(&req.user_answer)
        .bind(is_correct)
        .bind(score)
        .bind(max_score)
        .bind(req.time_taken)
        .bind(over_time_limit)
        .bind(status.as_str())
        .bind(feedback)
        .bind(&question.category)
        .bind(question.difficulty)
        .fetch_one(&mut **tx)
        .await?;
        Ok(submission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn questions_are_only_served_while_active() {
        assert!(SessionService::ensure_servable(SessionStatus::Active).is_ok());
        assert!(matches!(
            SessionService::ensure_servable(SessionStatus::Paused),
            Err(Error::SessionPaused(_))
        ));
        assert!(matches!(
            SessionService::ensure_servable(SessionStatus::Created),
            Err(Error::InvalidStateTransition(_))
        ));
        for terminal in [
            SessionStatus::Completed,
            SessionStatus::Abandoned,
            SessionStatus::Expired,
        ] {
            assert!(matches!(
                SessionService::ensure_servable(terminal),
                Err(Error::SessionTerminated(_))
            ));
        }
    }
}
