use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::question::QuestionSnapshot;

/// Lifecycle of a test session.
///
/// `created → active → {paused, completed, abandoned, expired}`,
/// `paused → active`; everything except `active ⇄ paused` is one-directional
/// and the four right-hand states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Active,
    Paused,
    Completed,
    Abandoned,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
            SessionStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "created" => Ok(SessionStatus::Created),
            "active" => Ok(SessionStatus::Active),
            "paused" => Ok(SessionStatus::Paused),
            "completed" => Ok(SessionStatus::Completed),
            "abandoned" => Ok(SessionStatus::Abandoned),
            "expired" => Ok(SessionStatus::Expired),
            other => Err(Error::Internal(format!("Unknown session status: {}", other))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Abandoned | SessionStatus::Expired
        )
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (*self, next) {
            (Created, Active) => true,
            (Active, Paused) => true,
            (Paused, Active) => true,
            (Active, Completed) => true,
            // Expiry and abandonment may hit a paused session as well.
            (Active | Paused, Expired) => true,
            (Active | Paused, Abandoned) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test_type: String,
    pub total_questions: i32,
    pub time_limit_seconds: Option<i32>,
    pub time_per_question_seconds: Option<i32>,
    pub filters: JsonValue,
    pub selection_algorithm: String,
    pub randomize_questions: bool,
    pub randomize_options: bool,
    pub allow_review: bool,
    pub show_results: bool,
    pub passing_score: Option<Decimal>,
    pub negative_marking: bool,
    pub negative_marking_ratio: Decimal,
    pub difficulty_distribution: Option<JsonValue>,
    pub question_ids: Vec<Uuid>,
    pub questions_snapshot: JsonValue,
    pub current_question_index: i32,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub total_pause_seconds: i64,
    pub score: Decimal,
    pub max_score: Decimal,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
    pub skipped_answers: i32,
    pub total_time_seconds: i32,
    pub results: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TestSession {
    pub fn session_status(&self) -> Result<SessionStatus> {
        SessionStatus::parse(&self.status)
    }

    /// Frozen copies of the selected questions, in serving order. The
    /// snapshot is taken at creation time so retiring or editing a bank
    /// question never corrupts a live session.
    pub fn snapshot(&self) -> Result<Vec<QuestionSnapshot>> {
        Ok(serde_json::from_value(self.questions_snapshot.clone())?)
    }

    pub fn snapshot_question(&self, index: usize) -> Result<Option<QuestionSnapshot>> {
        let mut snapshot = self.snapshot()?;
        if index >= snapshot.len() {
            return Ok(None);
        }
        Ok(Some(snapshot.swap_remove(index)))
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_question_index >= self.total_questions
    }
}

#[cfg(test)]
mod tests {
    use super::SessionStatus::*;

    #[test]
    fn start_only_from_created() {
        assert!(Created.can_transition_to(Active));
        assert!(!Active.can_transition_to(Active));
        assert!(!Paused.can_transition_to(Paused));
        assert!(!Completed.can_transition_to(Active));
    }

    #[test]
    fn pause_resume_cycle() {
        assert!(Active.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Active));
        assert!(!Created.can_transition_to(Paused));
        assert!(!Paused.can_transition_to(Completed));
    }

    #[test]
    fn terminal_states_are_dead_ends() {
        for terminal in [Completed, Abandoned, Expired] {
            assert!(terminal.is_terminal());
            for next in [Created, Active, Paused, Completed, Abandoned, Expired] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn expiry_reaches_paused_sessions() {
        assert!(Active.can_transition_to(Expired));
        assert!(Paused.can_transition_to(Expired));
        assert!(Paused.can_transition_to(Abandoned));
        assert!(!Created.can_transition_to(Expired));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [Created, Active, Paused, Completed, Abandoned, Expired] {
            assert_eq!(super::SessionStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(super::SessionStatus::parse("in_progress").is_err());
    }
}
