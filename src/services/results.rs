//! Results aggregation. Runs once when a session reaches a terminal state;
//! the report is cached on the session row and recomputation over the same
//! submission set yields an identical report.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::dto::session_dto::{
    BucketStats, SessionResultsResponse, SubmissionDetail, TimeAnalysis,
};
use crate::error::Result;
use crate::models::session::TestSession;
use crate::models::submission::{Submission, SubmissionStatus};

#[derive(Default)]
struct BucketAcc {
    total: i32,
    correct: i32,
    total_time: i64,
    total_score: Decimal,
}

impl BucketAcc {
    fn push(&mut self, sub: &Submission) {
        self.total += 1;
        if sub.is_correct {
            self.correct += 1;
        }
        self.total_time += i64::from(sub.time_taken_seconds);
        self.total_score += sub.score;
    }

    fn stats(&self) -> BucketStats {
        let total = f64::from(self.total.max(1));
        BucketStats {
            total: self.total,
            correct: self.correct,
            accuracy: f64::from(self.correct) / total,
            average_time: self.total_time as f64 / total,
            average_score: self.total_score.to_f64().unwrap_or(0.0) / total,
            total_time: self.total_time,
            total_score: self.total_score.to_f64().unwrap_or(0.0),
        }
    }
}

/// Build the final report for a terminal session from its full submission
/// set. Failed submissions never count; the bucket maps are ordered, so the
/// serialized report is deterministic.
pub fn build_results(session: &TestSession, submissions: &[Submission]) -> Result<SessionResultsResponse> {
    let mut evaluated: Vec<&Submission> = submissions
        .iter()
        .filter(|s| s.status == SubmissionStatus::Evaluated.as_str())
        .collect();
    evaluated.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.question_id.cmp(&b.question_id))
    });

    let final_score: Decimal = evaluated.iter().map(|s| s.score).sum();
    let max_score = session.max_score;
    let percentage = if max_score > Decimal::ZERO {
        ((final_score / max_score) * Decimal::from(100))
            .to_f64()
            .unwrap_or(0.0)
    } else {
        0.0
    };
    let passed = session
        .passing_score
        .and_then(|threshold| threshold.to_f64())
        .map(|threshold| percentage >= threshold);

    let correct = evaluated.iter().filter(|s| s.is_correct).count() as i32;
    let incorrect = evaluated.len() as i32 - correct;
    let skipped = session.total_questions - evaluated.len() as i32;

    let mut by_category: BTreeMap<String, BucketAcc> = BTreeMap::new();
    let mut by_difficulty: BTreeMap<String, BucketAcc> = BTreeMap::new();
    for sub in &evaluated {
        by_category.entry(sub.category.clone()).or_default().push(sub);
        by_difficulty
            .entry(sub.difficulty.to_string())
            .or_default()
            .push(sub);
    }

    let times: Vec<i64> = evaluated
        .iter()
        .map(|s| i64::from(s.time_taken_seconds))
        .collect();
    let total_time: i64 = times.iter().sum();
    let time_analysis = TimeAnalysis {
        total_time,
        average_time: if times.is_empty() {
            0.0
        } else {
            total_time as f64 / times.len() as f64
        },
        min_time: times.iter().copied().min().unwrap_or(0),
        max_time: times.iter().copied().max().unwrap_or(0),
        time_efficiency: session.time_limit_seconds.map(|limit| {
            let limit = f64::from(limit.max(1));
            (1.0 - f64::from(session.total_time_seconds) / limit).clamp(0.0, 1.0)
        }),
    };

    let snapshot = session.snapshot().unwrap_or_default();
    let detailed_submissions = evaluated
        .iter()
        .map(|s| {
            let correct_answer = snapshot
                .iter()
                .find(|q| q.id == s.question_id)
                .map(|q| q.correct_answer.clone())
                .unwrap_or_default();
            SubmissionDetail {
                question_id: s.question_id,
                user_answer: s.user_answer.clone(),
                correct_answer,
                is_correct: s.is_correct,
                score: s.score.to_f64().unwrap_or(0.0),
                max_score: s.max_score.to_f64().unwrap_or(0.0),
                time_taken_seconds: s.time_taken_seconds,
                over_time_limit: s.over_time_limit,
                category: s.category.clone(),
                difficulty: s.difficulty,
            }
        })
        .collect();

    Ok(SessionResultsResponse {
        session_id: session.id,
        status: session.status.clone(),
        final_score: final_score.to_f64().unwrap_or(0.0),
        max_score: max_score.to_f64().unwrap_or(0.0),
        percentage,
        passed,
        total_questions: session.total_questions,
        correct_answers: correct,
        incorrect_answers: incorrect,
        skipped_answers: skipped,
        category_performance: by_category
            .iter()
            .map(|(k, v)| (k.clone(), v.stats()))
            .collect(),
        difficulty_performance: by_difficulty
            .iter()
            .map(|(k, v)| (k.clone(), v.stats()))
            .collect(),
        time_analysis,
        detailed_submissions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use uuid::Uuid;

    fn session_with(total: i32, negative_ratio: &str, passing: Option<&str>) -> TestSession {
        let now = Utc::now();
        TestSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            test_type: "aptitude".to_string(),
            total_questions: total,
            time_limit_seconds: Some(600),
            time_per_question_seconds: None,
            filters: json!({}),
            selection_algorithm: "random".to_string(),
            randomize_questions: false,
            randomize_options: false,
            allow_review: false,
            show_results: true,
            passing_score: passing.map(|p| p.parse().unwrap()),
            negative_marking: negative_ratio != "0",
            negative_marking_ratio: negative_ratio.parse().unwrap(),
            difficulty_distribution: None,
            question_ids: vec![],
            questions_snapshot: json!([]),
            current_question_index: total,
            status: "completed".to_string(),
            started_at: Some(now - Duration::seconds(300)),
            ended_at: Some(now),
            paused_at: None,
            total_pause_seconds: 0,
            score: Decimal::ZERO,
            max_score: Decimal::from(total),
            correct_answers: 0,
            incorrect_answers: 0,
            skipped_answers: 0,
            total_time_seconds: 300,
            results: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn submission(session: &TestSession, correct: bool, score: &str, category: &str, difficulty: i16, time: i32) -> Submission {
        let now = Utc::now();
        Submission {
            id: Uuid::new_v4(),
            session_id: session.id,
            question_id: Uuid::new_v4(),
            user_id: session.user_id,
            user_answer: "a".to_string(),
            is_correct: correct,
            score: score.parse().unwrap(),
            max_score: Decimal::from(1),
            time_taken_seconds: time,
            over_time_limit: false,
            status: "evaluated".to_string(),
            feedback: None,
            category: category.to_string(),
            difficulty,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn plain_scoring_scenario() {
        // 5 questions, 3 correct, 2 incorrect, no negative marking.
        let session = session_with(5, "0", Some("60"));
        let subs: Vec<Submission> = (0..5)
            .map(|i| {
                let ok = i < 3;
                submission(&session, ok, if ok { "1" } else { "0" }, "quant", 2, 30)
            })
            .collect();
        let report = build_results(&session, &subs).unwrap();
        assert_eq!(report.final_score, 3.0);
        assert_eq!(report.percentage, 60.0);
        assert_eq!(report.passed, Some(true));
        assert_eq!(report.correct_answers, 3);
        assert_eq!(report.incorrect_answers, 2);
        assert_eq!(report.skipped_answers, 0);
    }

    #[test]
    fn negative_marking_scenario() {
        // Same shape with ratio 0.25: 3 − 2·0.25 = 2.5, 50%.
        let session = session_with(5, "0.25", Some("60"));
        let subs: Vec<Submission> = (0..5)
            .map(|i| {
                let ok = i < 3;
                submission(&session, ok, if ok { "1" } else { "-0.25" }, "quant", 2, 30)
            })
            .collect();
        let report = build_results(&session, &subs).unwrap();
        assert_eq!(report.final_score, 2.5);
        assert_eq!(report.percentage, 50.0);
        assert_eq!(report.passed, Some(false));
    }

    #[test]
    fn counts_always_sum_to_total() {
        // Expired session with only 2 of 5 answered.
        let mut session = session_with(5, "0", None);
        session.status = "expired".to_string();
        let subs = vec![
            submission(&session, true, "1", "quant", 2, 20),
            submission(&session, false, "0", "verbal", 3, 40),
        ];
        let report = build_results(&session, &subs).unwrap();
        assert_eq!(
            report.correct_answers + report.incorrect_answers + report.skipped_answers,
            report.total_questions
        );
        assert_eq!(report.skipped_answers, 3);
        assert_eq!(report.passed, None);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let session = session_with(4, "0.5", Some("50"));
        let subs = vec![
            submission(&session, true, "1", "quant", 1, 10),
            submission(&session, false, "-0.5", "quant", 4, 50),
            submission(&session, true, "1", "logic", 3, 25),
        ];
        let first = build_results(&session, &subs).unwrap();
        let second = build_results(&session, &subs).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[test]
    fn buckets_carry_per_category_breakdown() {
        let session = session_with(3, "0", None);
        let subs = vec![
            submission(&session, true, "1", "quant", 2, 10),
            submission(&session, false, "0", "quant", 2, 30),
            submission(&session, true, "1", "verbal", 5, 20),
        ];
        let report = build_results(&session, &subs).unwrap();
        let quant = &report.category_performance["quant"];
        assert_eq!(quant.total, 2);
        assert_eq!(quant.correct, 1);
        assert_eq!(quant.accuracy, 0.5);
        assert_eq!(quant.total_time, 40);
        assert_eq!(quant.average_time, 20.0);
        let hard = &report.difficulty_performance["5"];
        assert_eq!(hard.total, 1);
        assert_eq!(hard.accuracy, 1.0);
    }

    #[test]
    fn time_analysis_and_efficiency() {
        let mut session = session_with(3, "0", None);
        session.total_time_seconds = 150;
        let subs = vec![
            submission(&session, true, "1", "quant", 2, 30),
            submission(&session, true, "1", "quant", 2, 60),
            submission(&session, true, "1", "quant", 2, 60),
        ];
        let report = build_results(&session, &subs).unwrap();
        assert_eq!(report.time_analysis.total_time, 150);
        assert_eq!(report.time_analysis.average_time, 50.0);
        assert_eq!(report.time_analysis.min_time, 30);
        assert_eq!(report.time_analysis.max_time, 60);
        // 150 of 600 allotted seconds used.
        assert_eq!(report.time_analysis.time_efficiency, Some(0.75));

        session.time_limit_seconds = None;
        let unlimited = build_results(&session, &subs).unwrap();
        assert_eq!(unlimited.time_analysis.time_efficiency, None);
    }

    #[test]
    fn zero_max_score_does_not_divide() {
        let mut session = session_with(0, "0", Some("50"));
        session.max_score = Decimal::ZERO;
        let report = build_results(&session, &[]).unwrap();
        assert_eq!(report.percentage, 0.0);
        assert_eq!(report.final_score, 0.0);
    }

    #[test]
    fn failed_submissions_are_ignored() {
        let session = session_with(2, "0", None);
        let mut failed = submission(&session, false, "0", "quant", 2, 10);
        failed.status = "failed".to_string();
        let subs = vec![submission(&session, true, "1", "quant", 2, 15), failed];
        let report = build_results(&session, &subs).unwrap();
        assert_eq!(report.correct_answers, 1);
        assert_eq!(report.incorrect_answers, 0);
        assert_eq!(report.skipped_answers, 1);
    }
}
