//! User performance analytics, aggregated from evaluated submissions. The
//! same per-category accuracy feeds the performance-based selector.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::dto::analytics_dto::{CategoryAccuracy, PerformanceAnalyticsResponse};
use crate::error::Result;

const DEFAULT_WINDOW_DAYS: i64 = 30;
const SELECTOR_WINDOW_DAYS: i64 = 90;

#[derive(Clone)]
pub struct AnalyticsService {
    pool: PgPool,
}

impl AnalyticsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn performance(
        &self,
        user_id: Uuid,
        days: Option<i64>,
    ) -> Result<PerformanceAnalyticsResponse> {
        let days = days.unwrap_or(DEFAULT_WINDOW_DAYS).clamp(1, 365);
        let since = Utc::now() - Duration::days(days);

        let sessions_completed: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM test_sessions
            WHERE user_id = $1 AND status = 'completed' AND ended_at >= $2
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let totals: (i64, i64, f64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE is_correct),
                   COALESCE(AVG(time_taken_seconds)::float8, 0)
            FROM submissions
            WHERE user_id = $1 AND status = 'evaluated' AND created_at >= $2
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        let (attempted, correct, average_time) = totals;

        let category_rows: Vec<(String, i64, i64, f64)> = sqlx::query_as(
            r#"
            SELECT category,
                   COUNT(*),
                   COUNT(*) FILTER (WHERE is_correct),
                   COALESCE(AVG(time_taken_seconds)::float8, 0)
            FROM submissions
            WHERE user_id = $1 AND status = 'evaluated' AND created_at >= $2
            GROUP BY category
            ORDER BY category
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let difficulty_rows: Vec<(i16, i64, i64, f64)> = sqlx::query_as(
            r#"
            SELECT difficulty,
                   COUNT(*),
                   COUNT(*) FILTER (WHERE is_correct),
                   COALESCE(AVG(time_taken_seconds)::float8, 0)
            FROM submissions
            WHERE user_id = $1 AND status = 'evaluated' AND created_at >= $2
            GROUP BY difficulty
            ORDER BY difficulty
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(PerformanceAnalyticsResponse {
            days,
            sessions_completed,
            questions_attempted: attempted,
            correct,
            accuracy: ratio(correct, attempted),
            average_time,
            category_accuracy: category_rows
                .into_iter()
                .map(|(category, attempted, correct, average_time)| {
                    (
                        category,
                        CategoryAccuracy {
                            attempted,
                            correct,
                            accuracy: ratio(correct, attempted),
                            average_time,
                        },
                    )
                })
                .collect(),
            difficulty_accuracy: difficulty_rows
                .into_iter()
                .map(|(difficulty, attempted, correct, average_time)| {
                    (
                        difficulty.to_string(),
                        CategoryAccuracy {
                            attempted,
                            correct,
                            accuracy: ratio(correct, attempted),
                            average_time,
                        },
                    )
                })
                .collect(),
        })
    }

    /// Per-category accuracy over the selector's lookback window. Categories
    /// the user has never attempted are simply absent.
    pub async fn category_accuracy(&self, user_id: Uuid) -> Result<BTreeMap<String, f64>> {
        let since = Utc::now() - Duration::days(SELECTOR_WINDOW_DAYS);
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT category, COUNT(*), COUNT(*) FILTER (WHERE is_correct)
            FROM submissions
            WHERE user_id = $1 AND status = 'evaluated' AND created_at >= $2
            GROUP BY category
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(category, attempted, correct)| (category, ratio(correct, attempted)))
            .collect())
    }
}

fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_guards_zero_denominator() {
        assert_eq!(ratio(0, 0), 0.0);
        assert_eq!(ratio(3, 4), 0.75);
    }
}
