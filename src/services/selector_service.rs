//! Question selection. The selector builds the frozen, ordered question list
//! for a session at creation time; nothing is persisted when the bank cannot
//! satisfy the request.

use rand::seq::SliceRandom;
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::dto::session_dto::CreateSessionRequest;
use crate::error::{Error, Result};
use crate::models::question::Question;
use crate::services::analytics_service::AnalyticsService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionAlgorithm {
    Random,
    DifficultyBased,
    PerformanceBased,
    Balanced,
}

impl SelectionAlgorithm {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(SelectionAlgorithm::Random),
            "difficulty_based" => Ok(SelectionAlgorithm::DifficultyBased),
            "performance_based" | "irt_based" => Ok(SelectionAlgorithm::PerformanceBased),
            "balanced" => Ok(SelectionAlgorithm::Balanced),
            other => Err(Error::BadRequest(format!(
                "Unknown selection algorithm: {}",
                other
            ))),
        }
    }

    pub fn all() -> &'static [&'static str] {
        &["random", "difficulty_based", "performance_based", "balanced"]
    }
}

/// Everything `pick_questions` needs, detached from the request shape so the
/// ordering logic is testable without a database.
pub struct SelectionPlan<'a> {
    pub algorithm: SelectionAlgorithm,
    pub count: usize,
    pub randomize: bool,
    pub requested_categories: Option<&'a [String]>,
    pub difficulty_distribution: Option<&'a BTreeMap<String, i32>>,
    /// Per-category accuracy of the requesting user; only consulted by
    /// `performance_based`.
    pub category_accuracy: Option<&'a BTreeMap<String, f64>>,
}

#[derive(Clone)]
pub struct QuestionSelector {
    pool: PgPool,
}

impl QuestionSelector {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn select(
        &self,
        user_id: Uuid,
        req: &CreateSessionRequest,
        analytics: &AnalyticsService,
    ) -> Result<Vec<Question>> {
        let algorithm = SelectionAlgorithm::parse(&req.selection_algorithm)?;
        let pool_questions = self.fetch_pool(req).await?;

        let accuracy = if algorithm == SelectionAlgorithm::PerformanceBased {
            Some(analytics.category_accuracy(user_id).await?)
        } else {
            None
        };

        pick_questions(
            pool_questions,
            &SelectionPlan {
                algorithm,
                count: req.total_questions as usize,
                randomize: req.randomize_questions,
                requested_categories: req.categories.as_deref(),
                difficulty_distribution: req.difficulty_distribution.as_ref(),
                category_accuracy: accuracy.as_ref(),
            },
        )
    }

    /// All active bank questions matching the session filters, in
    /// deterministic order (difficulty ascending, then creation order).
    async fn fetch_pool(&self, req: &CreateSessionRequest) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT * FROM questions
            WHERE is_active = TRUE
              AND ($1::text[] IS NULL OR category = ANY($1))
              AND ($2::int2[] IS NULL OR difficulty = ANY($2))
              AND ($3::text[] IS NULL OR companies ?| $3)
              AND ($4::text[] IS NULL OR tags ?| $4)
            ORDER BY difficulty ASC, created_at ASC, id ASC
            "#,
        )
        .bind(req.categories.as_deref())
        .bind(req.difficulties.as_deref())
        .bind(req.companies.as_deref())
        .bind(req.tags.as_deref())
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }
}

/// Order and trim the candidate pool according to the plan.
///
/// Fails with `InsufficientQuestionPool` (naming the shortfall) instead of
/// silently truncating; the caller decides whether to relax filters.
pub fn pick_questions(pool: Vec<Question>, plan: &SelectionPlan<'_>) -> Result<Vec<Question>> {
    if pool.len() < plan.count {
        return Err(Error::InsufficientQuestionPool(format!(
            "Requested {} questions but only {} match the filters",
            plan.count,
            pool.len()
        )));
    }

    let mut picked = match plan.algorithm {
        SelectionAlgorithm::Random => pick_random(pool, plan),
        SelectionAlgorithm::DifficultyBased => pick_by_distribution(pool, plan)?,
        SelectionAlgorithm::Balanced => pick_balanced(pool, plan)?,
        SelectionAlgorithm::PerformanceBased => pick_by_weakness(pool, plan)?,
    };

    if plan.randomize {
        picked.shuffle(&mut rand::thread_rng());
    }
    Ok(picked)
}

fn pick_random(mut pool: Vec<Question>, plan: &SelectionPlan<'_>) -> Vec<Question> {
    if plan.randomize {
        pool.shuffle(&mut rand::thread_rng());
    }
    pool.truncate(plan.count);
    pool
}

fn pick_by_distribution(pool: Vec<Question>, plan: &SelectionPlan<'_>) -> Result<Vec<Question>> {
    let Some(distribution) = plan.difficulty_distribution else {
        return Err(Error::BadRequest(
            "difficulty_based selection requires a difficulty_distribution".to_string(),
        ));
    };
    let sum: i32 = distribution.values().sum();
    if sum as usize != plan.count {
        return Err(Error::BadRequest(format!(
            "difficulty_distribution sums to {} but total_questions is {}",
            sum, plan.count
        )));
    }

    let mut by_level: BTreeMap<i16, Vec<Question>> = BTreeMap::new();
    for q in pool {
        by_level.entry(q.difficulty).or_default().push(q);
    }

    let mut picked = Vec::with_capacity(plan.count);
    for (level, want) in distribution {
        let want = *want as usize;
        if want == 0 {
            continue;
        }
        let level: i16 = level
            .parse()
            .map_err(|_| Error::BadRequest(format!("Invalid difficulty level: {}", level)))?;
        let mut bucket = by_level.remove(&level).unwrap_or_default();
        if bucket.len() < want {
            return Err(Error::InsufficientQuestionPool(format!(
                "Need {} questions at difficulty {} but only {} match",
                want,
                level,
                bucket.len()
            )));
        }
        if plan.randomize {
            bucket.shuffle(&mut rand::thread_rng());
        }
        bucket.truncate(want);
        picked.extend(bucket);
    }
    Ok(picked)
}

fn pick_balanced(pool: Vec<Question>, plan: &SelectionPlan<'_>) -> Result<Vec<Question>> {
    let mut by_category: BTreeMap<String, Vec<Question>> = BTreeMap::new();
    for q in pool {
        by_category.entry(q.category.clone()).or_default().push(q);
    }

    let categories: Vec<String> = match plan.requested_categories {
        Some(requested) if !requested.is_empty() => {
            let mut sorted = requested.to_vec();
            sorted.sort();
            sorted.dedup();
            sorted
        }
        _ => by_category.keys().cloned().collect(),
    };
    if categories.is_empty() {
        return Err(Error::InsufficientQuestionPool(
            "No categories available for balanced selection".to_string(),
        ));
    }

    let targets = spread_evenly(plan.count, categories.len());
    let mut picked = Vec::with_capacity(plan.count);
    for (category, want) in categories.iter().zip(targets) {
        let mut bucket = by_category.remove(category).unwrap_or_default();
        if bucket.len() < want {
            return Err(Error::InsufficientQuestionPool(format!(
                "Need {} questions in category '{}' but only {} match",
                want,
                category,
                bucket.len()
            )));
        }
        if plan.randomize {
            bucket.shuffle(&mut rand::thread_rng());
        }
        bucket.truncate(want);
        picked.extend(bucket);
    }
    Ok(picked)
}

/// Bias selection toward categories where the user's historical accuracy is
/// lowest. Unseen categories get a neutral weight; allocation is by largest
/// remainder over weakness weights, falling back to whatever is available
/// when a weak category runs dry.
fn pick_by_weakness(pool: Vec<Question>, plan: &SelectionPlan<'_>) -> Result<Vec<Question>> {
    let mut by_category: BTreeMap<String, Vec<Question>> = BTreeMap::new();
    for q in pool {
        by_category.entry(q.category.clone()).or_default().push(q);
    }

    let weights: Vec<(String, f64)> = by_category
        .keys()
        .map(|category| {
            let accuracy = plan
                .category_accuracy
                .and_then(|m| m.get(category).copied())
                .unwrap_or(0.5);
            (category.clone(), (1.0 - accuracy).max(0.1))
        })
        .collect();
    let total_weight: f64 = weights.iter().map(|(_, w)| w).sum();

    // Largest-remainder allocation of plan.count across categories.
    let mut allocations: Vec<(String, usize, f64)> = weights
        .iter()
        .map(|(category, w)| {
            let exact = plan.count as f64 * w / total_weight;
            (category.clone(), exact as usize, exact - (exact as usize) as f64)
        })
        .collect();
    let mut allocated: usize = allocations.iter().map(|(_, n, _)| n).sum();
    allocations.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    let mut i = 0;
    while allocated < plan.count && !allocations.is_empty() {
        let len = allocations.len();
        allocations[i % len].1 += 1;
        allocated += 1;
        i += 1;
    }

    let mut picked = Vec::with_capacity(plan.count);
    let mut leftovers: Vec<Question> = Vec::new();
    for (category, want, _) in &allocations {
        let mut bucket = by_category.remove(category).unwrap_or_default();
        if plan.randomize {
            bucket.shuffle(&mut rand::thread_rng());
        }
        let take = (*want).min(bucket.len());
        leftovers.extend(bucket.split_off(take));
        picked.extend(bucket);
    }

    // A weak category may not have enough questions; top up from the rest.
    if picked.len() < plan.count {
        if plan.randomize {
            leftovers.shuffle(&mut rand::thread_rng());
        }
        leftovers.truncate(plan.count - picked.len());
        picked.extend(leftovers);
    }
    picked.sort_by(|a, b| {
        (a.difficulty, a.created_at, a.id).cmp(&(b.difficulty, b.created_at, b.id))
    });
    Ok(picked)
}

fn spread_evenly(count: usize, buckets: usize) -> Vec<usize> {
    let base = count / buckets;
    let extra = count % buckets;
    (0..buckets)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn question(category: &str, difficulty: i16, offset_secs: i64) -> Question {
        let created = Utc::now() + Duration::seconds(offset_secs);
        Question {
            id: Uuid::new_v4(),
            question_type: "multiple_choice".to_string(),
            category: category.to_string(),
            subcategory: None,
            difficulty,
            content: "q".to_string(),
            options: Some(json!(["a", "b"])),
            correct_answer: "a".to_string(),
            explanation: None,
            hints: None,
            tags: json!([]),
            companies: json!([]),
            max_score: 1,
            numeric_tolerance: None,
            is_active: true,
            is_premium: false,
            times_used: 0,
            times_correct: 0,
            created_at: created,
            updated_at: created,
        }
    }

    fn plan(algorithm: SelectionAlgorithm, count: usize) -> SelectionPlan<'static> {
        SelectionPlan {
            algorithm,
            count,
            randomize: false,
            requested_categories: None,
            difficulty_distribution: None,
            category_accuracy: None,
        }
    }

    #[test]
    fn short_pool_is_an_error_not_a_truncation() {
        let pool = vec![question("quant", 1, 0), question("quant", 2, 1)];
        let err = pick_questions(pool, &plan(SelectionAlgorithm::Random, 5)).unwrap_err();
        assert!(matches!(err, Error::InsufficientQuestionPool(_)));
    }

    #[test]
    fn non_randomized_selection_is_deterministic() {
        let pool: Vec<Question> = (0..6)
            .map(|i| question("quant", (i % 3 + 1) as i16, i))
            .collect();
        let first = pick_questions(pool.clone(), &plan(SelectionAlgorithm::Random, 4)).unwrap();
        let second = pick_questions(pool, &plan(SelectionAlgorithm::Random, 4)).unwrap();
        let ids: Vec<_> = first.iter().map(|q| q.id).collect();
        assert_eq!(ids, second.iter().map(|q| q.id).collect::<Vec<_>>());
    }

    #[test]
    fn distribution_must_sum_to_count() {
        let pool: Vec<Question> = (0..10).map(|i| question("quant", 1, i)).collect();
        let distribution: BTreeMap<String, i32> =
            [("1".to_string(), 2), ("2".to_string(), 1)].into();
        let mut p = plan(SelectionAlgorithm::DifficultyBased, 5);
        p.difficulty_distribution = Some(&distribution);
        let err = pick_questions(pool, &p).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn distribution_respected_per_level() {
        let mut pool = Vec::new();
        for level in 1..=3i16 {
            for i in 0..4 {
                pool.push(question("quant", level, i64::from(level) * 10 + i));
            }
        }
        let distribution: BTreeMap<String, i32> =
            [("1".to_string(), 2), ("2".to_string(), 1), ("3".to_string(), 3)].into();
        let mut p = plan(SelectionAlgorithm::DifficultyBased, 6);
        p.difficulty_distribution = Some(&distribution);
        let picked = pick_questions(pool, &p).unwrap();
        assert_eq!(picked.iter().filter(|q| q.difficulty == 1).count(), 2);
        assert_eq!(picked.iter().filter(|q| q.difficulty == 2).count(), 1);
        assert_eq!(picked.iter().filter(|q| q.difficulty == 3).count(), 3);
    }

    #[test]
    fn distribution_shortfall_names_the_level() {
        // Enough questions overall, but more of level 2 requested than exist.
        let pool = vec![question("quant", 1, 0), question("quant", 2, 1)];
        let distribution: BTreeMap<String, i32> = [("2".to_string(), 2)].into();
        let mut p = plan(SelectionAlgorithm::DifficultyBased, 2);
        p.difficulty_distribution = Some(&distribution);
        let err = pick_questions(pool, &p).unwrap_err();
        match err {
            Error::InsufficientQuestionPool(msg) => assert!(msg.contains("difficulty 2")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn balanced_spreads_across_categories() {
        let mut pool = Vec::new();
        for (i, category) in ["logic", "quant", "verbal"].iter().enumerate() {
            for j in 0..4 {
                pool.push(question(category, 2, (i * 10 + j) as i64));
            }
        }
        let picked = pick_questions(pool, &plan(SelectionAlgorithm::Balanced, 7)).unwrap();
        let count_of = |c: &str| picked.iter().filter(|q| q.category == c).count();
        // 7 across 3 categories: 3/2/2 in sorted category order.
        assert_eq!(count_of("logic"), 3);
        assert_eq!(count_of("quant"), 2);
        assert_eq!(count_of("verbal"), 2);
    }

    #[test]
    fn weakness_bias_prefers_low_accuracy_categories() {
        let mut pool = Vec::new();
        for (i, category) in ["strong", "weak"].iter().enumerate() {
            for j in 0..10 {
                pool.push(question(category, 3, (i * 100 + j) as i64));
            }
        }
        let accuracy: BTreeMap<String, f64> =
            [("strong".to_string(), 0.9), ("weak".to_string(), 0.2)].into();
        let mut p = plan(SelectionAlgorithm::PerformanceBased, 9);
        p.category_accuracy = Some(&accuracy);
        let picked = pick_questions(pool, &p).unwrap();
        let weak = picked.iter().filter(|q| q.category == "weak").count();
        let strong = picked.iter().filter(|q| q.category == "strong").count();
        assert_eq!(weak + strong, 9);
        assert!(weak > strong, "expected weak ({weak}) > strong ({strong})");
    }

    #[test]
    fn randomized_selection_keeps_the_requested_size() {
        let pool: Vec<Question> = (0..20).map(|i| question("quant", 3, i)).collect();
        let mut p = plan(SelectionAlgorithm::Random, 8);
        p.randomize = true;
        let picked = pick_questions(pool, &p).unwrap();
        assert_eq!(picked.len(), 8);
        let mut ids: Vec<_> = picked.iter().map(|q| q.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }
}
