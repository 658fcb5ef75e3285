use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceQuery {
    #[serde(default)]
    pub days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAccuracy {
    pub attempted: i64,
    pub correct: i64,
    pub accuracy: f64,
    pub average_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceAnalyticsResponse {
    pub days: i64,
    pub sessions_completed: i64,
    pub questions_attempted: i64,
    pub correct: i64,
    pub accuracy: f64,
    pub average_time: f64,
    pub category_accuracy: BTreeMap<String, CategoryAccuracy>,
    pub difficulty_accuracy: BTreeMap<String, CategoryAccuracy>,
}
