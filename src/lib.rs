pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::services::{
    analytics_service::AnalyticsService, question_service::QuestionService,
    selector_service::QuestionSelector, session_service::SessionService,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub session_service: SessionService,
    pub selector: QuestionSelector,
    pub question_service: QuestionService,
    pub analytics_service: AnalyticsService,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let session_service = SessionService::new(pool.clone());
        let selector = QuestionSelector::new(pool.clone());
        let question_service = QuestionService::new(pool.clone());
        let analytics_service = AnalyticsService::new(pool.clone());

        Self {
            pool,
            config: Arc::new(config),
            session_service,
            selector,
            question_service,
            analytics_service,
        }
    }
}
