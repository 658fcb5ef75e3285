use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
    Extension,
};

use crate::{
    dto::analytics_dto::PerformanceQuery, error::Result, middleware::auth::Claims, AppState,
};

#[axum::debug_handler]
pub async fn performance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PerformanceQuery>,
) -> Result<impl IntoResponse> {
    let report = state
        .analytics_service
        .performance(claims.user_id()?, query.days)
        .await?;
    Ok(Json(report))
}
