use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use aptitude_backend::{config::Config, database::pool::create_pool, routes, AppState};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::{timeout::TimeoutLayer, BoxError, ServiceBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aptitude_backend=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let pool = create_pool(&config).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool, config.clone());

    // Sessions left idle past the grace window are swept to `abandoned` in
    // the background; expiry itself stays lazy.
    {
        let state = app_state.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = state
                    .session_service
                    .abandon_idle(state.config.abandon_after_minutes)
                    .await
                {
                    tracing::error!(error = ?e, "Abandon sweep error");
                }
                tokio::time::sleep(Duration::from_secs(300)).await;
            }
        });
    }

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let session_api = Router::new()
        .route(
            "/aptitude/sessions",
            get(routes::sessions::list_sessions).post(routes::sessions::create_session),
        )
        .route(
            "/aptitude/sessions/:id/start",
            post(routes::sessions::start_session),
        )
        .route(
            "/aptitude/sessions/:id/current-question",
            get(routes::sessions::current_question),
        )
        .route(
            "/aptitude/sessions/:id/submit",
            post(routes::sessions::submit_answer),
        )
        .route(
            "/aptitude/sessions/:id/pause",
            post(routes::sessions::pause_session),
        )
        .route(
            "/aptitude/sessions/:id/resume",
            post(routes::sessions::resume_session),
        )
        .route(
            "/aptitude/sessions/:id/progress",
            get(routes::sessions::session_progress),
        )
        .route(
            "/aptitude/sessions/:id/results",
            get(routes::sessions::session_results),
        )
        .route(
            "/aptitude/analytics/performance",
            get(routes::analytics::performance),
        )
        .route(
            "/aptitude/available-filters",
            get(routes::sessions::available_filters),
        )
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            aptitude_backend::middleware::auth::require_bearer_auth,
        ));

    let admin_api = Router::new()
        .route(
            "/aptitude/questions",
            get(routes::questions::list_questions).post(routes::questions::create_question),
        )
        .route(
            "/aptitude/questions/:id",
            get(routes::questions::get_question).patch(routes::questions::update_question),
        )
        .route(
            "/aptitude/admin/abandon-idle",
            post(routes::sessions::abandon_idle),
        )
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            aptitude_backend::middleware::auth::require_admin,
        ));

    let app = base_routes
        .merge(session_api)
        .merge(admin_api)
        .with_state(app_state)
        .layer(axum::middleware::from_fn_with_state(
            aptitude_backend::middleware::rate_limit::new_rps_state(config.api_rps),
            aptitude_backend::middleware::rate_limit::rps_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|_: BoxError| async {
                    StatusCode::REQUEST_TIMEOUT
                }))
                .layer(TimeoutLayer::new(Duration::from_secs(30))),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
