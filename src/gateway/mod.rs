pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::websocket::ws_handler;
use middleware::jwt_auth_middleware;
use state::AppState;

/// Assemble the full application router
pub fn build_router(state: Arc<AppState>) -> Router {
    // ==========================================================================
    // User Routes (public)
    // ==========================================================================
    let user_routes = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/verify/{token}", get(handlers::verify_email))
        .route("/forgot-password", post(handlers::forgot_password))
        .route("/reset-password/{token}", post(handlers::reset_password))
        .route("/resend-verification", post(handlers::resend_email_verification));

    let profile_routes = Router::new()
        .route("/me", get(handlers::me))
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    // ==========================================================================
    // Transaction Routes - Protected by JWT, except the emailed verify link
    // ==========================================================================
    let transaction_routes = Router::new()
        .route("/", get(handlers::list_completed))
        .route("/send", post(handlers::send_money))
        .route("/request", post(handlers::request_money))
        .route("/requested", get(handlers::list_requested))
        .route("/{id}", get(handlers::get_transaction))
        .route("/{id}/approve", post(handlers::approve_request))
        .route("/{id}/reject", post(handlers::reject_request))
        .route("/{id}/resend", post(handlers::resend_verification))
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
        .route("/verify/{token}", get(handlers::verify_transfer));

    let card_routes = Router::new()
        .route("/", get(handlers::get_card).post(handlers::request_card))
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
        .route("/verify/{token}", get(handlers::verify_card));

    let notification_routes = Router::new()
        .route("/", get(handlers::list_notifications))
        .route("/{id}/read", post(handlers::mark_read))
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let app = Router::new()
        // WebSocket endpoint (authenticates itself: ?token= or Bearer)
        .route("/ws", get(ws_handler))
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/api/v1/users", user_routes.merge(profile_routes))
        .nest("/api/v1/transactions", transaction_routes)
        .nest("/api/v1/cards", card_routes)
        .nest("/api/v1/notifications", notification_routes);

    // [SECURITY] Mock API routes - only compiled when 'mock-api' feature is enabled.
    // Production builds MUST be compiled with `--no-default-features` to exclude this.
    #[cfg(feature = "mock-api")]
    let app = app.nest(
        "/internal/mock",
        Router::new()
            .route("/deposit", post(handlers::mock::mock_deposit))
            .layer(from_fn_with_state(state.clone(), jwt_auth_middleware)),
    );

    app.with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start HTTP Gateway server; returns when the listener fails
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {} (port in use?)", addr, e))?;

    info!("Gateway listening on http://{}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);
    info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
