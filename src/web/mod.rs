//! The HTTP surface: router assembly, shared state, and the serve loop.
//! Everything under `/api/v1` except the status probe requires the
//! `x-access-key` header; key management additionally requires admin
//! HTTP Basic credentials.

pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod response_types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::watch;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::Api;
use crate::error::{HoustonError, Result};
use rate_limit::IpRateLimiter;
use response_types::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<Api>,
    pub limiter: Arc<IpRateLimiter>,
}

/// Assemble the full route table: keyed routes, admin routes, and the
/// unauthenticated status probe, all behind the rate limiter and a panic
/// shim.
pub fn build_router(state: AppState) -> Router {
    let keyed = Router::new()
        .route("/plans/", get(handlers::plans::get_plans))
        .route("/plans", post(handlers::plans::post_plan))
        .route(
            "/plans/:name",
            get(handlers::plans::get_plan).delete(handlers::plans::delete_plan),
        )
        .route("/plans/:name/m", get(handlers::plans::get_plan_as_mission))
        .route(
            "/plans/:name/missions",
            get(handlers::plans::get_plan_missions),
        )
        .route("/missions/", get(handlers::missions::get_missions))
        .route("/missions", post(handlers::missions::post_mission))
        .route(
            "/missions/:id",
            get(handlers::missions::get_mission).delete(handlers::missions::delete_mission),
        )
        .route(
            "/missions/:id/report",
            get(handlers::missions::get_mission_report),
        )
        .route(
            "/missions/:id/stages/:name",
            post(handlers::missions::post_mission_stage),
        )
        .route(
            "/completed",
            get(handlers::missions::get_completed_missions),
        )
        .route("/key", get(handlers::keys::get_key))
        .route_layer(from_fn_with_state(state.clone(), middleware::check_key));

    let admin = Router::new()
        .route(
            "/key",
            post(handlers::keys::post_key).delete(handlers::keys::delete_key),
        )
        .route("/key/all", get(handlers::keys::list_keys))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::check_admin_password,
        ));

    Router::new()
        .route("/api/v1", get(handlers::status::get_status))
        .nest("/api/v1", keyed.merge(admin))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A panicking handler becomes a 500 with the standard error body; the
/// process keeps serving.
fn handle_panic(_err: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    ApiError(HoustonError::Internal).into_response()
}

/// Bind and serve until the process ends. Spawns the rate-limiter cleanup
/// task tied to the given shutdown signal.
pub async fn serve(api: Arc<Api>, shutdown: watch::Receiver<bool>) -> Result<()> {
    let limiter = Arc::new(IpRateLimiter::default());
    rate_limit::spawn_cleanup(Arc::clone(&limiter), shutdown);

    let port = api.config().port;
    let state = AppState { api, limiter };
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| HoustonError::Configuration(format!("could not bind port {port}: {e}")))?;

    info!("ready to receive calls on http://localhost:{port}/api/v1");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "server exited with error");
        HoustonError::Internal
    })
}
