pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::middleware::log_responses;

pub fn build_api_router(state: ApiState) -> Router {
    let auth_state = state.clone();

    Router::new()
        .route(
            "/api/v1/notifications",
            get(handlers::list_notifications).post(handlers::send_notification),
        )
        .route("/api/v1/notifications/bulk", post(handlers::bulk_send))
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            middleware::admin_auth,
        ))
        // Health stays outside the auth gate so probes need no credentials.
        .route("/api/v1/healthz", get(handlers::healthz))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
}
