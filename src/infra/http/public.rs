use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode, header::CONTENT_TYPE},
    middleware,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::edge::{
    EdgeConfig, EdgeRequest, EdgeRouter, FetchError, Fetcher, LifecycleController, RequestClass,
    ServedResponse, classify,
};

use super::middleware::{log_responses, set_request_context};

/// Header exposing where the served bytes came from (`live`, `cache`,
/// `fallback`, `miss`).
pub const SOURCE_HEADER: &str = "x-rasoio-source";

/// Port for requests the edge does not intercept. Unlike [`Fetcher`], the
/// full request (method, headers, body) is forwarded and the origin's
/// response is returned verbatim, so mutating traffic passes through intact.
#[async_trait]
pub trait OriginProxy: Send + Sync {
    async fn forward(&self, request: Request<Body>) -> Result<Response, FetchError>;
}

#[derive(Clone)]
pub struct PublicState {
    pub router: Arc<EdgeRouter>,
    pub fetcher: Arc<dyn Fetcher>,
    pub proxy: Arc<dyn OriginProxy>,
    pub lifecycle: Arc<LifecycleController>,
    pub config: EdgeConfig,
}

/// Every public request funnels through the edge entry; there are no
/// path-specific routes on this listener.
pub fn build_public_router(state: PublicState) -> Router {
    Router::new()
        .fallback(edge_entry)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn edge_entry(State(state): State<PublicState>, request: Request<Body>) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let mut class = classify(&method, &uri, &state.config);

    // Non-intercepted traffic (POSTed bookings included) is proxied whole;
    // the body-less fetch port would silently drop request bodies.
    if class == RequestClass::Ignore {
        return match state.proxy.forward(request).await {
            Ok(response) => response,
            Err(FetchError::Transport(reason)) => {
                warn!(path = uri.path(), reason, "origin unreachable for proxied request");
                StatusCode::BAD_GATEWAY.into_response()
            }
        };
    }

    // Until activation completes the stores may hold a partial precache;
    // serve everything live rather than from a half-built cache.
    if !state.lifecycle.is_active()
        && matches!(
            class,
            RequestClass::MediaCacheFirst | RequestClass::DocumentNetworkFirst
        )
    {
        warn!(
            state = state.lifecycle.state().as_str(),
            path = uri.path(),
            "edge not active, passing request through"
        );
        class = RequestClass::LivePassthrough;
    }

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let served = state
        .router
        .route(
            state.fetcher.as_ref(),
            &EdgeRequest {
                method,
                path_and_query,
            },
            class,
        )
        .await;

    to_response(served)
}

fn to_response(served: ServedResponse) -> Response {
    let status = StatusCode::from_u16(served.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, served.body).into_response();

    if let Some(content_type) = served
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response.headers_mut().insert(
        SOURCE_HEADER,
        HeaderValue::from_static(served.source.as_str()),
    );

    response
}
