use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::application::notify::Caller;

use super::error::ApiError;
use super::state::ApiState;

/// Gate every dispatch route behind the shared admin token. On success a
/// privileged [`Caller`] is inserted into request extensions for handlers
/// to pass down to the dispatch core.
pub async fn admin_auth(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // An unset token must never match; without this an empty header would
    // compare equal to an empty configured secret.
    if state.admin_token.is_empty() {
        return ApiError::unauthenticated().into_response();
    }

    let token = extract_token(request.headers().get(axum::http::header::AUTHORIZATION)).or_else(
        || {
            request
                .headers()
                .get("x-admin-token")
                .and_then(|v| v.to_str().ok().map(|s| s.to_string()))
        },
    );

    let token = match token {
        Some(value) => value,
        None => return ApiError::unauthenticated().into_response(),
    };

    if !token_matches(&token, &state.admin_token) {
        return ApiError::unauthenticated().into_response();
    }

    request
        .extensions_mut()
        .insert(Caller::privileged("admin:panel"));

    next.run(request).await
}

fn extract_token(header: Option<&axum::http::HeaderValue>) -> Option<String> {
    let value = header?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn token_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}
