//! Origin fetcher: the edge router's live-network port, backed by reqwest.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request};
use axum::response::Response;
use tracing::debug;

use crate::edge::{EdgeRequest, FetchError, FetchedResponse, Fetcher};
use crate::infra::http::OriginProxy;

const MAX_PROXY_BODY_BYTES: usize = 32 * 1024 * 1024;

pub struct OriginFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl OriginFetcher {
    /// `base_url` must not end with a slash; request paths start with one.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn url_for(&self, request: &EdgeRequest) -> String {
        format!("{}{}", self.base_url, request.path_and_query)
    }
}

#[async_trait]
impl Fetcher for OriginFetcher {
    async fn fetch(&self, request: &EdgeRequest) -> Result<FetchedResponse, FetchError> {
        let url = self.url_for(request);
        debug!(%url, "fetching origin");

        let response = self
            .client
            .request(request.method.clone(), &url)
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        Ok(FetchedResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl OriginProxy for OriginFetcher {
    async fn forward(&self, request: Request<Body>) -> Result<Response, FetchError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!(%url, method = %parts.method, "proxying to origin");

        let body = axum::body::to_bytes(body, MAX_PROXY_BODY_BYTES)
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let response = self
            .client
            .request(parts.method, &url)
            .headers(forwardable_headers(&parts.headers))
            .body(body)
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let status = response.status();
        let headers = forwardable_headers(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let mut proxied = Response::builder()
            .status(status)
            .body(Body::from(bytes))
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        proxied.headers_mut().extend(headers);
        Ok(proxied)
    }
}

/// End-to-end headers only; framing and connection headers are recomputed
/// on each leg.
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in headers {
        if is_hop_by_hop(name) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "host"
            | "content-length"
    )
}

#[cfg(test)]
mod tests {
    use axum::http::Method;

    use super::*;

    #[test]
    fn hop_by_hop_headers_are_not_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("x-booking-client", "web".parse().unwrap());
        headers.insert("host", "edge.local".parse().unwrap());
        headers.insert("connection", "keep-alive".parse().unwrap());
        headers.insert("content-length", "33".parse().unwrap());

        let forwarded = forwardable_headers(&headers);
        assert!(forwarded.contains_key("content-type"));
        assert!(forwarded.contains_key("x-booking-client"));
        assert!(!forwarded.contains_key("host"));
        assert!(!forwarded.contains_key("connection"));
        assert!(!forwarded.contains_key("content-length"));
    }

    #[test]
    fn base_url_trailing_slashes_are_stripped() {
        let fetcher = OriginFetcher::new("http://origin.internal:8080//");
        let request = EdgeRequest {
            method: Method::GET,
            path_and_query: "/services?category=beard".to_string(),
        };
        assert_eq!(
            fetcher.url_for(&request),
            "http://origin.internal:8080/services?category=beard"
        );
    }
}
