//! HTTP push provider adapter.
//!
//! Translates `PushMessage` into the provider's fixed wire schema and maps
//! its error codes back into the `ProviderError` taxonomy. The provider's
//! "token not registered" code is the one the dispatch engine acts on.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::debug;

use crate::application::notify::{ProviderError, ProviderMessageId, PushMessage, PushProvider};

/// Provider error codes meaning the token is permanently gone.
const UNREGISTERED_CODES: &[&str] = &[
    "UNREGISTERED",
    "NotRegistered",
    "InvalidRegistration",
    "registration-token-not-registered",
];

pub struct HttpPushProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpPushProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    fn wire_body(token: &str, message: &PushMessage) -> Value {
        json!({
            "to": token,
            "notification": {
                "title": message.title,
                "body": message.body,
                "icon": message.hints.icon,
                "badge": message.hints.badge,
                "vibrate": message.hints.vibration,
                "tag": message.payload.tag,
                "click_action": message.hints.click_link,
            },
            "data": {
                "reference_id": message.payload.reference_id,
                "link": message.payload.link,
            },
        })
    }
}

#[async_trait]
impl PushProvider for HttpPushProvider {
    async fn send(
        &self,
        token: &str,
        message: &PushMessage,
    ) -> Result<ProviderMessageId, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, format!("key={}", self.api_key))
            .json(&Self::wire_body(token, message))
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        debug!(status = status.as_u16(), "push provider responded");
        interpret_response(status, &body)
    }
}

/// Map a provider response into the port's result. Pure; factored out so the
/// code mapping stays testable without a live endpoint.
fn interpret_response(status: StatusCode, body: &Value) -> Result<ProviderMessageId, ProviderError> {
    let error_code = body
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(code) = error_code {
        if UNREGISTERED_CODES.contains(&code.as_str()) {
            return Err(ProviderError::TokenNotRegistered);
        }
        return Err(ProviderError::Provider(code));
    }

    if !status.is_success() {
        return Err(ProviderError::Provider(format!(
            "provider returned status {status}"
        )));
    }

    body.get("message_id")
        .and_then(Value::as_str)
        .map(|id| ProviderMessageId(id.to_string()))
        .ok_or_else(|| {
            ProviderError::Provider("provider response missing message_id".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_response_yields_message_id() {
        let body = json!({"message_id": "m-123"});
        let id = interpret_response(StatusCode::OK, &body).expect("accepted");
        assert_eq!(id, ProviderMessageId("m-123".to_string()));
    }

    #[test]
    fn unregistered_codes_map_to_token_not_registered() {
        for code in ["UNREGISTERED", "NotRegistered", "InvalidRegistration"] {
            let body = json!({ "error": code });
            let err = interpret_response(StatusCode::NOT_FOUND, &body).expect_err("error");
            assert!(matches!(err, ProviderError::TokenNotRegistered), "code {code}");
        }
    }

    #[test]
    fn other_error_codes_carry_the_provider_message() {
        let body = json!({"error": "QuotaExceeded"});
        let err = interpret_response(StatusCode::TOO_MANY_REQUESTS, &body).expect_err("error");
        match err {
            ProviderError::Provider(code) => assert_eq!(code, "QuotaExceeded"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_success_without_code_is_a_provider_error() {
        let body = json!({});
        let err = interpret_response(StatusCode::BAD_GATEWAY, &body).expect_err("error");
        assert!(matches!(err, ProviderError::Provider(_)));
    }
}
