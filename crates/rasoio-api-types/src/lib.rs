//! Shared wire types for the Rasoio notification dispatch API.
//!
//! These types are consumed by the server's admin API layer and by external
//! callers (admin panel, operational tooling). They carry no behavior beyond
//! serde derives so that downstream crates stay light.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Request body for `POST /api/v1/notifications`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendNotificationRequest {
    /// Recipient user id.
    pub recipient_id: Uuid,
    /// Notification display title.
    pub title: String,
    /// Notification display body.
    pub body: String,
    /// Optional appointment reference carried into the push payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
}

/// Response body for a successful single send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendNotificationResponse {
    /// Provider-assigned message id.
    pub message_id: String,
    /// The persisted audit record.
    pub notification: NotificationView,
}

/// Request body for `POST /api/v1/notifications/bulk`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSendRequest {
    /// Recipient user ids, attempted in order.
    pub recipient_ids: Vec<Uuid>,
    pub title: String,
    pub body: String,
}

/// Per-recipient outcome within a bulk dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientOutcome {
    pub recipient_id: Uuid,
    pub success: bool,
    /// Human-readable failure reason; absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response body for a bulk dispatch. `successful + failed == total`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSendResponse {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Outcomes in the same order as the requested recipients.
    pub results: Vec<RecipientOutcome>,
}

/// Read model of a persisted notification audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationView {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    pub provider_message_id: String,
    pub sender: String,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

/// List envelope for `GET /api/v1/notifications`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationListResponse {
    pub items: Vec<NotificationView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_response_round_trips() {
        let response = BulkSendResponse {
            total: 2,
            successful: 1,
            failed: 1,
            results: vec![
                RecipientOutcome {
                    recipient_id: Uuid::nil(),
                    success: true,
                    error: None,
                },
                RecipientOutcome {
                    recipient_id: Uuid::nil(),
                    success: false,
                    error: Some("no delivery token".to_string()),
                },
            ],
        };

        let json = serde_json::to_string(&response).expect("serialize");
        let parsed: BulkSendResponse = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.total, 2);
        assert_eq!(parsed.results.len(), 2);
        assert!(parsed.results[0].error.is_none());
    }

    #[test]
    fn send_request_reference_is_optional() {
        let json = r#"{"recipient_id":"00000000-0000-0000-0000-000000000000","title":"t","body":"b"}"#;
        let parsed: SendNotificationRequest = serde_json::from_str(json).expect("deserialize");
        assert!(parsed.reference_id.is_none());
    }
}
