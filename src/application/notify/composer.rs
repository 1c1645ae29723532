//! Notification composition.
//!
//! Turns a validated `NotificationRequest` into a provider-ready message:
//! display text, a structured payload with a derived deep link, and the
//! platform presentation hints the booking PWA expects. Pure, no I/O.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::dispatch::DispatchError;

const ICON_PATH: &str = "/icons/icon-192.png";
const BADGE_PATH: &str = "/icons/badge-72.png";
const VIBRATION_PATTERN: [u32; 3] = [100, 50, 100];

/// A single notification to be dispatched to one recipient.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub recipient_id: Uuid,
    pub title: String,
    pub body: String,
    /// Appointment reference; drives the deep link and collapse tag.
    pub reference_id: Option<String>,
}

/// Provider-ready message. The delivery token is resolved separately by the
/// dispatch engine and handed to the provider alongside this message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub payload: PushPayload,
    pub hints: PresentationHints,
}

/// Structured payload delivered with the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// In-app path opened when the notification is tapped.
    pub link: String,
    /// Collapse tag; notifications with the same tag replace each other.
    pub tag: String,
}

/// Platform presentation hints (fixed provider contract).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresentationHints {
    pub icon: String,
    pub badge: String,
    pub vibration: Vec<u32>,
    pub click_link: String,
}

/// Compose a provider message from a notification request.
///
/// Fails with `InvalidArgument` when the trimmed title or body is empty.
/// Deterministic for a fixed `now`: the collapse tag derives from the
/// reference id when present, otherwise from `now`.
pub fn compose(
    request: &NotificationRequest,
    now: OffsetDateTime,
) -> Result<PushMessage, DispatchError> {
    let title = request.title.trim();
    let body = request.body.trim();

    if title.is_empty() {
        return Err(DispatchError::invalid_argument("title must not be empty"));
    }
    if body.is_empty() {
        return Err(DispatchError::invalid_argument("body must not be empty"));
    }

    let link = match request.reference_id.as_deref() {
        Some(reference) => format!("/appointments/{reference}"),
        None => "/".to_string(),
    };

    let tag = match request.reference_id.as_deref() {
        Some(reference) => format!("appointment-{reference}"),
        None => format!("notify-{}", now.unix_timestamp()),
    };

    Ok(PushMessage {
        title: title.to_string(),
        body: body.to_string(),
        payload: PushPayload {
            reference_id: request.reference_id.clone(),
            link: link.clone(),
            tag,
        },
        hints: PresentationHints {
            icon: ICON_PATH.to_string(),
            badge: BADGE_PATH.to_string(),
            vibration: VIBRATION_PATTERN.to_vec(),
            click_link: link,
        },
    })
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn request(title: &str, body: &str, reference: Option<&str>) -> NotificationRequest {
        NotificationRequest {
            recipient_id: Uuid::nil(),
            title: title.to_string(),
            body: body.to_string(),
            reference_id: reference.map(str::to_string),
        }
    }

    #[test]
    fn rejects_empty_title() {
        let err = compose(&request("  ", "body", None), OffsetDateTime::now_utc())
            .expect_err("empty title");
        assert!(matches!(err, DispatchError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_empty_body() {
        let err = compose(&request("title", "", None), OffsetDateTime::now_utc())
            .expect_err("empty body");
        assert!(matches!(err, DispatchError::InvalidArgument(_)));
    }

    #[test]
    fn reference_drives_deep_link_and_tag() {
        let message = compose(
            &request("Cut confirmed", "See you at 10:00", Some("apt-42")),
            OffsetDateTime::now_utc(),
        )
        .expect("compose");

        assert_eq!(message.payload.link, "/appointments/apt-42");
        assert_eq!(message.payload.tag, "appointment-apt-42");
        assert_eq!(message.hints.click_link, "/appointments/apt-42");
    }

    #[test]
    fn no_reference_links_to_landing_page() {
        let now = datetime!(2025-06-01 12:00 UTC);
        let message = compose(&request("Hello", "World", None), now).expect("compose");

        assert_eq!(message.payload.link, "/");
        assert_eq!(message.payload.tag, format!("notify-{}", now.unix_timestamp()));
    }

    #[test]
    fn compose_is_idempotent_for_fixed_instant() {
        let now = datetime!(2025-06-01 12:00 UTC);
        let req = request("Cut confirmed", "See you", Some("apt-7"));

        let first = compose(&req, now).expect("compose");
        let second = compose(&req, now).expect("compose");
        assert_eq!(first, second);
    }

    #[test]
    fn trims_display_text() {
        let message = compose(
            &request("  Cut confirmed  ", "  body  ", None),
            OffsetDateTime::now_utc(),
        )
        .expect("compose");

        assert_eq!(message.title, "Cut confirmed");
        assert_eq!(message.body, "body");
    }
}
