//! Domain records read and written by the dispatch core.
//!
//! The booking product owns the full `users` schema; this core only touches
//! the delivery-token fields. `NotificationRecord` is the append-only audit
//! row written after a provider accepts a send.

use time::OffsetDateTime;
use uuid::Uuid;

/// A booking-platform user, projected down to the fields the dispatch core
/// reads. At most one delivery token exists per user; the registration flow
/// (out of scope here) overwrites it on re-registration.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub display_name: String,
    /// Opaque provider token enabling push delivery to this user's device.
    /// `None` means the user never enabled notifications, or the token was
    /// repaired away after the provider reported it unregistered.
    pub delivery_token: Option<String>,
    pub token_updated_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Immutable audit record of an accepted push send.
///
/// Written only after the provider returned a message id; never updated or
/// deleted by this core.
#[derive(Debug, Clone)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub title: String,
    pub body: String,
    /// Appointment reference carried in the push payload, when present.
    pub reference_id: Option<String>,
    pub provider_message_id: String,
    /// Identity of the privileged caller that triggered the send.
    pub sender: String,
    pub sent_at: OffsetDateTime,
}
