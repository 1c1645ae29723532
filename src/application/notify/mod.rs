//! Notification composition and dispatch.

pub mod composer;
pub mod dispatch;
pub mod provider;

pub use composer::{NotificationRequest, PresentationHints, PushMessage, PushPayload, compose};
pub use dispatch::{
    BulkDispatchResult, Caller, DispatchError, DispatchService, RecipientOutcome,
};
pub use provider::{ProviderError, ProviderMessageId, PushProvider};
