//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{NotificationRecord, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Read/repair access to the `users` collection, scoped to the delivery-token
/// fields this core owns.
#[async_trait]
pub trait UsersRepo: Send + Sync {
    /// Fetch a user by id; `Ok(None)` when no such user exists.
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    /// Remove the user's delivery token. Used when the provider reports the
    /// token as permanently unregistered. Succeeds even if no token is set.
    async fn clear_delivery_token(&self, id: Uuid) -> Result<(), RepoError>;

    /// Register or replace the user's delivery token (latest wins).
    async fn set_delivery_token(&self, id: Uuid, token: &str) -> Result<(), RepoError>;
}

/// Append-only access to the `notifications` audit log.
#[async_trait]
pub trait NotificationsRepo: Send + Sync {
    async fn append_notification(&self, record: &NotificationRecord) -> Result<(), RepoError>;

    /// Most recent audit records, newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<NotificationRecord>, RepoError>;
}
