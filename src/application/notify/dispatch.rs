//! Push dispatch engine.
//!
//! Sends composed messages to one recipient or fans out to many. The bulk
//! path is deliberately sequential: the provider enforces a shared rate
//! limit, and the result sequence must preserve input order. Per-recipient
//! failures are caught and recorded, never raised; one bad recipient must
//! never block delivery to the rest.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::application::repos::{NotificationsRepo, RepoError, UsersRepo};
use crate::domain::entities::NotificationRecord;

use super::composer::{self, NotificationRequest};
use super::provider::{ProviderError, PushProvider};

/// Identity of the caller invoking the dispatch API.
#[derive(Debug, Clone)]
pub struct Caller {
    /// Label recorded as the audit `sender`, e.g. `admin:front-desk`.
    pub actor: String,
    pub privileged: bool,
}

impl Caller {
    pub fn privileged(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            privileged: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("caller is not an authenticated admin")]
    Unauthenticated,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    FailedPrecondition(String),
    #[error("internal dispatch failure: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::FailedPrecondition(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<RepoError> for DispatchError {
    fn from(err: RepoError) -> Self {
        DispatchError::Internal(err.to_string())
    }
}

/// Outcome of one recipient within a bulk dispatch.
#[derive(Debug, Clone)]
pub struct RecipientOutcome {
    pub recipient_id: Uuid,
    pub success: bool,
    pub error: Option<String>,
}

/// Aggregate result of a bulk dispatch. Constructed only after every
/// recipient has been attempted; `successful + failed == total` by
/// construction.
#[derive(Debug, Clone)]
pub struct BulkDispatchResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<RecipientOutcome>,
}

impl BulkDispatchResult {
    fn tally(results: Vec<RecipientOutcome>) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }
}

/// Sends composed messages through the push provider and records the audit
/// trail. Ports are trait objects so tests can script provider behavior.
#[derive(Clone)]
pub struct DispatchService {
    users: Arc<dyn UsersRepo>,
    notifications: Arc<dyn NotificationsRepo>,
    provider: Arc<dyn PushProvider>,
}

impl DispatchService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        notifications: Arc<dyn NotificationsRepo>,
        provider: Arc<dyn PushProvider>,
    ) -> Self {
        Self {
            users,
            notifications,
            provider,
        }
    }

    /// Send one notification. Raises every error in the taxonomy to the
    /// caller with an actionable reason; no retries.
    #[instrument(skip(self, request), fields(recipient = %request.recipient_id))]
    pub async fn send_one(
        &self,
        caller: &Caller,
        request: NotificationRequest,
    ) -> Result<NotificationRecord, DispatchError> {
        if !caller.privileged {
            return Err(DispatchError::Unauthenticated);
        }

        let outcome = self.deliver(&caller.actor, &request).await;
        match &outcome {
            Ok(record) => {
                counter!("rasoio_notify_sent_total").increment(1);
                debug!(
                    notification = %record.id,
                    provider_message = %record.provider_message_id,
                    "notification dispatched"
                );
            }
            Err(err) => {
                counter!("rasoio_notify_failed_total").increment(1);
                debug!(error = %err, "notification dispatch failed");
            }
        }
        outcome
    }

    /// Send the same content to many recipients, sequentially.
    ///
    /// Only the shared gate (authentication, overall argument validation) can
    /// fail the call; per-recipient errors become outcomes.
    #[instrument(skip_all, fields(recipients = recipient_ids.len()))]
    pub async fn send_many(
        &self,
        caller: &Caller,
        recipient_ids: &[Uuid],
        title: &str,
        body: &str,
    ) -> Result<BulkDispatchResult, DispatchError> {
        if !caller.privileged {
            return Err(DispatchError::Unauthenticated);
        }
        if recipient_ids.is_empty() {
            return Err(DispatchError::invalid_argument(
                "recipient list must not be empty",
            ));
        }
        if title.trim().is_empty() {
            return Err(DispatchError::invalid_argument("title must not be empty"));
        }
        if body.trim().is_empty() {
            return Err(DispatchError::invalid_argument("body must not be empty"));
        }

        let mut results = Vec::with_capacity(recipient_ids.len());
        for &recipient_id in recipient_ids {
            let request = NotificationRequest {
                recipient_id,
                title: title.to_string(),
                body: body.to_string(),
                reference_id: None,
            };

            match self.deliver(&caller.actor, &request).await {
                Ok(_) => {
                    counter!("rasoio_notify_sent_total").increment(1);
                    results.push(RecipientOutcome {
                        recipient_id,
                        success: true,
                        error: None,
                    });
                }
                Err(err) => {
                    counter!("rasoio_notify_failed_total").increment(1);
                    debug!(recipient = %recipient_id, error = %err, "bulk recipient failed");
                    results.push(RecipientOutcome {
                        recipient_id,
                        success: false,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        Ok(BulkDispatchResult::tally(results))
    }

    /// Shared single-recipient path: compose, resolve the token, send, repair
    /// stale tokens, persist the audit record. Used by both `send_one` and
    /// `send_many`, so token repair applies in the bulk path too.
    async fn deliver(
        &self,
        actor: &str,
        request: &NotificationRequest,
    ) -> Result<NotificationRecord, DispatchError> {
        let now = OffsetDateTime::now_utc();
        let message = composer::compose(request, now)?;

        let user = self
            .users
            .find_user(request.recipient_id)
            .await?
            .ok_or(DispatchError::NotFound("user"))?;

        let token = user.delivery_token.as_deref().ok_or_else(|| {
            DispatchError::failed_precondition("notifications are not enabled for this user")
        })?;

        let message_id = match self.provider.send(token, &message).await {
            Ok(id) => id,
            Err(ProviderError::TokenNotRegistered) => {
                if let Err(err) = self.users.clear_delivery_token(user.id).await {
                    warn!(user = %user.id, error = %err, "failed to clear stale delivery token");
                }
                return Err(DispatchError::failed_precondition(
                    "delivery token was no longer registered and has been removed",
                ));
            }
            Err(ProviderError::Provider(reason)) => {
                return Err(DispatchError::internal(reason));
            }
            Err(ProviderError::Transport(reason)) => {
                return Err(DispatchError::internal(reason));
            }
        };

        let record = NotificationRecord {
            id: Uuid::new_v4(),
            recipient_id: user.id,
            title: message.title.clone(),
            body: message.body.clone(),
            reference_id: request.reference_id.clone(),
            provider_message_id: message_id.0,
            sender: actor.to_string(),
            sent_at: now,
        };

        self.notifications
            .append_notification(&record)
            .await
            .map_err(|err| {
                // Provider already accepted the send; the audit gap is worth a
                // loud log even though the caller only sees Internal.
                warn!(notification = %record.id, error = %err, "audit append failed after accepted send");
                DispatchError::from(err)
            })?;

        Ok(record)
    }
}
