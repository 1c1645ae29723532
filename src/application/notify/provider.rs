//! Push provider port.

use async_trait::async_trait;
use thiserror::Error;

use super::composer::PushMessage;

/// Provider-assigned identifier of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessageId(pub String);

impl std::fmt::Display for ProviderMessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider reported the delivery token as permanently unregistered.
    /// The dispatch engine repairs the stale token on this error.
    #[error("delivery token is no longer registered with the provider")]
    TokenNotRegistered,
    /// The provider rejected the message for any other reason.
    #[error("provider rejected message: {0}")]
    Provider(String),
    /// The provider could not be reached.
    #[error("provider transport failure: {0}")]
    Transport(String),
}

/// Outbound push-messaging provider.
///
/// The wire schema (title/body/structured data/presentation hints) is a fixed
/// external contract; adapters only translate `PushMessage` into it.
#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn send(
        &self,
        token: &str,
        message: &PushMessage,
    ) -> Result<ProviderMessageId, ProviderError>;
}
