//! Identity-provider boundary

use std::future::Future;

use chatseal_core::Identity;
use secrecy::SecretString;

/// A signed-in session as reported by the identity provider.
///
/// `token` rotates on every credential refresh. It is carried for the
/// provider's own use and never reaches key derivation.
#[derive(Clone)]
pub struct IdentitySession {
    pub identity: Identity,
    pub token: SecretString,
}

impl IdentitySession {
    pub fn new(identity: Identity, token: impl Into<String>) -> Self {
        Self {
            identity,
            token: SecretString::from(token.into()),
        }
    }
}

impl std::fmt::Debug for IdentitySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySession")
            .field("identity", &self.identity)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Notifications from the identity provider
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Interactive sign-in completed
    Established(IdentitySession),
    /// Silent credential refresh (page load, token rotation)
    Refreshed(IdentitySession),
    /// The user signed out or the session expired
    Ended,
}

/// The external identity provider
pub trait IdentityProvider: Send + Sync {
    /// The currently signed-in session, if any
    fn current_session(&self) -> Option<IdentitySession>;

    /// End the provider-side session
    fn sign_out(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
}
