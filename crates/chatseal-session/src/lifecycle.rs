//! Key lifecycle: keeps the ChatCrypto key in sync with identity events
//!
//! Transitions:
//!   Established / Refreshed → initialize (serialized, idempotent per identity)
//!   Ended / sign_out / drop  → clear (synchronous, wins over in-flight derivation)
//!
//! Readiness is published on a `watch` channel so the send path can be
//! gated until the key exists.

use std::time::Duration;

use chatseal_core::config::SessionConfig;
use chatseal_core::{ChatSealError, ChatSealResult};
use chatseal_crypto::{user_fingerprint, ChatCrypto};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::identity::{IdentityProvider, IdentitySession, SessionEvent};

pub struct KeyLifecycle {
    crypto: ChatCrypto,
    ready_tx: watch::Sender<bool>,
    /// Serializes initialize transitions; `clear` never waits on it
    transition: Mutex<()>,
    ready_timeout: Duration,
}

impl KeyLifecycle {
    pub fn new(crypto: ChatCrypto) -> Self {
        Self::with_config(crypto, &SessionConfig::default())
    }

    pub fn with_config(crypto: ChatCrypto, config: &SessionConfig) -> Self {
        let (ready_tx, _) = watch::channel(crypto.is_ready());
        Self {
            crypto,
            ready_tx,
            transition: Mutex::new(()),
            ready_timeout: Duration::from_millis(config.ready_timeout_ms),
        }
    }

    /// Handle to hand to the message-storage layer.
    ///
    /// Key transitions belong to this coordinator. Calling `initialize` or
    /// `clear` on the handle directly is not published to subscribers,
    /// though `is_ready` and `wait_ready` still read the handle's state.
    pub fn crypto(&self) -> &ChatCrypto {
        &self.crypto
    }

    /// The "crypto ready" flag shown to the UI
    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow() && self.crypto.is_ready()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    /// Sign-in or silent refresh: derive the key for this identity.
    ///
    /// On failure the flag stays false and the error is returned so the
    /// caller can prompt re-authentication.
    pub async fn session_established(&self, session: &IdentitySession) -> ChatSealResult<()> {
        let _guard = self.transition.lock().await;
        let user = user_fingerprint(&session.identity.user_id);
        debug!(user = %user, "identity session established");

        let result = self.crypto.initialize(&session.identity).await;
        self.publish_ready();

        match &result {
            Ok(()) => info!(user = %user, "message encryption ready"),
            Err(e) => warn!(user = %user, error = %e, "message encryption unavailable"),
        }
        result
    }

    /// Sign-out: drop the key before anything else happens.
    pub fn session_ended(&self) {
        self.ready_tx.send_modify(|ready| {
            self.crypto.clear();
            *ready = false;
        });
        info!("identity session ended, message encryption disabled");
    }

    pub async fn handle(&self, event: SessionEvent) -> ChatSealResult<()> {
        match event {
            SessionEvent::Established(session) | SessionEvent::Refreshed(session) => {
                self.session_established(&session).await
            }
            SessionEvent::Ended => {
                self.session_ended();
                Ok(())
            }
        }
    }

    /// Drain identity events until the provider closes the stream, then
    /// clear the key: it must not outlive the app context.
    pub async fn run(&self, mut events: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle(event).await {
                warn!(error = %e, recoverable = e.is_recoverable(), "session event failed");
            }
        }
        debug!("identity event stream closed");
        self.session_ended();
    }

    /// Page-load restore: pick up whatever session the provider already has.
    ///
    /// Returns whether encryption is ready afterwards.
    pub async fn restore<P: IdentityProvider>(&self, provider: &P) -> ChatSealResult<bool> {
        match provider.current_session() {
            Some(session) => {
                self.session_established(&session).await?;
                Ok(self.is_ready())
            }
            None => {
                self.session_ended();
                Ok(false)
            }
        }
    }

    /// Clear the key, then sign out of the identity provider.
    pub async fn sign_out<P: IdentityProvider>(&self, provider: &P) -> ChatSealResult<()> {
        self.session_ended();
        provider.sign_out().await.map_err(ChatSealError::from)
    }

    /// Wait for the key, up to the configured timeout.
    ///
    /// Returns `KeyNotReady` on timeout instead of hanging the caller.
    pub async fn wait_ready(&self) -> ChatSealResult<()> {
        let mut rx = self.ready_tx.subscribe();
        let waiting = rx.wait_for(|ready| *ready && self.crypto.is_ready());
        let ready = tokio::time::timeout(self.ready_timeout, waiting)
            .await
            .is_ok_and(|waited| waited.is_ok());
        if ready {
            Ok(())
        } else {
            Err(ChatSealError::KeyNotReady)
        }
    }

    fn publish_ready(&self) {
        // Under the watch lock, so a concurrent session_ended cannot be
        // overwritten by a stale `true`.
        self.ready_tx.send_if_modified(|ready| {
            let now = self.crypto.is_ready();
            let changed = *ready != now;
            *ready = now;
            changed
        });
    }
}

impl Drop for KeyLifecycle {
    fn drop(&mut self) {
        self.crypto.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatseal_core::{Identity, TextEncoding};
    use chatseal_crypto::{CryptoSettings, KdfParams};
    use secrecy::SecretString;

    fn test_lifecycle() -> KeyLifecycle {
        let crypto = ChatCrypto::new(
            SecretString::from("lifecycle-secret"),
            CryptoSettings {
                kdf: KdfParams {
                    iterations: 1_000,
                    salt_len: 16,
                },
                encoding: TextEncoding::Hex,
                unreadable_placeholder: "[unreadable]".into(),
            },
        );
        KeyLifecycle::with_config(crypto, &SessionConfig { ready_timeout_ms: 200 })
    }

    fn session(token: &str) -> IdentitySession {
        IdentitySession::new(Identity::new("u1", "a@x.com"), token)
    }

    #[tokio::test]
    async fn test_established_sets_ready() {
        let lifecycle = test_lifecycle();
        let mut rx = lifecycle.subscribe();
        assert!(!lifecycle.is_ready());

        lifecycle.session_established(&session("tok-1")).await.unwrap();

        assert!(lifecycle.is_ready());
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
    }

    #[tokio::test]
    async fn test_token_refresh_keeps_same_key() {
        let lifecycle = test_lifecycle();
        lifecycle.session_established(&session("tok-1")).await.unwrap();
        let fingerprint = lifecycle.crypto().key_fingerprint().unwrap();
        let sealed = lifecycle.crypto().encrypt("before refresh").unwrap();

        for token in ["tok-2", "tok-3", "tok-4"] {
            lifecycle
                .handle(SessionEvent::Refreshed(session(token)))
                .await
                .unwrap();
        }

        assert_eq!(lifecycle.crypto().key_fingerprint().unwrap(), fingerprint);
        assert_eq!(
            lifecycle.crypto().decrypt(&sealed.ciphertext, &sealed.iv),
            "before refresh"
        );
    }

    #[tokio::test]
    async fn test_ended_clears_key() {
        let lifecycle = test_lifecycle();
        lifecycle.session_established(&session("tok-1")).await.unwrap();

        lifecycle.handle(SessionEvent::Ended).await.unwrap();

        assert!(!lifecycle.is_ready());
        assert!(!lifecycle.crypto().is_ready());
        assert!(matches!(
            lifecycle.crypto().encrypt("x"),
            Err(ChatSealError::KeyNotReady)
        ));
    }

    #[tokio::test]
    async fn test_failed_derivation_surfaces_error() {
        let lifecycle = test_lifecycle();
        let bad = IdentitySession::new(Identity::new("", "a@x.com"), "tok");

        let err = lifecycle.session_established(&bad).await.unwrap_err();

        assert!(matches!(err, ChatSealError::DerivationFailed(_)));
        assert!(!err.is_recoverable());
        assert!(!lifecycle.is_ready());
    }

    #[tokio::test]
    async fn test_wait_ready_times_out() {
        let lifecycle = test_lifecycle();
        assert!(matches!(
            lifecycle.wait_ready().await,
            Err(ChatSealError::KeyNotReady)
        ));
    }

    #[tokio::test]
    async fn test_wait_ready_after_established() {
        let lifecycle = test_lifecycle();
        lifecycle.session_established(&session("tok-1")).await.unwrap();
        lifecycle.wait_ready().await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_through_handle_is_not_ready() {
        let lifecycle = test_lifecycle();
        lifecycle.session_established(&session("tok-1")).await.unwrap();

        lifecycle.crypto().clear();

        assert!(!lifecycle.is_ready());
        assert!(matches!(
            lifecycle.wait_ready().await,
            Err(ChatSealError::KeyNotReady)
        ));
    }

    #[tokio::test]
    async fn test_drop_clears_shared_handle() {
        let lifecycle = test_lifecycle();
        lifecycle.session_established(&session("tok-1")).await.unwrap();
        let handle = lifecycle.crypto().clone();
        assert!(handle.is_ready());

        drop(lifecycle);

        assert!(!handle.is_ready());
    }
}
