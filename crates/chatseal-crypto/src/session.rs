//! In-memory session key holder
//!
//! `ChatCrypto` is a cheap cloneable handle. The lifecycle owner creates one
//! per app context and hands clones to everything that encrypts or decrypts.
//! Independent handles never share a key, so tests can simulate several
//! users side by side.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chatseal_core::config::CryptoConfig;
use chatseal_core::{ChatSealError, ChatSealResult, Identity, SealedText, TextEncoding};
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::cipher::{open_text, seal_text};
use crate::kdf::{derive_session_key, user_fingerprint, KdfParams, SessionKey};

/// Everything except the application secret that shapes a session
#[derive(Debug, Clone)]
pub struct CryptoSettings {
    pub kdf: KdfParams,
    pub encoding: TextEncoding,
    /// Returned by [`ChatCrypto::decrypt`] when a message cannot be read
    pub unreadable_placeholder: String,
}

impl Default for CryptoSettings {
    fn default() -> Self {
        Self::from_config(&CryptoConfig::default())
    }
}

impl CryptoSettings {
    pub fn from_config(config: &CryptoConfig) -> Self {
        Self {
            kdf: KdfParams::from_config(config),
            encoding: config.encoding,
            unreadable_placeholder: config.unreadable_placeholder.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ChatCrypto {
    inner: Arc<Inner>,
}

struct Inner {
    app_secret: SecretString,
    settings: CryptoSettings,
    state: RwLock<KeyState>,
}

#[derive(Default)]
struct KeyState {
    /// Bumped by `clear` and by a switch to a different identity. A
    /// derivation only installs its key if the epoch it started in is
    /// still current.
    epoch: u64,
    /// Identity whose key is being derived or is installed
    target: Option<Identity>,
    installed: Option<InstalledKey>,
}

struct InstalledKey {
    identity: Identity,
    key: Arc<SessionKey>,
}

impl ChatCrypto {
    pub fn new(app_secret: SecretString, settings: CryptoSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                app_secret,
                settings,
                state: RwLock::new(KeyState::default()),
            }),
        }
    }

    pub fn from_config(config: &CryptoConfig) -> Self {
        Self::new(
            SecretString::from(config.app_secret.clone()),
            CryptoSettings::from_config(config),
        )
    }

    /// Derive and install the key for `identity`.
    ///
    /// Calling this again with the identity already installed returns
    /// immediately. Switching identities drops the previous key before the
    /// new derivation starts. If `clear` (or another identity switch) runs
    /// while the derivation is in flight, the result is discarded and
    /// `SessionEnded` is returned.
    pub async fn initialize(&self, identity: &Identity) -> ChatSealResult<()> {
        let user = user_fingerprint(&identity.user_id);
        let epoch = {
            let mut state = self.write_state();
            if state
                .installed
                .as_ref()
                .is_some_and(|installed| installed.identity == *identity)
            {
                debug!(user = %user, "session key already installed");
                return Ok(());
            }
            if state.target.as_ref() != Some(identity) {
                state.installed = None;
                state.target = Some(identity.clone());
                state.epoch += 1;
            }
            state.epoch
        };

        let inner = Arc::clone(&self.inner);
        let owned = identity.clone();
        let key = tokio::task::spawn_blocking(move || {
            derive_session_key(&inner.app_secret, &owned, &inner.settings.kdf)
        })
        .await
        .map_err(|e| ChatSealError::CryptoUnavailable(format!("key derivation worker: {e}")))?
        .inspect_err(|e| warn!(user = %user, error = %e, "session key derivation failed"))?;

        let mut state = self.write_state();
        if state.epoch != epoch {
            warn!(user = %user, "session changed during key derivation, discarding key");
            return Err(ChatSealError::SessionEnded);
        }
        if state.installed.is_none() {
            info!(user = %user, key = %key.fingerprint(), "session key installed");
            state.installed = Some(InstalledKey {
                identity: identity.clone(),
                key: Arc::new(key),
            });
        }
        Ok(())
    }

    /// Whether a key is currently held
    pub fn is_ready(&self) -> bool {
        self.read_state().installed.is_some()
    }

    /// Identity whose key is installed, if any
    pub fn identity(&self) -> Option<Identity> {
        self.read_state()
            .installed
            .as_ref()
            .map(|installed| installed.identity.clone())
    }

    /// Fingerprint of the installed key, if any
    pub fn key_fingerprint(&self) -> Option<String> {
        self.read_state()
            .installed
            .as_ref()
            .map(|installed| installed.key.fingerprint())
    }

    /// Drop the key immediately. Any derivation still in flight will not
    /// install its result.
    pub fn clear(&self) {
        let mut state = self.write_state();
        let had_key = state.installed.take().is_some();
        state.target = None;
        state.epoch += 1;
        if had_key {
            info!("session key cleared");
        }
    }

    /// Encrypt `plaintext` under the session key.
    ///
    /// Fails with `KeyNotReady` when no key is held; nothing is returned
    /// that a caller could mistake for ciphertext.
    pub fn encrypt(&self, plaintext: &str) -> ChatSealResult<SealedText> {
        let key = self.current_key()?;
        let sealed = seal_text(&key, plaintext, self.inner.settings.encoding)?;
        debug!(bytes = plaintext.len(), "message sealed");
        Ok(sealed)
    }

    /// Decrypt a sealed message, reporting why it failed
    pub fn try_decrypt(&self, ciphertext: &str, iv: &str) -> ChatSealResult<String> {
        let key = self.current_key()?;
        open_text(&key, ciphertext, iv, self.inner.settings.encoding)
    }

    /// Decrypt a sealed message, or return the unreadable placeholder.
    ///
    /// Never fails: one corrupt record must not stop a conversation from
    /// rendering.
    pub fn decrypt(&self, ciphertext: &str, iv: &str) -> String {
        match self.try_decrypt(ciphertext, iv) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(error = %e, "message unreadable");
                self.inner.settings.unreadable_placeholder.clone()
            }
        }
    }

    pub fn unreadable_placeholder(&self) -> &str {
        &self.inner.settings.unreadable_placeholder
    }

    pub fn encoding(&self) -> TextEncoding {
        self.inner.settings.encoding
    }

    fn current_key(&self) -> ChatSealResult<Arc<SessionKey>> {
        self.read_state()
            .installed
            .as_ref()
            .map(|installed| Arc::clone(&installed.key))
            .ok_or(ChatSealError::KeyNotReady)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, KeyState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, KeyState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ChatCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCrypto")
            .field("ready", &self.is_ready())
            .field("encoding", &self.inner.settings.encoding)
            .finish()
    }
}
