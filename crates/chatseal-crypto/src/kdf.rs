//! Key derivation: PBKDF2-HMAC-SHA256 over stable identity material → session key

use chatseal_core::config::{CryptoConfig, MIN_PBKDF2_ITERATIONS};
use chatseal_core::{ChatSealError, ChatSealResult, Identity};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::KEY_SIZE;

/// A 256-bit message key derived from a user's identity.
///
/// Zeroized on drop to prevent secrets lingering in memory.
pub struct SessionKey {
    bytes: [u8; KEY_SIZE],
}

impl SessionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// First 8 bytes of SHA-256(key), hex. Safe to log or print.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.bytes);
        hex::encode(&digest[..8])
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    /// HMAC-SHA256 rounds (default: 100000)
    pub iterations: u32,
    /// Salt length in bytes (default: 16)
    pub salt_len: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: MIN_PBKDF2_ITERATIONS,
            salt_len: 16,
        }
    }
}

impl KdfParams {
    pub fn from_config(config: &CryptoConfig) -> Self {
        Self {
            iterations: config.pbkdf2_iterations,
            salt_len: config.salt_len,
        }
    }
}

/// Per-user salt: the user id's bytes, right-padded with `'0'` or truncated.
pub fn salt_for_user(user_id: &str, salt_len: usize) -> Vec<u8> {
    let mut salt: Vec<u8> = user_id.bytes().take(salt_len).collect();
    salt.resize(salt_len, b'0');
    salt
}

/// Short, non-reversible tag for a user id, for log fields.
pub fn user_fingerprint(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    hex::encode(&digest[..4])
}

/// Derive the message key for `identity`.
///
/// Deterministic: the same secret, identity and params always give the
/// same key, across calls and across process restarts.
pub fn derive_session_key(
    app_secret: &SecretString,
    identity: &Identity,
    params: &KdfParams,
) -> ChatSealResult<SessionKey> {
    let secret = app_secret.expose_secret();
    if secret.is_empty() {
        return Err(ChatSealError::DerivationFailed(
            "application secret is empty".into(),
        ));
    }
    if identity.user_id.trim().is_empty() {
        return Err(ChatSealError::DerivationFailed("user id is empty".into()));
    }
    if identity.email.trim().is_empty() {
        return Err(ChatSealError::DerivationFailed("email is empty".into()));
    }
    if params.iterations == 0 || params.salt_len == 0 {
        return Err(ChatSealError::DerivationFailed(format!(
            "invalid PBKDF2 params: iterations={} salt_len={}",
            params.iterations, params.salt_len
        )));
    }

    let mut password = Zeroizing::new(Vec::with_capacity(
        secret.len() + identity.user_id.len() + identity.email.len() + 2,
    ));
    password.extend_from_slice(secret.as_bytes());
    password.push(b':');
    password.extend_from_slice(identity.user_id.as_bytes());
    password.push(b':');
    password.extend_from_slice(identity.email.as_bytes());

    let salt = salt_for_user(&identity.user_id, params.salt_len);

    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(&password, &salt, params.iterations, &mut key);

    Ok(SessionKey::from_bytes(key))
}
