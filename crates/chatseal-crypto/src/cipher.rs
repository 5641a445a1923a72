//! Per-message AES-256-GCM encryption/decryption
//!
//! Persisted form (both fields text-encoded with the deployment's encoding):
//! ```text
//! contentEnc = [N bytes: ciphertext][16 bytes: GCM tag]
//! iv         = [12 bytes: random IV]
//! ```
//!
//! No AAD: records are `{role, contentEnc, iv}` and earlier clients sealed
//! them without associated data.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use chatseal_core::{ChatSealError, ChatSealResult, SealedText, TextEncoding};
use rand::{rngs::OsRng, RngCore};

use crate::encoding::{decode, encode};
use crate::kdf::SessionKey;
use crate::{IV_SIZE, TAG_SIZE};

/// Encrypt UTF-8 text under `key` with a fresh random 96-bit IV.
pub fn seal_text(
    key: &SessionKey,
    plaintext: &str,
    encoding: TextEncoding,
) -> ChatSealResult<SealedText> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| ChatSealError::CryptoUnavailable(format!("AES-256-GCM setup: {e}")))?;

    let mut iv = [0u8; IV_SIZE];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| ChatSealError::CryptoUnavailable(format!("system RNG: {e}")))?;
    let nonce = Nonce::from_slice(&iv);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| ChatSealError::CryptoUnavailable(format!("message encryption failed: {e}")))?;

    Ok(SealedText {
        ciphertext: encode(encoding, &ciphertext),
        iv: encode(encoding, &iv),
    })
}

/// Decrypt and verify a sealed message.
///
/// Every failure (bad encoding, wrong IV size, tag mismatch, invalid UTF-8)
/// is reported as `DecryptionFailed`.
pub fn open_text(
    key: &SessionKey,
    ciphertext: &str,
    iv: &str,
    encoding: TextEncoding,
) -> ChatSealResult<String> {
    let ciphertext = decode(encoding, ciphertext)
        .map_err(|e| ChatSealError::DecryptionFailed(format!("ciphertext: {e}")))?;
    let iv = decode(encoding, iv).map_err(|e| ChatSealError::DecryptionFailed(format!("iv: {e}")))?;

    if iv.len() != IV_SIZE {
        return Err(ChatSealError::DecryptionFailed(format!(
            "IV must be {IV_SIZE} bytes, got {}",
            iv.len()
        )));
    }
    if ciphertext.len() < TAG_SIZE {
        return Err(ChatSealError::DecryptionFailed(format!(
            "ciphertext too short: {} bytes (minimum {TAG_SIZE})",
            ciphertext.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| ChatSealError::CryptoUnavailable(format!("AES-256-GCM setup: {e}")))?;
    let nonce = Nonce::from_slice(&iv);

    let plaintext = cipher.decrypt(nonce, ciphertext.as_ref()).map_err(|_| {
        ChatSealError::DecryptionFailed("authentication failed: wrong key or corrupted data".into())
    })?;

    String::from_utf8(plaintext)
        .map_err(|e| ChatSealError::DecryptionFailed(format!("plaintext is not UTF-8: {e}")))
}
