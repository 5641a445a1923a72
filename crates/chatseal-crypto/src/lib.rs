//! chatseal-crypto: client-side encryption for persisted chat messages
//!
//! Scheme:
//! ```text
//! password = app_secret ":" user_id ":" email
//! salt     = user_id bytes, '0'-padded / truncated to salt_len
//! key      = PBKDF2-HMAC-SHA256(password, salt, >= 100_000 rounds) -> 256 bit
//! record   = AES-256-GCM(key, iv = random 96 bit) -> { contentEnc: ct||tag, iv }
//! ```
//!
//! The key is a pure function of stable identity data. It never depends on
//! session tokens, so refreshing credentials yields the same key and old
//! messages stay readable.
//!
//! ## Key custody
//!
//! The key lives only in memory ([`ChatCrypto`]) and is dropped on sign-out.
//! It is not secret from anyone who holds `app_secret` plus a user's id and
//! e-mail: those inputs rebuild the key. Protecting against that needs
//! server-assisted key wrapping, which this crate does not do.

pub mod cipher;
pub mod encoding;
pub mod kdf;
pub mod session;

pub use cipher::{open_text, seal_text};
pub use encoding::{decode, encode, reencode_record};
pub use kdf::{derive_session_key, user_fingerprint, KdfParams, SessionKey};
pub use session::{ChatCrypto, CryptoSettings};

/// Size of a session key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM IV (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
