use thiserror::Error;

pub type ChatSealResult<T> = Result<T, ChatSealError>;

#[derive(Debug, Error)]
pub enum ChatSealError {
    /// The cipher primitives cannot be used at all (RNG or cipher setup failed).
    #[error("crypto unavailable: {0}")]
    CryptoUnavailable(String),

    /// No session key: `initialize` has not completed, or `clear` ran.
    #[error("encryption key not ready")]
    KeyNotReady,

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("key derivation failed: {0}")]
    DerivationFailed(String),

    /// A derivation finished after the session that requested it was cleared.
    #[error("identity session ended before the key was installed")]
    SessionEnded,

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("message store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChatSealError {
    /// Whether the caller can recover without re-creating the session.
    ///
    /// `KeyNotReady` and `SessionEnded` resolve once sign-in completes again;
    /// `DecryptionFailed` only affects a single message. Everything else
    /// blocks the send path until the user re-authenticates or reloads.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ChatSealError::KeyNotReady
                | ChatSealError::SessionEnded
                | ChatSealError::DecryptionFailed(_)
        )
    }
}
