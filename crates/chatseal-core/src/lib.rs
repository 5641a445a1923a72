pub mod config;
pub mod error;
pub mod types;

pub use error::{ChatSealError, ChatSealResult};
pub use types::{EncryptedMessageRecord, Identity, Role, SealedText, TextEncoding};
