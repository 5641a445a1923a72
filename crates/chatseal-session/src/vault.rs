//! Encrypted conversations: seal on send, open on display

use chatseal_core::types::RecordBody;
use chatseal_core::{ChatSealResult, EncryptedMessageRecord, Role};
use chatseal_crypto::ChatCrypto;
use serde::Serialize;
use tracing::{debug, warn};

use crate::store::MessageStore;

/// A message ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayMessage {
    pub role: Role,
    pub content: String,
    /// False when `content` is the unreadable placeholder
    pub readable: bool,
}

pub struct ConversationVault<S> {
    crypto: ChatCrypto,
    store: S,
}

impl<S: MessageStore> ConversationVault<S> {
    pub fn new(crypto: ChatCrypto, store: S) -> Self {
        Self { crypto, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Seal `plaintext` and append it to the conversation.
    ///
    /// If sealing fails (no key, RNG unavailable) nothing is written: a
    /// plaintext fallback is never persisted.
    pub async fn send(
        &self,
        conversation_id: &str,
        role: Role,
        plaintext: &str,
    ) -> ChatSealResult<EncryptedMessageRecord> {
        let sealed = self.crypto.encrypt(plaintext)?;
        let record = EncryptedMessageRecord::sealed(role, sealed);
        self.store.append(conversation_id, record.clone()).await?;
        debug!(conversation = conversation_id, %role, "message stored");
        Ok(record)
    }

    /// Load and render a whole conversation.
    ///
    /// Only a store failure is an error; unreadable records render as the
    /// placeholder.
    pub async fn history(&self, conversation_id: &str) -> ChatSealResult<Vec<DisplayMessage>> {
        let records = self.store.load(conversation_id).await?;
        Ok(render_records(&self.crypto, &records))
    }
}

pub fn render_records(crypto: &ChatCrypto, records: &[EncryptedMessageRecord]) -> Vec<DisplayMessage> {
    records
        .iter()
        .map(|record| render_record(crypto, record))
        .collect()
}

/// Render one record. Legacy plaintext is returned as-is and never goes
/// through decryption.
pub fn render_record(crypto: &ChatCrypto, record: &EncryptedMessageRecord) -> DisplayMessage {
    let (content, readable) = match record.body() {
        RecordBody::Legacy(content) => (content.to_string(), true),
        RecordBody::Sealed { ciphertext, iv } => match crypto.try_decrypt(ciphertext, iv) {
            Ok(plaintext) => (plaintext, true),
            Err(e) => {
                warn!(role = %record.role, error = %e, "message unreadable");
                (crypto.unreadable_placeholder().to_string(), false)
            }
        },
        RecordBody::Malformed => {
            warn!(role = %record.role, "record has neither a complete ciphertext nor content");
            (crypto.unreadable_placeholder().to_string(), false)
        }
    };

    DisplayMessage {
        role: record.role,
        content,
        readable,
    }
}
