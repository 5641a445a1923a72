//! Message-storage boundary: where sealed records are persisted

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chatseal_core::{ChatSealResult, EncryptedMessageRecord};
use tokio::sync::RwLock;

/// A document store holding message records per conversation.
///
/// Implementations only ever see sealed (or legacy) records, never
/// plaintext produced in this session.
pub trait MessageStore: Send + Sync {
    /// Append a record to the end of a conversation
    fn append(
        &self,
        conversation_id: &str,
        record: EncryptedMessageRecord,
    ) -> impl Future<Output = ChatSealResult<()>> + Send;

    /// All records of a conversation, oldest first
    fn load(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = ChatSealResult<Vec<EncryptedMessageRecord>>> + Send;

    /// Overwrite a conversation (used by encoding migration)
    fn replace(
        &self,
        conversation_id: &str,
        records: Vec<EncryptedMessageRecord>,
    ) -> impl Future<Output = ChatSealResult<()>> + Send;
}

impl<S: MessageStore + ?Sized> MessageStore for Arc<S> {
    fn append(
        &self,
        conversation_id: &str,
        record: EncryptedMessageRecord,
    ) -> impl Future<Output = ChatSealResult<()>> + Send {
        (**self).append(conversation_id, record)
    }

    fn load(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = ChatSealResult<Vec<EncryptedMessageRecord>>> + Send {
        (**self).load(conversation_id)
    }

    fn replace(
        &self,
        conversation_id: &str,
        records: Vec<EncryptedMessageRecord>,
    ) -> impl Future<Output = ChatSealResult<()>> + Send {
        (**self).replace(conversation_id, records)
    }
}

/// In-process store, for tests and local tooling
#[derive(Debug, Default)]
pub struct MemoryStore {
    conversations: RwLock<HashMap<String, Vec<EncryptedMessageRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn conversation_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.conversations.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl MessageStore for MemoryStore {
    async fn append(
        &self,
        conversation_id: &str,
        record: EncryptedMessageRecord,
    ) -> ChatSealResult<()> {
        self.conversations
            .write()
            .await
            .entry(conversation_id.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn load(&self, conversation_id: &str) -> ChatSealResult<Vec<EncryptedMessageRecord>> {
        Ok(self
            .conversations
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace(
        &self,
        conversation_id: &str,
        records: Vec<EncryptedMessageRecord>,
    ) -> ChatSealResult<()> {
        self.conversations
            .write()
            .await
            .insert(conversation_id.to_string(), records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatseal_core::Role;

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = MemoryStore::new();
        store
            .append("c1", EncryptedMessageRecord::legacy(Role::User, "first"))
            .await
            .unwrap();
        store
            .append("c1", EncryptedMessageRecord::legacy(Role::Assistant, "second"))
            .await
            .unwrap();

        let records = store.load("c1").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content.as_deref(), Some("first"));
        assert_eq!(records[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_empty() {
        let store = MemoryStore::new();
        assert!(store.load("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_and_list() {
        let store = MemoryStore::new();
        store
            .append("b", EncryptedMessageRecord::legacy(Role::User, "x"))
            .await
            .unwrap();
        store.replace("a", Vec::new()).await.unwrap();

        assert_eq!(store.conversation_ids().await, vec!["a", "b"]);
    }
}
