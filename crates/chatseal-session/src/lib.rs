//! chatseal-session: keeps the message key in step with the identity session
//!
//! Event flow:
//!   identity provider ──SessionEvent──▶ KeyLifecycle ──initialize/clear──▶ ChatCrypto
//!   ConversationVault ──encrypt/decrypt──▶ ChatCrypto
//!   ConversationVault ──records──▶ MessageStore

pub mod identity;
pub mod lifecycle;
pub mod migrate;
pub mod store;
pub mod vault;

pub use identity::{IdentityProvider, IdentitySession, SessionEvent};
pub use lifecycle::KeyLifecycle;
pub use migrate::{migrate_conversation, MigrationResult};
pub use store::{MemoryStore, MessageStore};
pub use vault::{ConversationVault, DisplayMessage};
