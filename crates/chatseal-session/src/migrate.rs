//! Encoding migration for stored records (e.g. base64 → hex)
//!
//! Only the text form of `contentEnc`/`iv` changes; ciphertext bytes, and
//! therefore the key, are untouched.

use chatseal_core::types::RecordBody;
use chatseal_core::{ChatSealResult, EncryptedMessageRecord, TextEncoding};
use chatseal_crypto::reencode_record;
use serde::Serialize;
use tracing::{info, warn};

use crate::store::MessageStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationResult {
    /// Sealed records rewritten to the target encoding
    pub migrated: usize,
    /// Legacy plaintext records, left as they were
    pub legacy: usize,
    /// Half-sealed or undecodable records, left as they were
    pub skipped: usize,
}

/// Re-encode a batch of records. Records that cannot be migrated are kept
/// unchanged and counted in `skipped`.
pub fn migrate_records(
    records: &[EncryptedMessageRecord],
    from: TextEncoding,
    to: TextEncoding,
) -> (Vec<EncryptedMessageRecord>, MigrationResult) {
    let mut result = MigrationResult::default();
    let migrated = records
        .iter()
        .enumerate()
        .map(|(index, record)| match record.body() {
            RecordBody::Legacy(_) => {
                result.legacy += 1;
                record.clone()
            }
            RecordBody::Sealed { .. } => match reencode_record(record, from, to) {
                Ok(rewritten) => {
                    result.migrated += 1;
                    rewritten
                }
                Err(e) => {
                    warn!(index, error = %e, "record not migrated");
                    result.skipped += 1;
                    record.clone()
                }
            },
            RecordBody::Malformed => {
                warn!(index, "malformed record not migrated");
                result.skipped += 1;
                record.clone()
            }
        })
        .collect();
    (migrated, result)
}

/// Migrate one stored conversation in place.
pub async fn migrate_conversation<S: MessageStore>(
    store: &S,
    conversation_id: &str,
    from: TextEncoding,
    to: TextEncoding,
) -> ChatSealResult<MigrationResult> {
    let records = store.load(conversation_id).await?;
    let (rewritten, result) = migrate_records(&records, from, to);
    if result.migrated > 0 {
        store.replace(conversation_id, rewritten).await?;
    }
    info!(
        conversation = conversation_id,
        %from,
        %to,
        migrated = result.migrated,
        legacy = result.legacy,
        skipped = result.skipped,
        "conversation encoding migrated"
    );
    Ok(result)
}
