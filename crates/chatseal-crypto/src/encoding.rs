//! Text encodings for persisted ciphertext and IVs
//!
//! Base64 uses the standard padded alphabet, which is what the earlier web
//! clients produced with `btoa`. Hex is lowercase.

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use chatseal_core::types::RecordBody;
use chatseal_core::{ChatSealError, ChatSealResult, EncryptedMessageRecord, TextEncoding};

use crate::{IV_SIZE, TAG_SIZE};

pub fn encode(encoding: TextEncoding, data: &[u8]) -> String {
    match encoding {
        TextEncoding::Hex => hex::encode(data),
        TextEncoding::Base64 => B64.encode(data),
    }
}

pub fn decode(encoding: TextEncoding, text: &str) -> ChatSealResult<Vec<u8>> {
    match encoding {
        TextEncoding::Hex => {
            hex::decode(text).map_err(|e| ChatSealError::Encoding(format!("hex decode: {e}")))
        }
        TextEncoding::Base64 => B64
            .decode(text)
            .map_err(|e| ChatSealError::Encoding(format!("base64 decode: {e}"))),
    }
}

/// Rewrite one encoded value from `from` to `to` without touching its bytes.
pub fn reencode(text: &str, from: TextEncoding, to: TextEncoding) -> ChatSealResult<String> {
    if from == to {
        return Ok(text.to_string());
    }
    Ok(encode(to, &decode(from, text)?))
}

/// Move a sealed record to another encoding. The key is not needed: only
/// the text representation of `contentEnc` and `iv` changes.
///
/// Legacy plaintext records come back unchanged. Half-sealed records are
/// an error, since there is no way to tell what they should become. So is
/// a record that does not decode under `from` to a 12-byte IV and a
/// ciphertext of at least one tag: hex text is also valid base64, and
/// re-encoding it would destroy the record.
pub fn reencode_record(
    record: &EncryptedMessageRecord,
    from: TextEncoding,
    to: TextEncoding,
) -> ChatSealResult<EncryptedMessageRecord> {
    match record.body() {
        RecordBody::Legacy(_) => Ok(record.clone()),
        RecordBody::Sealed { ciphertext, iv } => {
            let ciphertext = decode(from, ciphertext)?;
            let iv = decode(from, iv)?;
            if iv.len() != IV_SIZE || ciphertext.len() < TAG_SIZE {
                return Err(ChatSealError::Encoding(format!(
                    "record is not {from}-encoded: iv {} bytes, ciphertext {} bytes",
                    iv.len(),
                    ciphertext.len()
                )));
            }
            Ok(EncryptedMessageRecord {
                role: record.role,
                content_enc: Some(encode(to, &ciphertext)),
                iv: Some(encode(to, &iv)),
                content: record.content.clone(),
            })
        }
        RecordBody::Malformed => Err(ChatSealError::Encoding(
            "record has only one of contentEnc/iv".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatseal_core::{Role, SealedText};

    #[test]
    fn test_hex_is_lowercase() {
        assert_eq!(encode(TextEncoding::Hex, &[0xAB, 0x01]), "ab01");
        assert_eq!(decode(TextEncoding::Hex, "AB01").unwrap(), vec![0xAB, 0x01]);
    }

    #[test]
    fn test_base64_matches_btoa() {
        // btoa("hello") == "aGVsbG8="
        assert_eq!(encode(TextEncoding::Base64, b"hello"), "aGVsbG8=");
        assert_eq!(decode(TextEncoding::Base64, "aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(TextEncoding::Hex, "zz"),
            Err(ChatSealError::Encoding(_))
        ));
        assert!(matches!(
            decode(TextEncoding::Hex, "abc"),
            Err(ChatSealError::Encoding(_))
        ));
        assert!(matches!(
            decode(TextEncoding::Base64, "not base64!"),
            Err(ChatSealError::Encoding(_))
        ));
    }

    #[test]
    fn test_reencode_base64_to_hex() {
        assert_eq!(
            reencode("aGVsbG8=", TextEncoding::Base64, TextEncoding::Hex).unwrap(),
            "68656c6c6f"
        );
    }

    fn sealed_b64(role: Role) -> EncryptedMessageRecord {
        EncryptedMessageRecord::sealed(
            role,
            SealedText {
                ciphertext: "AAECAwQFBgcICQoLDA0ODw==".into(),
                iv: "AAECAwQFBgcICQoL".into(),
            },
        )
    }

    #[test]
    fn test_reencode_record() {
        let record = sealed_b64(Role::Assistant);
        let migrated = reencode_record(&record, TextEncoding::Base64, TextEncoding::Hex).unwrap();

        assert_eq!(migrated.role, Role::Assistant);
        assert_eq!(
            migrated.content_enc.as_deref(),
            Some("000102030405060708090a0b0c0d0e0f")
        );
        assert_eq!(migrated.iv.as_deref(), Some("000102030405060708090a0b"));
    }

    #[test]
    fn test_reencode_rejects_record_in_other_encoding() {
        let hex_record = reencode_record(
            &sealed_b64(Role::User),
            TextEncoding::Base64,
            TextEncoding::Hex,
        )
        .unwrap();

        // Hex text decodes as base64, but to the wrong sizes.
        assert!(matches!(
            reencode_record(&hex_record, TextEncoding::Base64, TextEncoding::Hex),
            Err(ChatSealError::Encoding(_))
        ));
        assert!(matches!(
            reencode_record(&sealed_b64(Role::User), TextEncoding::Hex, TextEncoding::Base64),
            Err(ChatSealError::Encoding(_))
        ));
    }

    #[test]
    fn test_reencode_rejects_short_ciphertext() {
        let mut record = sealed_b64(Role::User);
        record.content_enc = Some("aGVsbG8=".into());
        assert!(reencode_record(&record, TextEncoding::Base64, TextEncoding::Hex).is_err());
    }

    #[test]
    fn test_reencode_leaves_legacy_untouched() {
        let record = EncryptedMessageRecord::legacy(Role::User, "plain words");
        let migrated = reencode_record(&record, TextEncoding::Base64, TextEncoding::Hex).unwrap();
        assert_eq!(migrated, record);
    }

    #[test]
    fn test_reencode_rejects_half_sealed() {
        let mut record = EncryptedMessageRecord::legacy(Role::User, "x");
        record.iv = Some("00".into());
        assert!(reencode_record(&record, TextEncoding::Hex, TextEncoding::Base64).is_err());
    }
}
