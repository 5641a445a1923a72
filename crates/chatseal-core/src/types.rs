use serde::{Deserialize, Serialize};

/// Stable identity material supplied by the identity provider.
///
/// Only these two fields feed key derivation. Short-lived credentials
/// (session tokens) are deliberately not part of this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// Text encoding used for `contentEnc` and `iv` in persisted records.
///
/// One deployment uses one encoding; mixed-encoding stores go through
/// an explicit migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    #[default]
    Hex,
    Base64,
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextEncoding::Hex => f.write_str("hex"),
            TextEncoding::Base64 => f.write_str("base64"),
        }
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hex" => Ok(TextEncoding::Hex),
            "base64" | "b64" => Ok(TextEncoding::Base64),
            other => Err(format!("unknown text encoding: {other} (expected hex or base64)")),
        }
    }
}

/// Output of one encryption: text-encoded ciphertext (tag appended) and IV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedText {
    pub ciphertext: String,
    pub iv: String,
}

/// A persisted chat message as stored in the remote document store.
///
/// Encrypted records carry `contentEnc` + `iv`. Records written before
/// encryption was introduced only carry `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedMessageRecord {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_enc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// How a record's body must be handled by the display path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordBody<'a> {
    Sealed { ciphertext: &'a str, iv: &'a str },
    /// Pre-encryption plaintext, returned unchanged
    Legacy(&'a str),
    /// Only one of `contentEnc`/`iv` is present, or nothing at all
    Malformed,
}

impl EncryptedMessageRecord {
    pub fn sealed(role: Role, sealed: SealedText) -> Self {
        Self {
            role,
            content_enc: Some(sealed.ciphertext),
            iv: Some(sealed.iv),
            content: None,
        }
    }

    pub fn legacy(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content_enc: None,
            iv: None,
            content: Some(content.into()),
        }
    }

    pub fn body(&self) -> RecordBody<'_> {
        match (&self.content_enc, &self.iv, &self.content) {
            (Some(ciphertext), Some(iv), _) => RecordBody::Sealed { ciphertext, iv },
            (None, None, Some(content)) => RecordBody::Legacy(content),
            _ => RecordBody::Malformed,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self.body(), RecordBody::Legacy(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_wire_shape() {
        let record = EncryptedMessageRecord::sealed(
            Role::User,
            SealedText {
                ciphertext: "ab12".into(),
                iv: "00ff".into(),
            },
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "user", "contentEnc": "ab12", "iv": "00ff"})
        );
    }

    #[test]
    fn test_legacy_record_parses() {
        let record: EncryptedMessageRecord =
            serde_json::from_str(r#"{"role":"assistant","content":"Salut!"}"#).unwrap();
        assert!(record.is_legacy());
        assert_eq!(record.body(), RecordBody::Legacy("Salut!"));
    }

    #[test]
    fn test_half_sealed_record_is_malformed() {
        let record: EncryptedMessageRecord =
            serde_json::from_str(r#"{"role":"user","contentEnc":"ab12"}"#).unwrap();
        assert_eq!(record.body(), RecordBody::Malformed);
        assert!(!record.is_legacy());
    }

    #[test]
    fn test_sealed_wins_over_stale_content() {
        let mut record = EncryptedMessageRecord::legacy(Role::User, "old");
        record.content_enc = Some("cc".into());
        record.iv = Some("dd".into());
        assert_eq!(
            record.body(),
            RecordBody::Sealed {
                ciphertext: "cc",
                iv: "dd"
            }
        );
    }

    #[test]
    fn test_text_encoding_from_str() {
        assert_eq!("hex".parse::<TextEncoding>().unwrap(), TextEncoding::Hex);
        assert_eq!("Base64".parse::<TextEncoding>().unwrap(), TextEncoding::Base64);
        assert!("utf7".parse::<TextEncoding>().is_err());
    }
}
