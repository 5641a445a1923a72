use serde::{Deserialize, Serialize};

use crate::error::{ChatSealError, ChatSealResult};
use crate::types::TextEncoding;

/// Lowest PBKDF2 round count accepted from configuration
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Top-level configuration (loaded from chatseal.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSealConfig {
    pub crypto: CryptoConfig,
    pub session: SessionConfig,
    pub log: LogConfig,
}

/// Message encryption configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Application-wide derivation material shared by every client
    pub app_secret: String,
    /// PBKDF2-HMAC-SHA256 rounds (default: 100000, minimum 100000)
    pub pbkdf2_iterations: u32,
    /// Salt length in bytes; the user id is padded or truncated to it (default: 16)
    pub salt_len: usize,
    /// Text encoding for `contentEnc` and `iv` (default: hex)
    pub encoding: TextEncoding,
    /// Shown in place of a message that cannot be decrypted
    pub unreadable_placeholder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long callers wait for the key before failing with KeyNotReady (ms)
    pub ready_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            app_secret: String::new(),
            pbkdf2_iterations: MIN_PBKDF2_ITERATIONS,
            salt_len: 16,
            encoding: TextEncoding::Hex,
            unreadable_placeholder: "[message unreadable]".into(),
        }
    }
}

impl std::fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("app_secret", &"[REDACTED]")
            .field("pbkdf2_iterations", &self.pbkdf2_iterations)
            .field("salt_len", &self.salt_len)
            .field("encoding", &self.encoding)
            .field("unreadable_placeholder", &self.unreadable_placeholder)
            .finish()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ready_timeout_ms: 5000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ChatSealConfig {
    /// Reject values that would weaken derivation or break the display path.
    ///
    /// An empty `app_secret` is not rejected here: it only matters once a
    /// key is derived, and derivation reports it as `DerivationFailed`.
    pub fn validate(&self) -> ChatSealResult<()> {
        let crypto = &self.crypto;
        if crypto.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            return Err(ChatSealError::Config(format!(
                "crypto.pbkdf2_iterations must be at least {MIN_PBKDF2_ITERATIONS}, got {}",
                crypto.pbkdf2_iterations
            )));
        }
        if !(8..=64).contains(&crypto.salt_len) {
            return Err(ChatSealError::Config(format!(
                "crypto.salt_len must be between 8 and 64 bytes, got {}",
                crypto.salt_len
            )));
        }
        if crypto.unreadable_placeholder.is_empty() {
            return Err(ChatSealError::Config(
                "crypto.unreadable_placeholder must not be empty".into(),
            ));
        }
        if !matches!(self.log.format.as_str(), "json" | "text") {
            return Err(ChatSealError::Config(format!(
                "log.format must be \"json\" or \"text\", got {:?}",
                self.log.format
            )));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> ChatSealResult<Self> {
        let config: ChatSealConfig =
            toml::from_str(content).map_err(|e| ChatSealError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[crypto]
app_secret = "s3cr3t-material"
pbkdf2_iterations = 250000
salt_len = 32
encoding = "base64"
unreadable_placeholder = "Mesaj corupt"

[session]
ready_timeout_ms = 1500

[log]
level = "debug"
format = "json"
"#;
        let config = ChatSealConfig::from_toml_str(toml_str).unwrap();

        assert_eq!(config.crypto.app_secret, "s3cr3t-material");
        assert_eq!(config.crypto.pbkdf2_iterations, 250_000);
        assert_eq!(config.crypto.salt_len, 32);
        assert_eq!(config.crypto.encoding, TextEncoding::Base64);
        assert_eq!(config.crypto.unreadable_placeholder, "Mesaj corupt");
        assert_eq!(config.session.ready_timeout_ms, 1500);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config = ChatSealConfig::from_toml_str("").unwrap();

        assert_eq!(config.crypto.pbkdf2_iterations, 100_000);
        assert_eq!(config.crypto.salt_len, 16);
        assert_eq!(config.crypto.encoding, TextEncoding::Hex);
        assert_eq!(config.session.ready_timeout_ms, 5000);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "text");
    }

    #[test]
    fn test_rejects_weak_iterations() {
        let err = ChatSealConfig::from_toml_str("[crypto]\npbkdf2_iterations = 1000\n").unwrap_err();
        assert!(matches!(err, ChatSealError::Config(_)));
        assert!(err.to_string().contains("pbkdf2_iterations"));
    }

    #[test]
    fn test_rejects_salt_len_out_of_range() {
        assert!(ChatSealConfig::from_toml_str("[crypto]\nsalt_len = 4\n").is_err());
        assert!(ChatSealConfig::from_toml_str("[crypto]\nsalt_len = 65\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        assert!(ChatSealConfig::from_toml_str("[log]\nformat = \"xml\"\n").is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let mut config = ChatSealConfig::default();
        config.crypto.app_secret = "do-not-print".into();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("do-not-print"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
