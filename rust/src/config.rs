//! Runtime configuration for the tool: where the document key comes from and
//! which digest backs value hashes. The file is JSON:
//!
//! ```json
//! {
//!   "keySource": { "key_env": "SEALED_CONFIG_KEY" },
//!   "checksumAlgorithm": "SHA512"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::integrity::HashAlgorithm;
use crate::crypto::key::{KeyError, KeyProvider, SecurityKey};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file unreadable: {0}")]
    Io(String),
    #[error("config parse failed: {0}")]
    Parse(String),
    #[error("no usable key source configured")]
    MissingKeySource,
}

/// Where the document key is read from. Exactly one source is used, checked
/// in field order. The key is resolved again on every request and never cached.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeySource {
    /// Base64-encoded 32 byte key stored in an environment variable.
    pub key_env: Option<String>,
    /// Path to a file that contains the base64-encoded key.
    pub key_path: Option<PathBuf>,
    /// Environment variable that stores a passphrase (for Argon2id KDF).
    pub passphrase_env: Option<String>,
    /// Base64-encoded salt used alongside the passphrase.
    pub salt_b64: Option<String>,
}

impl KeySource {
    pub fn is_configured(&self) -> bool {
        self.key_env.is_some()
            || self.key_path.is_some()
            || (self.passphrase_env.is_some() && self.salt_b64.is_some())
    }
}

impl KeyProvider for KeySource {
    fn security_key(&self) -> Result<SecurityKey, KeyError> {
        if let Some(var) = &self.key_env {
            return SecurityKey::from_env_var(var);
        }
        if let Some(path) = &self.key_path {
            return SecurityKey::from_key_file(path);
        }
        if let (Some(pass_env), Some(salt_b64)) = (&self.passphrase_env, &self.salt_b64) {
            let passphrase = Zeroizing::new(
                std::env::var(pass_env)
                    .map_err(|e| KeyError::KeySourceUnreadable(format!("{pass_env}: {e}")))?,
            );
            let salt = STANDARD_NO_PAD
                .decode(salt_b64.trim_end_matches('=').as_bytes())
                .map_err(|e| KeyError::Base64DecodeFailed(format!("{e}")))?;
            return SecurityKey::derive_from_passphrase(&passphrase, &salt);
        }
        Err(KeyError::MissingKeySource)
    }
}

#[derive(Debug, Deserialize)]
struct RawRuntimeConfig {
    #[serde(rename = "keySource")]
    key_source: KeySource,
    #[serde(rename = "checksumAlgorithm", default)]
    checksum_algorithm: HashAlgorithm,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub key_source: KeySource,
    pub checksum_algorithm: HashAlgorithm,
}

/// Loads the JSON runtime configuration. Key material is not touched here;
/// it is resolved when a value is encrypted or decrypted.
pub fn load_config(path: impl AsRef<Path>) -> Result<RuntimeConfig, ConfigError> {
    let path = path.as_ref();
    let raw_json = fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
    let raw: RawRuntimeConfig =
        serde_json::from_str(&raw_json).map_err(|e| ConfigError::Parse(format!("{e}")))?;

    if !raw.key_source.is_configured() {
        return Err(ConfigError::MissingKeySource);
    }
    debug!(path = %path.display(), checksum = %raw.checksum_algorithm, "loaded runtime config");

    Ok(RuntimeConfig {
        key_source: raw.key_source,
        checksum_algorithm: raw.checksum_algorithm,
    })
}
