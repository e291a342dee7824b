//! Key material bound to a configuration document.
//! Values never hold on to a key: every encrypt or decrypt call asks a
//! `KeyProvider` for a fresh `SecurityKey` and drops it when the call returns.

use std::fmt;
use std::fs;
use std::path::Path;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

pub const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid key length; expected 32 bytes")]
    InvalidKeyLength,
    #[error("argon2 derivation failed: {0}")]
    DerivationFailed(String),
    #[error("key source unreadable: {0}")]
    KeySourceUnreadable(String),
    #[error("base64 decoding failed: {0}")]
    Base64DecodeFailed(String),
    #[error("no usable key source configured")]
    MissingKeySource,
}

/// Symmetric key material. Zeroed on drop and never printed.
#[derive(Clone)]
pub struct SecurityKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl SecurityKey {
    /// Builds a key from raw bytes. The key must be exactly 32 bytes.
    pub fn from_key_bytes(key_bytes: &[u8]) -> Result<Self, KeyError> {
        if key_bytes.len() != KEY_LEN {
            return Err(KeyError::InvalidKeyLength);
        }
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(key_bytes);
        Ok(Self { bytes })
    }

    /// Generates a random key from the operating system RNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(bytes.as_mut());
        Self { bytes }
    }

    /// Reads a base64-encoded key from an environment variable.
    pub fn from_env_var(var: &str) -> Result<Self, KeyError> {
        let encoded = Zeroizing::new(
            std::env::var(var).map_err(|e| KeyError::KeySourceUnreadable(format!("{var}: {e}")))?,
        );
        Self::from_base64(encoded.trim())
    }

    /// Reads a base64-encoded key from disk.
    pub fn from_key_file(path: &Path) -> Result<Self, KeyError> {
        let content = Zeroizing::new(fs::read_to_string(path).map_err(|e| {
            KeyError::KeySourceUnreadable(format!("{}: {e}", path.display()))
        })?);
        Self::from_base64(content.trim())
    }

    /// Derives a key from a passphrase using Argon2id. The salt must be unique
    /// per deployment and stored next to the configuration.
    pub fn derive_from_passphrase(passphrase: &str, salt: &[u8]) -> Result<Self, KeyError> {
        let params = Params::new(19 * 1024, 3, 1, Some(KEY_LEN))
            .map_err(|e| KeyError::DerivationFailed(format!("{e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut output = [0u8; KEY_LEN];
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut output)
            .map_err(|e| KeyError::DerivationFailed(format!("{e}")))?;

        let key = Self::from_key_bytes(&output);
        output.zeroize();
        key
    }

    fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let decoded = Zeroizing::new(
            STANDARD_NO_PAD
                .decode(encoded.trim_end_matches('=').as_bytes())
                .map_err(|e| KeyError::Base64DecodeFailed(format!("{e}")))?,
        );
        Self::from_key_bytes(&decoded)
    }

    /// Base64 form accepted by `from_env_var` and `from_key_file`.
    pub fn encode_base64(&self) -> String {
        STANDARD_NO_PAD.encode(self.bytes.as_ref())
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for SecurityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecurityKey([removed])")
    }
}

/// Supplies the key for one configuration document.
pub trait KeyProvider: Send + Sync {
    fn security_key(&self) -> Result<SecurityKey, KeyError>;
}

impl KeyProvider for SecurityKey {
    fn security_key(&self) -> Result<SecurityKey, KeyError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyError, KeyProvider, SecurityKey};
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn rejects_bad_key_lengths() {
        let err = SecurityKey::from_key_bytes(&[1u8; 16]).unwrap_err();
        assert!(matches!(err, KeyError::InvalidKeyLength));
        assert!(format!("{err}").contains("invalid key length"));
    }

    #[test]
    fn reads_base64_key_file() {
        let key = SecurityKey::generate();
        let file = NamedTempFile::new().expect("temp file");
        fs::write(file.path(), format!("{}\n", key.encode_base64())).unwrap();

        let loaded = SecurityKey::from_key_file(file.path()).expect("key file should load");
        assert_eq!(loaded.as_bytes(), key.as_bytes());
    }

    #[test]
    fn reads_base64_key_from_env() {
        let key = SecurityKey::generate();
        std::env::set_var("SEALED_CONFIG_TEST_KEY_ENV", key.encode_base64());

        let loaded = SecurityKey::from_env_var("SEALED_CONFIG_TEST_KEY_ENV").expect("env key");
        assert_eq!(loaded.as_bytes(), key.as_bytes());
    }

    #[test]
    fn missing_env_var_is_unreadable() {
        let err = SecurityKey::from_env_var("SEALED_CONFIG_TEST_KEY_NOT_SET").unwrap_err();
        assert!(matches!(err, KeyError::KeySourceUnreadable(_)));
    }

    #[test]
    fn passphrase_derivation_is_deterministic() {
        let salt = b"static-test-salt-123";
        let a = SecurityKey::derive_from_passphrase("pa55phrase", salt).expect("derive");
        let b = SecurityKey::derive_from_passphrase("pa55phrase", salt).expect("derive");
        let c = SecurityKey::derive_from_passphrase("other", salt).expect("derive");
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn debug_output_hides_key_bytes() {
        let key = SecurityKey::from_key_bytes(&[0xAB; 32]).unwrap();
        let rendered = format!("{key:?}");
        assert_eq!(rendered, "SecurityKey([removed])");
        assert!(!rendered.contains("171"));
    }

    #[test]
    fn key_provides_itself() {
        let key = SecurityKey::generate();
        let provided = key.security_key().expect("always available");
        assert_eq!(provided.as_bytes(), key.as_bytes());
    }
}
