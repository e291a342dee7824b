//! String encryption for values stored inside configuration documents.
//!
//! Each `BlockAlgorithm` gets its own subkey (HKDF-SHA256 over the document
//! key, info = algorithm label) and binds its label as associated data, so a
//! value sealed under one algorithm never opens under another. The encoded
//! form is URL-safe base64 of `nonce || ciphertext || tag` and fits in XML
//! text without escaping.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::crypto::integrity::hkdf_expand;
use crate::crypto::key::{KeyError, KeyProvider, KEY_LEN};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const SUBKEY_SALT: &[u8] = b"sealed-config/block-algorithm";

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("key unavailable: {0}")]
    Key(#[from] KeyError),
    #[error("unsupported block algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("subkey derivation failed: {0}")]
    Derivation(String),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("base64 decoding failed: {0}")]
    Base64DecodeFailed(String),
}

/// Cipher identifiers. Labels are persisted implicitly through the subkey
/// and associated data, so they must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockAlgorithm {
    /// Setting values stored in configuration documents.
    Config,
    /// Material handed out of the configuration document, such as exported tokens.
    Token,
}

impl BlockAlgorithm {
    pub fn label(&self) -> &'static str {
        match self {
            BlockAlgorithm::Config => "CONFIG",
            BlockAlgorithm::Token => "TOKEN",
        }
    }
}

impl fmt::Display for BlockAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BlockAlgorithm {
    type Err = CipherError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CONFIG" => Ok(BlockAlgorithm::Config),
            "TOKEN" => Ok(BlockAlgorithm::Token),
            other => Err(CipherError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

fn cipher_for(
    keys: &dyn KeyProvider,
    algorithm: BlockAlgorithm,
) -> Result<ChaCha20Poly1305, CipherError> {
    let key = keys.security_key()?;
    let subkey = Zeroizing::new(
        hkdf_expand(key.as_bytes(), SUBKEY_SALT, algorithm.label().as_bytes(), KEY_LEN)
            .map_err(|e| CipherError::Derivation(format!("{e}")))?,
    );
    Ok(ChaCha20Poly1305::new(Key::from_slice(&subkey)))
}

/// Encrypts `plaintext` under the provider's current key.
pub fn encrypt_string(
    plaintext: &str,
    keys: &dyn KeyProvider,
    algorithm: BlockAlgorithm,
) -> Result<String, CipherError> {
    let cipher = cipher_for(keys, algorithm)?;
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext.as_bytes(),
                aad: algorithm.label().as_bytes(),
            },
        )
        .map_err(|e| CipherError::EncryptionFailed(format!("{e}")))?;

    let mut framed = Vec::with_capacity(NONCE_LEN + sealed.len());
    framed.extend_from_slice(&nonce);
    framed.extend_from_slice(&sealed);
    Ok(URL_SAFE_NO_PAD.encode(framed))
}

/// Decrypts a string produced by `encrypt_string` with the same key and algorithm.
pub fn decrypt_string(
    ciphertext: &str,
    keys: &dyn KeyProvider,
    algorithm: BlockAlgorithm,
) -> Result<String, CipherError> {
    let framed = URL_SAFE_NO_PAD
        .decode(ciphertext.trim().as_bytes())
        .map_err(|e| CipherError::Base64DecodeFailed(format!("{e}")))?;
    if framed.len() < NONCE_LEN + TAG_LEN {
        return Err(CipherError::DecryptionFailed(
            "ciphertext shorter than nonce and authentication tag".to_string(),
        ));
    }
    let (nonce, sealed) = framed.split_at(NONCE_LEN);

    let cipher = cipher_for(keys, algorithm)?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: algorithm.label().as_bytes(),
                },
            )
            .map_err(|e| CipherError::DecryptionFailed(format!("{e}")))?,
    );
    String::from_utf8(plaintext.to_vec())
        .map_err(|_| CipherError::DecryptionFailed("plaintext is not valid utf-8".to_string()))
}
