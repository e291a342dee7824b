//! Digest and key-derivation helpers. Digests back the value hashes used for
//! change detection; HKDF separates the per-algorithm cipher subkeys.

use std::fmt;
use std::str::FromStr;

use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("hkdf expansion failed: {0}")]
    HkdfFailed(String),
    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),
}

/// Digest algorithms available for value hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HashAlgorithm {
    #[serde(rename = "SHA256")]
    Sha256,
    #[serde(rename = "SHA512")]
    #[default]
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha512 => "SHA512",
        }
    }

    /// Length of the hex digest this algorithm produces.
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha512 => 128,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = IntegrityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().replace('-', "").as_str() {
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA512" => Ok(HashAlgorithm::Sha512),
            _ => Err(IntegrityError::UnknownAlgorithm(value.to_string())),
        }
    }
}

/// Produces a raw SHA-256 digest of the provided bytes.
pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Returns the lowercase hex digest of `data` under `algorithm`.
pub fn digest_hex(data: &[u8], algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Sha256 => to_hex(&sha256_digest(data)),
        HashAlgorithm::Sha512 => {
            let mut hasher = Sha512::new();
            hasher.update(data);
            to_hex(&hasher.finalize())
        }
    }
}

fn to_hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Derives key material using HKDF-SHA256.
pub fn hkdf_expand(
    input_key_material: &[u8],
    salt: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Vec<u8>, IntegrityError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), input_key_material);
    let mut okm = vec![0u8; length];
    hk.expand(info, &mut okm)
        .map_err(|e| IntegrityError::HkdfFailed(format!("{e}")))?;
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::{digest_hex, hkdf_expand, sha256_digest, HashAlgorithm};
    use hex::ToHex;

    #[test]
    fn hashes_to_hex() {
        assert_eq!(
            digest_hex(b"squire", HashAlgorithm::Sha256),
            "e4cf19cc9404a46c3edfff5611431c858956acdb08beb667a5617fdfd90378e4"
        );
        assert_eq!(
            sha256_digest(b"squire").encode_hex::<String>(),
            digest_hex(b"squire", HashAlgorithm::Sha256)
        );
    }

    #[test]
    fn sha512_of_empty_input() {
        assert_eq!(
            digest_hex(b"", HashAlgorithm::Sha512),
            "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce\
             47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e"
        );
    }

    #[test]
    fn sha512_of_abc() {
        assert_eq!(
            digest_hex(b"abc", HashAlgorithm::Sha512),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn digest_length_matches_algorithm() {
        for algorithm in [HashAlgorithm::Sha256, HashAlgorithm::Sha512] {
            assert_eq!(digest_hex(b"payload", algorithm).len(), algorithm.hex_len());
        }
    }

    #[test]
    fn parses_algorithm_names() {
        assert_eq!("sha-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("SHA512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
        assert!("md5".parse::<HashAlgorithm>().is_err());
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Sha512);
    }

    #[test]
    fn expands_with_hkdf() {
        let okm = hkdf_expand(b"ikm", b"salt", b"info", 42).expect("hkdf should work");
        assert_eq!(okm.len(), 42);
        let other = hkdf_expand(b"ikm", b"salt", b"other", 42).expect("hkdf should work");
        assert_ne!(okm, other);
    }
}
