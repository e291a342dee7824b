//! Central cryptography module: key material, the string cipher used for
//! stored setting values, and the digest helpers behind value hashes. Each
//! submodule keeps to one responsibility so the security model stays easy to audit.

pub mod cipher;
pub mod integrity;
pub mod key;
