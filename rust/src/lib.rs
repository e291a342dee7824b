//! Encrypted-at-rest setting values for XML configuration documents.
//! Secrets are always written encrypted, are never rendered in logs or debug
//! output, and are compared through value hashes instead of their content.

pub mod config;
pub mod crypto;
pub mod document;
pub mod error;
pub mod setting;
pub mod store;
pub mod value;

pub use crypto::key::{KeyProvider, SecurityKey};
pub use document::XmlElement;
pub use error::ValueError;
pub use setting::{Setting, SettingSyntax};
pub use store::{LoadPolicy, StoredConfiguration};
pub use value::{PasswordData, PasswordValue, StoredValue, StringValue, ValueFactory};
