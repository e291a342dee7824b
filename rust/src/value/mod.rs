//! Stored setting values.
//!
//! Every setting kind answers the same set of questions (native value,
//! validation, syntax version, value hash, debug forms, XML output). The
//! kinds form a closed set, so they are variants of `StoredValue` and the
//! `SettingSyntax` of a setting picks the `ValueFactory` that reads them.

pub mod password;
pub mod string;

use zeroize::Zeroizing;

use crate::crypto::integrity::{digest_hex, HashAlgorithm};
use crate::crypto::key::KeyProvider;
use crate::document::XmlElement;
use crate::error::ValueError;
use crate::setting::{Setting, SettingSyntax};

pub use password::{PasswordData, PasswordDataError, PasswordValue};
pub use string::StringValue;

/// Printed in place of any value that must not reach logs or debug output.
pub const LOG_REMOVED_VALUE_REPLACEMENT: &str = "[removed]";

/// Digest used for value hashes unless the caller picks another.
pub const SETTING_CHECKSUM_HASH_METHOD: HashAlgorithm = HashAlgorithm::Sha512;

/// Child of a setting element that carries the value.
pub const VALUE_ELEMENT: &str = "value";

pub const PLAINTEXT_ATTRIBUTE: &str = "plaintext";

/// Hex digest of the JSON-quoted form of `text`.
pub(crate) fn canonical_hash(text: &str, algorithm: HashAlgorithm) -> String {
    let quoted = Zeroizing::new(serde_json::Value::String(text.to_owned()).to_string());
    digest_hex(quoted.as_bytes(), algorithm)
}

/// Borrowed view of the value a setting holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeValue<'a> {
    Password(&'a PasswordData),
    String(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    Password(PasswordValue),
    String(StringValue),
}

impl StoredValue {
    /// An absent value of the given syntax.
    pub fn absent(syntax: SettingSyntax) -> Self {
        match syntax {
            SettingSyntax::Password => StoredValue::Password(PasswordValue::absent()),
            SettingSyntax::String => StoredValue::String(StringValue::default()),
        }
    }

    pub fn syntax(&self) -> SettingSyntax {
        match self {
            StoredValue::Password(_) => SettingSyntax::Password,
            StoredValue::String(_) => SettingSyntax::String,
        }
    }

    pub fn native_value(&self) -> Option<NativeValue<'_>> {
        match self {
            StoredValue::Password(v) => v.native_value().map(NativeValue::Password),
            StoredValue::String(v) => v.native_value().map(NativeValue::String),
        }
    }

    pub fn validate(&self, setting: &Setting) -> Vec<String> {
        match self {
            StoredValue::Password(v) => v.validate(setting),
            StoredValue::String(v) => v.validate(setting),
        }
    }

    pub fn syntax_version(&self) -> u32 {
        match self {
            StoredValue::Password(v) => v.syntax_version(),
            StoredValue::String(v) => v.syntax_version(),
        }
    }

    pub fn value_hash(&self) -> String {
        self.value_hash_with(SETTING_CHECKSUM_HASH_METHOD)
    }

    pub fn value_hash_with(&self, algorithm: HashAlgorithm) -> String {
        match self {
            StoredValue::Password(v) => v.value_hash_with(algorithm),
            StoredValue::String(v) => v.value_hash_with(algorithm),
        }
    }

    pub fn to_debug_string(&self, locale: &str) -> String {
        match self {
            StoredValue::Password(v) => v.to_debug_string(locale),
            StoredValue::String(v) => v.to_debug_string(locale),
        }
    }

    pub fn to_debug_json(&self, locale: &str) -> serde_json::Value {
        match self {
            StoredValue::Password(v) => v.to_debug_json(locale),
            StoredValue::String(v) => v.to_debug_json(locale),
        }
    }

    /// Key-less output. Fails for kinds that must be encrypted at rest.
    pub fn to_xml_value(&self, element_name: &str) -> Result<XmlElement, ValueError> {
        match self {
            StoredValue::Password(v) => v.to_xml_value(element_name),
            StoredValue::String(v) => v.to_xml_value(element_name),
        }
    }

    pub fn to_xml_value_encrypted(
        &self,
        element_name: &str,
        keys: &dyn KeyProvider,
    ) -> Result<XmlElement, ValueError> {
        match self {
            StoredValue::Password(v) => v.to_xml_value_encrypted(element_name, keys),
            StoredValue::String(v) => v.to_xml_value_encrypted(element_name, keys),
        }
    }
}

impl From<PasswordValue> for StoredValue {
    fn from(value: PasswordValue) -> Self {
        StoredValue::Password(value)
    }
}

impl From<StringValue> for StoredValue {
    fn from(value: StringValue) -> Self {
        StoredValue::String(value)
    }
}

pub type FromJsonFn = fn(&str) -> Result<StoredValue, ValueError>;
pub type FromXmlElementFn =
    fn(&Setting, &XmlElement, &dyn KeyProvider) -> Result<StoredValue, ValueError>;

/// The two ways a value kind is read back.
#[derive(Clone, Copy)]
pub struct ValueFactory {
    pub from_json: FromJsonFn,
    pub from_xml_element: FromXmlElementFn,
}

impl SettingSyntax {
    pub fn factory(self) -> ValueFactory {
        match self {
            SettingSyntax::Password => ValueFactory {
                from_json: |raw| password::from_json(raw).map(StoredValue::from),
                from_xml_element: |setting, element, keys| {
                    password::from_xml_element(setting, element, keys).map(StoredValue::from)
                },
            },
            SettingSyntax::String => ValueFactory {
                from_json: |raw| string::from_json(raw).map(StoredValue::from),
                from_xml_element: |setting, element, keys| {
                    string::from_xml_element(setting, element, keys).map(StoredValue::from)
                },
            },
        }
    }
}
