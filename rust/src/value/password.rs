//! Password setting values.
//!
//! A `PasswordValue` is either absent or holds a non-empty secret. It is
//! always encrypted under `BlockAlgorithm::Config` when written, and is never
//! rendered: `Display`, `Debug` and both debug forms print the removal
//! sentinel. Documents may still carry `plaintext="true"` values written by
//! hand; those are accepted on read but never produced.

use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::cipher::{decrypt_string, encrypt_string, BlockAlgorithm};
use crate::crypto::integrity::HashAlgorithm;
use crate::crypto::key::KeyProvider;
use crate::document::XmlElement;
use crate::error::ValueError;
use crate::setting::Setting;
use crate::value::{
    canonical_hash, LOG_REMOVED_VALUE_REPLACEMENT, PLAINTEXT_ATTRIBUTE,
    SETTING_CHECKSUM_HASH_METHOD, VALUE_ELEMENT,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordDataError {
    #[error("password data may not be empty")]
    Empty,
    #[error("password data may not contain NUL characters")]
    ContainsNul,
}

/// A non-empty secret string, zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordData {
    secret: Zeroizing<String>,
}

impl PasswordData {
    pub fn new(secret: impl Into<String>) -> Result<Self, PasswordDataError> {
        let secret = Zeroizing::new(secret.into());
        if secret.is_empty() {
            return Err(PasswordDataError::Empty);
        }
        if secret.contains('\0') {
            return Err(PasswordDataError::ContainsNul);
        }
        Ok(Self { secret })
    }

    /// The secret itself. Callers must not log or display it.
    pub fn expose_secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for PasswordData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(LOG_REMOVED_VALUE_REPLACEMENT)
    }
}

impl fmt::Display for PasswordData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(LOG_REMOVED_VALUE_REPLACEMENT)
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct PasswordValue {
    value: Option<PasswordData>,
}

impl PasswordValue {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn new(data: PasswordData) -> Self {
        Self { value: Some(data) }
    }

    /// Empty input yields an absent value.
    pub fn from_plaintext(plaintext: &str) -> Result<Self, PasswordDataError> {
        if plaintext.is_empty() {
            return Ok(Self::absent());
        }
        PasswordData::new(plaintext).map(Self::new)
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    pub fn native_value(&self) -> Option<&PasswordData> {
        self.value.as_ref()
    }

    /// Secrets are not structurally validated.
    pub fn validate(&self, _setting: &Setting) -> Vec<String> {
        Vec::new()
    }

    pub fn syntax_version(&self) -> u32 {
        0
    }

    pub fn value_hash(&self) -> String {
        self.value_hash_with(SETTING_CHECKSUM_HASH_METHOD)
    }

    /// Empty for an absent value, otherwise the hex digest of the JSON-quoted secret.
    pub fn value_hash_with(&self, algorithm: HashAlgorithm) -> String {
        match &self.value {
            None => String::new(),
            Some(data) => canonical_hash(data.expose_secret(), algorithm),
        }
    }

    pub fn to_debug_string(&self, _locale: &str) -> String {
        LOG_REMOVED_VALUE_REPLACEMENT.to_string()
    }

    pub fn to_debug_json(&self, _locale: &str) -> serde_json::Value {
        serde_json::Value::String(LOG_REMOVED_VALUE_REPLACEMENT.to_string())
    }

    /// Always fails: a password can only be written through
    /// `to_xml_value_encrypted`.
    pub fn to_xml_value(&self, _element_name: &str) -> Result<XmlElement, ValueError> {
        Err(ValueError::ContractMisuse(
            "password xml output requires a security key",
        ))
    }

    /// Builds a fresh element holding the secret encrypted under the
    /// destination document's key. An absent value yields an empty element.
    pub fn to_xml_value_encrypted(
        &self,
        element_name: &str,
        keys: &dyn KeyProvider,
    ) -> Result<XmlElement, ValueError> {
        let mut element = XmlElement::new(element_name);
        if let Some(data) = &self.value {
            let encoded = encrypt_string(data.expose_secret(), keys, BlockAlgorithm::Config)
                .map_err(ValueError::Crypto)?;
            element.set_text(encoded);
        }
        Ok(element)
    }
}

impl fmt::Debug for PasswordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(LOG_REMOVED_VALUE_REPLACEMENT)
    }
}

impl fmt::Display for PasswordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(LOG_REMOVED_VALUE_REPLACEMENT)
    }
}

/// Reads a password from its transmissible form: a JSON string or `null`.
pub fn from_json(raw: &str) -> Result<PasswordValue, ValueError> {
    if raw.trim().is_empty() {
        return Ok(PasswordValue::absent());
    }
    let parsed: Option<String> = serde_json::from_str(raw).map_err(|e| {
        ValueError::IllegalState(format!("password value can not be json de-serialized: {e}"))
    })?;
    let parsed = Zeroizing::new(parsed.unwrap_or_default());
    PasswordValue::from_plaintext(&parsed).map_err(|e| {
        ValueError::IllegalState(format!("password value can not be json de-serialized: {e}"))
    })
}

/// Reads a password from the `value` child of a setting element.
pub fn from_xml_element(
    setting: &Setting,
    setting_element: &XmlElement,
    keys: &dyn KeyProvider,
) -> Result<PasswordValue, ValueError> {
    let Some(value_element) = setting_element.get_child(VALUE_ELEMENT) else {
        return Ok(PasswordValue::absent());
    };
    // Indentation left by pretty printers counts as no value.
    let raw = match value_element.text() {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(PasswordValue::absent()),
    };

    let plaintext_setting = value_element
        .attribute_value(PLAINTEXT_ATTRIBUTE)
        .is_some_and(|flag| flag.eq_ignore_ascii_case("true"));

    if plaintext_setting {
        warn!(setting = %setting.key(), "password value is stored without encryption");
        return PasswordData::new(raw)
            .map(PasswordValue::new)
            .map_err(|e| ValueError::IllegalState(format!("setting {}: {e}", setting.key())));
    }

    let decrypted = decrypt_string(raw, keys, BlockAlgorithm::Config).map_err(|source| {
        ValueError::Format {
            setting: setting.key().to_string(),
            source,
        }
    })?;
    debug!(setting = %setting.key(), "decrypted password value");
    PasswordData::new(decrypted)
        .map(PasswordValue::new)
        .map_err(|e| ValueError::IllegalState(format!("setting {}: {e}", setting.key())))
}

#[cfg(test)]
mod tests {
    use super::{from_json, from_xml_element, PasswordData, PasswordDataError, PasswordValue};
    use crate::crypto::cipher::{decrypt_string, encrypt_string, BlockAlgorithm, CipherError};
    use crate::crypto::integrity::HashAlgorithm;
    use crate::crypto::key::{KeyError, KeyProvider, SecurityKey};
    use crate::document::XmlElement;
    use crate::error::ValueError;
    use crate::setting::{Setting, SettingSyntax};
    use crate::value::LOG_REMOVED_VALUE_REPLACEMENT;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    /// Counts key requests and never hands out a key.
    #[derive(Default)]
    struct CountingNoKey {
        calls: AtomicUsize,
    }

    impl KeyProvider for CountingNoKey {
        fn security_key(&self) -> Result<SecurityKey, KeyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(KeyError::MissingKeySource)
        }
    }

    fn setting() -> Setting {
        Setting::new("ldap.proxy.password", SettingSyntax::Password)
    }

    fn setting_element(value: XmlElement) -> XmlElement {
        XmlElement::new("setting").with_child(value)
    }

    fn present(secret: &str) -> PasswordValue {
        PasswordValue::new(PasswordData::new(secret).unwrap())
    }

    #[test]
    fn password_data_rejects_empty_and_nul() {
        assert_eq!(PasswordData::new("").unwrap_err(), PasswordDataError::Empty);
        assert_eq!(PasswordData::new("a\0b").unwrap_err(), PasswordDataError::ContainsNul);
        assert_eq!(PasswordData::new("x").unwrap().expose_secret(), "x");
    }

    #[test]
    fn json_null_and_empty_are_absent() {
        for raw in ["", "  ", "null", "\"\""] {
            let value = from_json(raw).expect("absent input is valid");
            assert!(!value.is_present(), "{raw:?} should be absent");
            assert!(value.native_value().is_none());
            assert_eq!(value.value_hash(), "");
        }
    }

    #[test]
    fn json_string_is_present() {
        let value = from_json("\"hunter2\"").unwrap();
        assert_eq!(value.native_value().unwrap().expose_secret(), "hunter2");
    }

    #[test]
    fn json_construction_failure_becomes_illegal_state() {
        let err = from_json("\"a\\u0000b\"").unwrap_err();
        match err {
            ValueError::IllegalState(message) => {
                assert!(message.contains("can not be json de-serialized"));
                assert!(message.contains("NUL"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(from_json("42"), Err(ValueError::IllegalState(_))));
        assert!(matches!(from_json("\"unterminated"), Err(ValueError::IllegalState(_))));
    }

    #[test]
    fn missing_child_or_text_is_absent() {
        let keys = CountingNoKey::default();
        let no_child = XmlElement::new("setting");
        let empty_child = setting_element(XmlElement::new("value"));
        let empty_text = setting_element(XmlElement::new("value").with_text(""));
        let indented = setting_element(XmlElement::new("value").with_text("\n    "));

        for element in [no_child, empty_child, empty_text, indented] {
            let value = from_xml_element(&setting(), &element, &keys).unwrap();
            assert!(!value.is_present());
        }
        assert_eq!(keys.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn plaintext_attribute_skips_decryption() {
        let keys = CountingNoKey::default();
        let element = setting_element(
            XmlElement::new("value")
                .with_attribute("plaintext", "true")
                .with_text("hello"),
        );

        let value = from_xml_element(&setting(), &element, &keys).unwrap();
        assert_eq!(value.native_value().unwrap().expose_secret(), "hello");
        assert_eq!(keys.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn plaintext_attribute_is_case_insensitive_and_defaults_to_false() {
        let key = SecurityKey::generate();
        let upper = setting_element(
            XmlElement::new("value")
                .with_attribute("plaintext", "TRUE")
                .with_text("hello"),
        );
        assert!(from_xml_element(&setting(), &upper, &key).unwrap().is_present());

        for flag in ["false", "yes", "1", ""] {
            let element = setting_element(
                XmlElement::new("value")
                    .with_attribute("plaintext", flag)
                    .with_text("hello"),
            );
            let err = from_xml_element(&setting(), &element, &key).unwrap_err();
            assert!(err.is_format_error(), "flag {flag:?} must take the decrypt path");
        }
    }

    #[test]
    fn decrypts_encrypted_text() {
        let key = SecurityKey::generate();
        let sealed = encrypt_string("hunter2", &key, BlockAlgorithm::Config).unwrap();
        let element = setting_element(XmlElement::new("value").with_text(sealed));

        let value = from_xml_element(&setting(), &element, &key).unwrap();
        assert_eq!(value.native_value().unwrap().expose_secret(), "hunter2");
    }

    #[test]
    fn cross_key_read_is_a_format_error() {
        let k1 = SecurityKey::generate();
        let k2 = SecurityKey::generate();
        let sealed = encrypt_string("hunter2", &k1, BlockAlgorithm::Config).unwrap();
        let element = setting_element(XmlElement::new("value").with_text(sealed));

        let err = from_xml_element(&setting(), &element, &k2).unwrap_err();
        match &err {
            ValueError::Format { setting, source } => {
                assert_eq!(setting, "ldap.proxy.password");
                assert!(matches!(source, CipherError::DecryptionFailed(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("ldap.proxy.password"));
        assert!(!err.to_string().contains("hunter2"));
    }

    #[test]
    fn value_under_other_algorithm_is_a_format_error() {
        let key = SecurityKey::generate();
        let sealed = encrypt_string("hunter2", &key, BlockAlgorithm::Token).unwrap();
        let element = setting_element(XmlElement::new("value").with_text(sealed));
        assert!(from_xml_element(&setting(), &element, &key).unwrap_err().is_format_error());
    }

    #[test]
    fn encrypted_write_round_trips() {
        let key = SecurityKey::generate();
        let element = present("hunter2").to_xml_value_encrypted("value", &key).unwrap();

        assert_eq!(element.name(), "value");
        assert!(element.attribute_value("plaintext").is_none());
        let text = element.text().expect("ciphertext");
        assert_ne!(text, "hunter2");
        assert_eq!(decrypt_string(text, &key, BlockAlgorithm::Config).unwrap(), "hunter2");
    }

    #[test]
    fn absent_write_is_empty_element() {
        let keys = CountingNoKey::default();
        let element = PasswordValue::absent().to_xml_value_encrypted("pwd", &keys).unwrap();
        assert_eq!(element, XmlElement::new("pwd"));
        assert_eq!(keys.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn encryption_failure_aborts_write() {
        let keys = CountingNoKey::default();
        let err = present("hunter2").to_xml_value_encrypted("value", &keys).unwrap_err();
        assert!(matches!(err, ValueError::Crypto(CipherError::Key(_))));
    }

    #[test]
    fn keyless_write_is_contract_misuse() {
        for value in [present("hunter2"), PasswordValue::absent()] {
            assert!(matches!(value.to_xml_value("value"), Err(ValueError::ContractMisuse(_))));
        }
    }

    #[test]
    fn value_hash_is_stable_and_content_based() {
        let a = present("hunter2");
        let b = from_json("\"hunter2\"").unwrap();
        let c = present("hunter3");

        assert_eq!(a.value_hash(), b.value_hash());
        assert_ne!(a.value_hash(), c.value_hash());
        assert_eq!(a.value_hash().len(), HashAlgorithm::Sha512.hex_len());
        assert_eq!(
            a.value_hash_with(HashAlgorithm::Sha256),
            crate::crypto::integrity::digest_hex(b"\"hunter2\"", HashAlgorithm::Sha256)
        );
        assert!(!a.value_hash().contains("hunter2"));
    }

    #[test]
    fn contract_constants() {
        let value = present("hunter2");
        assert!(value.validate(&setting()).is_empty());
        assert!(PasswordValue::absent().validate(&setting()).is_empty());
        assert_eq!(value.syntax_version(), 0);
    }

    #[test]
    fn display_and_debug_are_redacted() {
        let value = present("hunter2");
        assert_eq!(format!("{value}"), LOG_REMOVED_VALUE_REPLACEMENT);
        assert_eq!(format!("{value:?}"), LOG_REMOVED_VALUE_REPLACEMENT);
        assert_eq!(format!("{:?}", value.native_value()), "Some([removed])");
        assert_eq!(format!("{}", PasswordValue::absent()), LOG_REMOVED_VALUE_REPLACEMENT);
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn values_are_shareable_across_threads() {
        assert_send_sync::<PasswordData>();
        assert_send_sync::<PasswordValue>();

        let value = Arc::new(present("hunter2"));
        let expected = (value.value_hash(), value.to_debug_string("en"));
        thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let value = Arc::clone(&value);
                    scope.spawn(move || (value.value_hash(), value.to_debug_string("en")))
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    proptest! {
        #[test]
        fn prop_debug_forms_never_show_content(
            secret in "\\PC{0,64}",
            locale in prop::sample::select(vec!["en", "de", "fr_CA", "zh-Hant", ""]),
        ) {
            let value = PasswordValue::from_plaintext(&secret).unwrap_or_default();
            prop_assert_eq!(value.to_debug_string(locale), LOG_REMOVED_VALUE_REPLACEMENT);
            prop_assert_eq!(
                value.to_debug_json(locale),
                serde_json::Value::String(LOG_REMOVED_VALUE_REPLACEMENT.to_string())
            );
        }

        #[test]
        fn prop_equal_secrets_hash_equally(secret in "\\PC{1,64}") {
            let a = PasswordValue::from_plaintext(&secret).unwrap();
            let b = PasswordValue::from_plaintext(&secret.clone()).unwrap();
            prop_assert_eq!(a.value_hash(), b.value_hash());
        }
    }
}
