//! Configuration documents holding many settings.
//!
//! ```xml
//! <configuration>
//!   <setting key="ldap.proxy.password" syntax="PASSWORD" syntaxVersion="0">
//!     <value>cipherText</value>
//!   </setting>
//! </configuration>
//! ```
//!
//! Loading builds an independent `StoredValue` per setting. Saving always
//! builds a new document, encrypting confidential values under the
//! destination key, so re-keying is a load under one key and a save under another.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::crypto::integrity::{digest_hex, HashAlgorithm};
use crate::crypto::key::KeyProvider;
use crate::document::{XmlElement, XmlError};
use crate::error::ValueError;
use crate::setting::{Setting, SettingSyntax, UnknownSyntax};
use crate::value::{StoredValue, VALUE_ELEMENT};

pub const ROOT_ELEMENT: &str = "configuration";
pub const SETTING_ELEMENT: &str = "setting";
const KEY_ATTRIBUTE: &str = "key";
const SYNTAX_ATTRIBUTE: &str = "syntax";
const SYNTAX_VERSION_ATTRIBUTE: &str = "syntaxVersion";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error("unexpected root element <{0}>")]
    UnexpectedRoot(String),
    #[error("setting element is missing the {0} attribute")]
    MissingAttribute(&'static str),
    #[error(transparent)]
    UnknownSyntax(#[from] UnknownSyntax),
    #[error("setting {0} appears more than once")]
    DuplicateSetting(String),
    #[error("setting {setting} has syntax {expected}, got a {actual} value")]
    SyntaxMismatch {
        setting: String,
        expected: SettingSyntax,
        actual: SettingSyntax,
    },
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// What to do with a setting whose value cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Abort the whole load on the first unreadable value.
    #[default]
    Strict,
    /// Drop the setting and report it in `LoadOutcome::skipped`.
    SkipInvalid,
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub configuration: StoredConfiguration,
    pub skipped: Vec<ValueError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredConfiguration {
    settings: BTreeMap<String, (Setting, StoredValue)>,
}

impl StoredConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and decodes a configuration document.
    pub fn from_xml(
        xml: &str,
        keys: &dyn KeyProvider,
        policy: LoadPolicy,
    ) -> Result<LoadOutcome, StoreError> {
        let root = XmlElement::parse(xml)?;
        Self::from_document(&root, keys, policy)
    }

    #[instrument(skip_all, fields(policy = ?policy))]
    pub fn from_document(
        root: &XmlElement,
        keys: &dyn KeyProvider,
        policy: LoadPolicy,
    ) -> Result<LoadOutcome, StoreError> {
        if root.name() != ROOT_ELEMENT {
            return Err(StoreError::UnexpectedRoot(root.name().to_string()));
        }

        let mut configuration = StoredConfiguration::new();
        let mut skipped = Vec::new();
        let mut seen = BTreeSet::new();

        for element in root.children_named(SETTING_ELEMENT) {
            let key = element
                .attribute_value(KEY_ATTRIBUTE)
                .ok_or(StoreError::MissingAttribute(KEY_ATTRIBUTE))?;
            let syntax: SettingSyntax = element
                .attribute_value(SYNTAX_ATTRIBUTE)
                .ok_or(StoreError::MissingAttribute(SYNTAX_ATTRIBUTE))?
                .parse()?;
            // Skipped settings count too, so a later duplicate cannot stand in for them.
            if !seen.insert(key) {
                return Err(StoreError::DuplicateSetting(key.to_string()));
            }
            let setting = Setting::new(key, syntax);

            let value = match (syntax.factory().from_xml_element)(&setting, element, keys) {
                Ok(value) => value,
                Err(err) if policy == LoadPolicy::SkipInvalid => {
                    warn!(setting = %setting.key(), error = %err, "skipping unreadable setting");
                    skipped.push(err);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            check_syntax_version(&setting, element, &value);
            configuration
                .settings
                .insert(key.to_string(), (setting, value));
        }

        debug!(
            settings = configuration.settings.len(),
            skipped = skipped.len(),
            "loaded configuration document"
        );
        Ok(LoadOutcome {
            configuration,
            skipped,
        })
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn read_setting(&self, key: &str) -> Option<&StoredValue> {
        self.settings.get(key).map(|(_, value)| value)
    }

    /// Settings in key order.
    pub fn settings(&self) -> impl Iterator<Item = (&Setting, &StoredValue)> {
        self.settings.values().map(|(setting, value)| (setting, value))
    }

    /// Replaces the value of a setting wholesale and returns the previous one.
    pub fn write_setting(
        &mut self,
        setting: Setting,
        value: StoredValue,
    ) -> Result<Option<StoredValue>, StoreError> {
        if value.syntax() != setting.syntax() {
            return Err(StoreError::SyntaxMismatch {
                setting: setting.key().to_string(),
                expected: setting.syntax(),
                actual: value.syntax(),
            });
        }
        let previous = self
            .settings
            .insert(setting.key().to_string(), (setting, value));
        Ok(previous.map(|(_, value)| value))
    }

    pub fn remove_setting(&mut self, key: &str) -> Option<StoredValue> {
        self.settings.remove(key).map(|(_, value)| value)
    }

    /// Validation messages of every setting, in key order.
    pub fn validate(&self) -> Vec<String> {
        self.settings()
            .flat_map(|(setting, value)| value.validate(setting))
            .collect()
    }

    /// Builds a new document with every value written for the destination key.
    #[instrument(skip_all, fields(settings = self.settings.len()))]
    pub fn to_document(&self, keys: &dyn KeyProvider) -> Result<XmlElement, StoreError> {
        let mut root = XmlElement::new(ROOT_ELEMENT);
        for (setting, value) in self.settings() {
            let mut element = XmlElement::new(SETTING_ELEMENT)
                .with_attribute(KEY_ATTRIBUTE, setting.key())
                .with_attribute(SYNTAX_ATTRIBUTE, setting.syntax().as_str())
                .with_attribute(SYNTAX_VERSION_ATTRIBUTE, value.syntax_version().to_string());
            element.add_child(value.to_xml_value_encrypted(VALUE_ELEMENT, keys)?);
            root.add_child(element);
        }
        let confidential = self
            .settings()
            .filter(|(setting, _)| setting.syntax().is_confidential())
            .count();
        debug!(confidential, "built configuration document");
        Ok(root)
    }

    pub fn to_xml(&self, keys: &dyn KeyProvider) -> Result<String, StoreError> {
        Ok(self.to_document(keys)?.to_xml_string()?)
    }

    /// Hash over every setting's key, syntax and value hash. Changes whenever
    /// any value changes; never exposes values.
    pub fn value_hash(&self, algorithm: HashAlgorithm) -> String {
        let mut listing = String::new();
        for (setting, value) in self.settings() {
            listing.push_str(setting.key());
            listing.push('\t');
            listing.push_str(setting.syntax().as_str());
            listing.push('\t');
            listing.push_str(&value.value_hash_with(algorithm));
            listing.push('\n');
        }
        digest_hex(listing.as_bytes(), algorithm)
    }
}

fn check_syntax_version(setting: &Setting, element: &XmlElement, value: &StoredValue) {
    let Some(raw) = element.attribute_value(SYNTAX_VERSION_ATTRIBUTE) else {
        return;
    };
    match raw.parse::<u32>() {
        Ok(stored) if stored == value.syntax_version() => {}
        Ok(stored) => warn!(
            setting = %setting.key(),
            stored,
            current = value.syntax_version(),
            "setting was written with a different syntax version"
        ),
        Err(_) => warn!(setting = %setting.key(), "ignoring unparsable syntax version"),
    }
}
