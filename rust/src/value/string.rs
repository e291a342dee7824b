//! Plain string setting values. Stored as-is; the key passed to the
//! encrypted writer is ignored.

use crate::crypto::integrity::HashAlgorithm;
use crate::crypto::key::KeyProvider;
use crate::document::XmlElement;
use crate::error::ValueError;
use crate::setting::Setting;
use crate::value::{canonical_hash, SETTING_CHECKSUM_HASH_METHOD, VALUE_ELEMENT};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringValue {
    value: Option<String>,
}

impl StringValue {
    /// Empty input yields an absent value.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            value: (!value.is_empty()).then_some(value),
        }
    }

    pub fn native_value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn validate(&self, setting: &Setting) -> Vec<String> {
        match &self.value {
            Some(value) if value.chars().any(|c| c.is_control() && c != '\n' && c != '\t') => {
                vec![format!("setting {} contains control characters", setting.key())]
            }
            _ => Vec::new(),
        }
    }

    pub fn syntax_version(&self) -> u32 {
        0
    }

    pub fn value_hash(&self) -> String {
        self.value_hash_with(SETTING_CHECKSUM_HASH_METHOD)
    }

    pub fn value_hash_with(&self, algorithm: HashAlgorithm) -> String {
        self.value
            .as_deref()
            .map(|value| canonical_hash(value, algorithm))
            .unwrap_or_default()
    }

    pub fn to_debug_string(&self, _locale: &str) -> String {
        self.value.clone().unwrap_or_default()
    }

    pub fn to_debug_json(&self, _locale: &str) -> serde_json::Value {
        self.value
            .clone()
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null)
    }

    pub fn to_xml_value(&self, element_name: &str) -> Result<XmlElement, ValueError> {
        let mut element = XmlElement::new(element_name);
        if let Some(value) = &self.value {
            element.set_text(value.as_str());
        }
        Ok(element)
    }

    pub fn to_xml_value_encrypted(
        &self,
        element_name: &str,
        _keys: &dyn KeyProvider,
    ) -> Result<XmlElement, ValueError> {
        self.to_xml_value(element_name)
    }
}

pub fn from_json(raw: &str) -> Result<StringValue, ValueError> {
    if raw.trim().is_empty() {
        return Ok(StringValue::default());
    }
    let parsed: Option<String> = serde_json::from_str(raw).map_err(|e| {
        ValueError::IllegalState(format!("string value can not be json de-serialized: {e}"))
    })?;
    Ok(parsed.map(StringValue::new).unwrap_or_default())
}

pub fn from_xml_element(
    _setting: &Setting,
    setting_element: &XmlElement,
    _keys: &dyn KeyProvider,
) -> Result<StringValue, ValueError> {
    Ok(setting_element
        .get_child(VALUE_ELEMENT)
        .and_then(XmlElement::text)
        .map(StringValue::new)
        .unwrap_or_default())
}
