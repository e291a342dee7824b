//! Setting identity as seen by the value kinds: a key and the syntax that
//! decides which value kind stores it.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown setting syntax: {0}")]
pub struct UnknownSyntax(pub String);

/// Discriminator selecting the value kind of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingSyntax {
    Password,
    String,
}

impl SettingSyntax {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingSyntax::Password => "PASSWORD",
            SettingSyntax::String => "STRING",
        }
    }

    /// Whether values of this syntax must be encrypted at rest.
    pub fn is_confidential(&self) -> bool {
        matches!(self, SettingSyntax::Password)
    }
}

impl fmt::Display for SettingSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingSyntax {
    type Err = UnknownSyntax;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PASSWORD" => Ok(SettingSyntax::Password),
            "STRING" => Ok(SettingSyntax::String),
            other => Err(UnknownSyntax(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Setting {
    key: String,
    syntax: SettingSyntax,
}

impl Setting {
    pub fn new(key: impl Into<String>, syntax: SettingSyntax) -> Self {
        Self {
            key: key.into(),
            syntax,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn syntax(&self) -> SettingSyntax {
        self.syntax
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}
