//! Errors raised by stored values while reading or writing them.

use thiserror::Error;

use crate::crypto::cipher::CipherError;

#[derive(Debug, Error)]
pub enum ValueError {
    /// Persisted value could not be decoded. The caller decides whether to
    /// abort the whole load or drop this setting.
    #[error("unable to decode encrypted password value for setting {setting}: {source}")]
    Format {
        setting: String,
        #[source]
        source: CipherError,
    },
    /// A value could not be built from its transmissible form.
    #[error("illegal state: {0}")]
    IllegalState(String),
    /// Encryption failed while writing; nothing is emitted for the value.
    #[error("missing required cipher support, or other crypto fault: {0}")]
    Crypto(#[source] CipherError),
    /// The value kind does not support the requested operation.
    #[error("contract misuse: {0}")]
    ContractMisuse(&'static str),
}

impl ValueError {
    /// True for errors caused by the data being read rather than by the caller.
    pub fn is_format_error(&self) -> bool {
        matches!(self, ValueError::Format { .. })
    }
}
