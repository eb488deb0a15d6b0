use thiserror::Error;
use std::io;

/// Unified error type for the state-serde library.
#[derive(Error, Debug)]
pub enum Error {
    /// The scope is missing something a value in the tree requires,
    /// e.g. a password when a secret is encountered.
    #[error("Configuration Error: {0}")]
    ConfigurationError(String),

    /// Error raised by a secret codec (bad ciphertext, wrong password, key derivation).
    #[error("Encryption Error: {0}")]
    EncryptionError(String),

    /// Malformed envelope input or a failure converting to/from JSON.
    #[error("Codec Error: {0}")]
    CodecError(String),

    /// A schema-capable value could not export its descriptor.
    #[error("Schema Error: {0}")]
    SchemaError(String),
}

/// A specialized `Result` type for state-serde operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns true for errors caused by missing scope configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::ConfigurationError(_))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::CodecError(format!("IO Error: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CodecError(format!("JSON Error: {}", err))
    }
}
