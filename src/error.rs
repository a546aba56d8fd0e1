//! Error types for H.235.6 key agreement operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Key or parameter generation failed; the parameter set is unusable.
    #[error("Crypto initialisation failed: {0}")]
    CryptoInitFailure(String),

    /// Shared secret requested before the peer's half-key was received.
    #[error("No remote key set")]
    NoRemoteKey,

    /// A persisted parameter section is missing a required field. The
    /// whole section is discarded, never partially loaded.
    #[error("Parameter section '{section}' is missing field '{field}'")]
    StorageLoadIncomplete { section: String, field: &'static str },

    /// Negotiation finished without a common strong-enough parameter set.
    #[error("No algorithms available")]
    NoAlgorithmsAvailable,

    /// Domain parameter validation failed.
    #[error("Invalid DH domain parameters: {0}")]
    DomainParameterInvalid(&'static str),

    /// No authenticator mechanism registered under the given name.
    #[error("Unknown authenticator mechanism: {0}")]
    UnknownMechanism(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

pub type Result<T> = std::result::Result<T, Error>;
