//! # H.235.6 media-encryption key agreement
//!
//! Diffie-Hellman key agreement for H.323 call signaling, per H.235.6:
//! DH parameters are negotiated inside clear tokens over the two-message
//! Setup/Connect exchange, the strongest common group wins, and both ends
//! derive the same shared secret for the media session ciphers.
//!
//! The crate is organised leaf-first:
//!
//! - [`wire`]: fixed-width and bit-string big-integer encoding
//! - [`store`]: the persisted parameter file format
//! - [`dh`]: one DH parameter set with key generation and persistence
//! - [`catalog`]: well-known DH groups and cipher algorithm tables
//! - [`registry`]: per-call parameter maps and the process-wide cache
//! - [`authenticator`]: the mechanism trait, factory, and token records
//! - [`h2356`]: the negotiation state machine itself

pub mod authenticator;
pub mod catalog;
pub mod dh;
pub mod error;
pub mod h2356;
pub mod registry;
pub mod store;
pub mod wire;

pub use authenticator::{
    create_mechanism, register_mechanism, CapabilitySink, ClearToken, DhKeySet,
    MediaAuthenticator, ValidationResult,
};
pub use dh::DhParameterSet;
pub use error::{Error, Result};
pub use h2356::{H2356Authenticator, SignalPdu};
pub use registry::{DhMap, DhSharedCache, ParamFileSource};
pub use store::ParamStore;
pub use wire::BitString;
