//! Authenticator mechanism trait, factory, and clear-token records
//!
//! H.235 defines several authentication mechanisms; each is one
//! implementation of [`MediaAuthenticator`], selected by name through the
//! process-wide factory. The clear-token records carried inside signaling
//! messages are modeled as plain structured data; ASN.1 encoding is the
//! signaling stack's concern.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::dh::DhParameterSet;
use crate::error::{Error, Result};
use crate::wire::BitString;

/// The DH key group of a clear token: half-key, modulus and generator,
/// each an optional bit-string field.
#[derive(Debug, Clone, Default)]
pub struct DhKeySet {
    pub half_key: BitString,
    pub mod_size: BitString,
    pub generator: BitString,
}

/// One clear token attached to a signaling message.
#[derive(Debug, Clone)]
pub struct ClearToken {
    /// Identifier of the parameter set this token speaks for.
    pub token_oid: String,
    /// DH fields; absent for identifier-only tokens that defer to the
    /// receiver's own defaults.
    pub dh_key: Option<DhKeySet>,
}

impl ClearToken {
    pub fn new(token_oid: impl Into<String>) -> Self {
        Self {
            token_oid: token_oid.into(),
            dh_key: None,
        }
    }
}

/// Outcome of validating a peer's token list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    /// Tokens accepted; negotiation advanced.
    Ok,
    /// No usable parameter set survived; the mechanism is absent for this
    /// call.
    Absent,
    /// The mechanism is disabled and takes no further part in the call.
    Disabled,
}

/// Trait implemented by every H.235 authenticator mechanism.
pub trait MediaAuthenticator: Send {
    /// Mechanism name as registered with the factory.
    fn name(&self) -> &'static str;

    /// Build the clear tokens for an outgoing signaling message.
    fn prepare_tokens(&mut self) -> Result<Vec<ClearToken>>;

    /// Reconcile an incoming message's clear tokens against local state.
    fn validate_tokens(&mut self, tokens: &[ClearToken]) -> Result<ValidationResult>;

    /// Whether this mechanism is still participating in the call.
    fn is_active(&self) -> bool;

    /// Currently advertised media algorithm OIDs.
    fn algorithms(&self) -> Vec<String>;
}

/// External capability-negotiation collaborator. Receives the negotiated
/// algorithm list and parameter set once the handshake completes; the
/// is-master flag passes through from the connection unchanged.
pub trait CapabilitySink: Send {
    fn set_dh_key_pair(&mut self, alg_oids: &[String], dh: &DhParameterSet, is_master: bool);
}

type MechanismCtor = fn() -> Box<dyn MediaAuthenticator>;

static MECHANISMS: Lazy<RwLock<HashMap<&'static str, MechanismCtor>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register a mechanism constructor under its name. Later registrations
/// replace earlier ones.
pub fn register_mechanism(name: &'static str, ctor: MechanismCtor) {
    MECHANISMS.write().insert(name, ctor);
}

/// Instantiate a mechanism by name.
pub fn create_mechanism(name: &str) -> Result<Box<dyn MediaAuthenticator>> {
    let mechanisms = MECHANISMS.read();
    match mechanisms.get(name) {
        Some(ctor) => Ok(ctor()),
        None => Err(Error::UnknownMechanism(name.to_string())),
    }
}

/// Names of all registered mechanisms.
pub fn mechanism_names() -> Vec<&'static str> {
    MECHANISMS.read().keys().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullAuth;

    impl MediaAuthenticator for NullAuth {
        fn name(&self) -> &'static str {
            "Null"
        }
        fn prepare_tokens(&mut self) -> Result<Vec<ClearToken>> {
            Ok(Vec::new())
        }
        fn validate_tokens(&mut self, _tokens: &[ClearToken]) -> Result<ValidationResult> {
            Ok(ValidationResult::Disabled)
        }
        fn is_active(&self) -> bool {
            false
        }
        fn algorithms(&self) -> Vec<String> {
            Vec::new()
        }
    }

    #[test]
    fn test_factory_round_trip() {
        register_mechanism("Null", || Box::new(NullAuth));
        let auth = create_mechanism("Null").unwrap();
        assert_eq!(auth.name(), "Null");
        assert!(mechanism_names().contains(&"Null"));
    }

    #[test]
    fn test_unknown_mechanism() {
        assert!(matches!(
            create_mechanism("NoSuchMechanism"),
            Err(Error::UnknownMechanism(_))
        ));
    }
}
