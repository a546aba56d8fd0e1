//! H.235.6 media-encryption authenticator
//!
//! Drives the two-message clear-token handshake: the first outgoing
//! message offers every locally known DH parameter identifier, the peer's
//! answer narrows the set to common identifiers, and completion of the
//! exchange selects the strongest surviving group, binds the peer's
//! half-key and publishes the resulting cipher algorithm list.
//!
//! State transitions, per side:
//!
//! ```text
//! None --(prepare_tokens, first)--> Sent
//! None --(validate_tokens, first)--> Received
//! Sent --(validate_tokens)--> Complete        [finalizes security]
//! Received --(prepare_tokens)--> Complete     [finalizes security]
//! any --(empty peer offer)--> Disabled
//! any --(no identifiers survive pruning)--> Disabled
//! ```

use std::path::Path;

use tracing::{debug, trace, warn};

use crate::authenticator::{
    register_mechanism, CapabilitySink, ClearToken, DhKeySet, MediaAuthenticator,
    ValidationResult,
};
use crate::catalog;
use crate::error::{Error, Result};
use crate::registry::{release_all, DhMap, DhSharedCache, ParamFileSource};
use crate::store::ParamStore;

/// Factory name of this mechanism.
pub const MECHANISM_NAME: &str = "Std6";

/// Clear-token handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenState {
    None,
    Sent,
    Received,
    Complete,
    Disabled,
}

/// Signaling message kinds this mechanism attaches tokens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalPdu {
    Setup,
    CallProceeding,
    Alerting,
    Connect,
    Facility,
    ReleaseComplete,
}

/// H.235.6 Diffie-Hellman key-agreement authenticator, one per call.
pub struct H2356Authenticator {
    enabled: bool,
    active: bool,
    token_state: TokenState,
    local_map: DhMap,
    remote_map: DhMap,
    alg_oids: Vec<String>,
    is_master: bool,
    sink: Option<Box<dyn CapabilitySink>>,
}

impl H2356Authenticator {
    /// Build an authenticator against the process-wide shared cache, with
    /// external parameter files taken from the environment.
    pub fn new() -> Self {
        Self::with_cache(
            DhSharedCache::global(),
            &ParamFileSource::Environment,
            usize::MAX,
        )
    }

    /// Build against an explicit cache and file source, bounding accepted
    /// group strengths to `max_strength` bytes.
    pub fn with_cache(
        cache: &DhSharedCache,
        source: &ParamFileSource,
        max_strength: usize,
    ) -> Self {
        let mut auth = Self {
            enabled: true,
            active: true,
            token_state: TokenState::None,
            local_map: DhMap::new(),
            remote_map: DhMap::new(),
            alg_oids: Vec::new(),
            is_master: false,
            sink: None,
        };
        cache.populate(&mut auth.local_map, source, max_strength);
        auth
    }

    /// A fresh authenticator sharing this one's local parameters: deep
    /// clones of the local map, no remote state, handshake not started.
    pub fn duplicate(&self) -> Self {
        let mut local_map = DhMap::new();
        for (oid, entry) in &self.local_map {
            local_map.insert(oid.clone(), entry.clone());
        }
        Self {
            enabled: self.enabled,
            active: self.enabled,
            token_state: TokenState::None,
            local_map,
            remote_map: DhMap::new(),
            alg_oids: Vec::new(),
            is_master: self.is_master,
            sink: None,
        }
    }

    /// Attach the capability-negotiation collaborator that receives the
    /// negotiated key pair and algorithm list.
    pub fn set_capability_sink(&mut self, sink: Box<dyn CapabilitySink>) {
        self.sink = Some(sink);
    }

    /// Pass-through master/slave flag from the connection.
    pub fn set_master(&mut self, is_master: bool) {
        self.is_master = is_master;
    }

    /// Permanently deactivate this mechanism for the call.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.active = false;
    }

    /// Whether `identifier` names a parameter set this mechanism handles.
    pub fn is_match(identifier: &str) -> bool {
        catalog::is_dh_parameter_oid(identifier)
    }

    /// Tokens are attached to Setup and Connect only.
    pub fn is_secured_signal_pdu(&self, pdu: SignalPdu) -> bool {
        match pdu {
            SignalPdu::Setup | SignalPdu::Connect => self.enabled,
            _ => false,
        }
    }

    /// Negotiated algorithm OID plus the DH shared secret for the media
    /// session. Fails once per spec when negotiation left no algorithms,
    /// or when the shared secret cannot be computed.
    pub fn media_session_info(&self) -> Result<(String, Vec<u8>)> {
        if self.alg_oids.is_empty() {
            warn!("No algorithms available");
            return Err(Error::NoAlgorithmsAvailable);
        }
        let algorithm = self.alg_oids[0].clone();
        let dh_oid =
            catalog::dh_oid_for_algorithm(&algorithm).ok_or(Error::NoAlgorithmsAvailable)?;
        match self.local_map.get(dh_oid) {
            Some(Some(dh)) => Ok((algorithm, dh.compute_session_key()?)),
            _ => Err(Error::NoAlgorithmsAvailable),
        }
    }

    /// Persist every local parameter set that holds a key pair.
    pub fn export_parameters(&self, path: &Path) -> Result<()> {
        let mut store = ParamStore::new();
        for (oid, entry) in &self.local_map {
            if let Some(dh) = entry {
                if dh.key_size() > 0 {
                    dh.persist(&mut store, oid)?;
                }
            }
        }
        store.save(path)
    }

    /// Cipher short name and description for an advertised algorithm.
    pub fn algorithm_details(oid: &str) -> Option<(&'static str, &'static str)> {
        catalog::algorithm_details(oid)
    }

    /// Identifiers currently in the local registry, in priority order.
    pub fn local_identifiers(&self) -> Vec<String> {
        self.local_map.keys().cloned().collect()
    }

    /// Identifiers accepted from the peer so far.
    pub fn remote_identifiers(&self) -> Vec<String> {
        self.remote_map.keys().cloned().collect()
    }

    /// Register this mechanism with the authenticator factory.
    pub fn register() {
        register_mechanism(MECHANISM_NAME, || Box::new(H2356Authenticator::new()));
    }

    /// Select the strongest surviving local group, bind the peer's
    /// half-key and rebuild the advertised algorithm list. Aborts silently
    /// when no group has positive strength or the remote counterpart is
    /// missing; no algorithms are advertised in either case.
    fn initialise_security(&mut self) {
        let mut dh_oid: Option<String> = None;
        let mut best_size = 0usize;
        for (oid, entry) in &self.local_map {
            if let Some(dh) = entry {
                if dh.key_size() > best_size {
                    best_size = dh.key_size();
                    dh_oid = Some(oid.clone());
                }
            }
        }
        let dh_oid = match dh_oid {
            Some(oid) => oid,
            None => return,
        };

        let remote_public = self
            .remote_map
            .get(&dh_oid)
            .and_then(|entry| entry.as_ref())
            .and_then(|remote| remote.public_key().cloned());
        let remote_public = match remote_public {
            Some(key) => key,
            None => {
                self.alg_oids.clear();
                return;
            }
        };

        if let Some(Some(local)) = self.local_map.get_mut(&dh_oid) {
            local.set_remote_key(remote_public);
            self.alg_oids = catalog::algorithms_for_dh_oid(&dh_oid);
            debug!("Negotiated DH group {} ({} algorithms)", dh_oid, self.alg_oids.len());
            if let Some(sink) = self.sink.as_mut() {
                sink.set_dh_key_pair(&self.alg_oids, local, self.is_master);
            }
        }
    }
}

impl MediaAuthenticator for H2356Authenticator {
    fn name(&self) -> &'static str {
        MECHANISM_NAME
    }

    /// Emit one token per local identifier. Entries holding a parameter
    /// set carry the encoded half-key, modulus and generator; absent
    /// entries emit an identifier-only token that defers to the peer's
    /// defaults.
    fn prepare_tokens(&mut self) -> Result<Vec<ClearToken>> {
        if !self.is_active() || self.token_state == TokenState::Disabled {
            return Ok(Vec::new());
        }

        let mut tokens = Vec::with_capacity(self.local_map.len());
        for (oid, entry) in self.local_map.iter_mut() {
            let mut token = ClearToken::new(oid.clone());
            if let Some(dh) = entry {
                dh.ensure_half_key()?;
                token.dh_key = Some(DhKeySet {
                    half_key: dh.encode_half_key(),
                    mod_size: dh.encode_modulus(),
                    generator: dh.encode_generator(),
                });
            }
            tokens.push(token);
        }

        match self.token_state {
            TokenState::None => self.token_state = TokenState::Sent,
            TokenState::Received => {
                self.token_state = TokenState::Complete;
                self.initialise_security();
            }
            _ => {}
        }
        Ok(tokens)
    }

    /// Reconcile the peer's token list against the local registry. For
    /// each local identifier, in registry order, the first matching
    /// inbound token builds the remote entry as a parameter-preserving
    /// clone with the peer's fields decoded in; extra tokens for an
    /// already-accepted identifier are skipped. Local identifiers the peer
    /// did not offer are pruned.
    fn validate_tokens(&mut self, tokens: &[ClearToken]) -> Result<ValidationResult> {
        if !self.is_active() || self.token_state == TokenState::Disabled {
            return Ok(ValidationResult::Disabled);
        }
        if tokens.is_empty() {
            // Peer offers nothing: shut the mechanism down, but leave the
            // local registry intact.
            self.token_state = TokenState::Disabled;
            return Ok(ValidationResult::Disabled);
        }

        let local_oids: Vec<String> = self.local_map.keys().cloned().collect();
        for oid in local_oids {
            let mut found = false;
            for token in tokens.iter().filter(|t| t.token_oid == oid) {
                if !found {
                    found = true;
                    let local_set = self.local_map.get(&oid).and_then(|e| e.as_ref());
                    if let Some(local) = local_set {
                        if !self.remote_map.contains_key(&oid) {
                            // New token carrying the same p and g as ours.
                            let mut remote = local.clone();
                            if let Some(dh_key) = &token.dh_key {
                                remote.decode_half_key(&dh_key.half_key);
                                if !dh_key.mod_size.is_empty() {
                                    remote.decode_modulus(&dh_key.mod_size);
                                    remote.decode_generator(&dh_key.generator);
                                }
                            }
                            debug!("Setting encryption algorithm {}", oid);
                            self.remote_map.insert(oid.clone(), Some(remote));
                        }
                    }
                } else {
                    debug!("Removing lower priority token for {}", oid);
                }
            }
            if !found {
                trace!("Peer did not offer {}, pruning", oid);
                self.local_map.remove(&oid);
            }
        }

        if self.local_map.is_empty() {
            self.token_state = TokenState::Disabled;
            return Ok(ValidationResult::Absent);
        }

        match self.token_state {
            TokenState::None => self.token_state = TokenState::Received,
            TokenState::Sent => {
                self.token_state = TokenState::Complete;
                self.initialise_security();
            }
            _ => {}
        }
        Ok(ValidationResult::Ok)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn algorithms(&self) -> Vec<String> {
        self.alg_oids.clone()
    }
}

impl Drop for H2356Authenticator {
    fn drop(&mut self) {
        release_all(&mut self.local_map);
        release_all(&mut self.remote_map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{OID_DH1024, OID_DH2048, OID_H235_V3};

    fn test_auth(max_strength: usize) -> H2356Authenticator {
        // Private cache per test: the global cache would leak state
        // between tests run in one process.
        let cache = DhSharedCache::new();
        H2356Authenticator::with_cache(&cache, &ParamFileSource::None, max_strength)
    }

    #[test]
    fn test_prepare_emits_one_token_per_identifier() {
        let mut auth = test_auth(128);
        let tokens = auth.prepare_tokens().unwrap();
        assert_eq!(tokens.len(), 2); // default entry + DH1024

        let default = tokens.iter().find(|t| t.token_oid == OID_H235_V3).unwrap();
        assert!(default.dh_key.is_none());

        let dh1024 = tokens.iter().find(|t| t.token_oid == OID_DH1024).unwrap();
        let dh_key = dh1024.dh_key.as_ref().unwrap();
        assert!(!dh_key.half_key.is_empty());
        assert_eq!(dh_key.mod_size.data().len(), dh_key.generator.data().len());
    }

    #[test]
    fn test_empty_offer_disables_without_pruning() {
        let mut auth = test_auth(128);
        let before = auth.local_identifiers();
        let result = auth.validate_tokens(&[]).unwrap();
        assert_eq!(result, ValidationResult::Disabled);
        assert_eq!(auth.local_identifiers(), before);
        // Disabled is terminal
        assert!(auth.prepare_tokens().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_identifiers_pruned() {
        let mut auth = test_auth(128);
        auth.prepare_tokens().unwrap();
        let offer = vec![ClearToken::new("9.9.9.9")];
        let result = auth.validate_tokens(&offer).unwrap();
        assert_eq!(result, ValidationResult::Absent);
        assert!(auth.local_identifiers().is_empty());
    }

    #[test]
    fn test_disable_is_terminal() {
        let mut auth = test_auth(128);
        auth.disable();
        assert!(!auth.is_active());
        assert!(auth.prepare_tokens().unwrap().is_empty());
        assert_eq!(
            auth.validate_tokens(&[ClearToken::new(OID_DH1024)]).unwrap(),
            ValidationResult::Disabled
        );
    }

    #[test]
    fn test_secured_pdus() {
        let auth = test_auth(128);
        assert!(auth.is_secured_signal_pdu(SignalPdu::Setup));
        assert!(auth.is_secured_signal_pdu(SignalPdu::Connect));
        assert!(!auth.is_secured_signal_pdu(SignalPdu::Alerting));
        assert!(!auth.is_secured_signal_pdu(SignalPdu::ReleaseComplete));
    }

    #[test]
    fn test_session_info_before_negotiation() {
        let auth = test_auth(128);
        assert!(matches!(
            auth.media_session_info(),
            Err(Error::NoAlgorithmsAvailable)
        ));
    }

    #[test]
    fn test_duplicate_shares_parameters_not_state() {
        let mut auth = test_auth(128);
        auth.prepare_tokens().unwrap();
        let copy = auth.duplicate();
        assert_eq!(copy.local_identifiers(), auth.local_identifiers());
        assert!(copy.remote_identifiers().is_empty());
        assert!(copy.algorithms().is_empty());
    }

    #[test]
    fn test_mechanism_matches_parameter_oids() {
        assert!(H2356Authenticator::is_match(OID_DH2048));
        assert!(!H2356Authenticator::is_match("1.2.3.4"));
    }
}
