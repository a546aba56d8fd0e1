//! Two-party H.235.6 clear-token handshake tests

use std::sync::{Arc, Mutex};

use h235_core::catalog::{
    OID_AES128_CBC, OID_AES256_CBC, OID_DH1024, OID_DH1536, OID_DH2048, OID_H235_V3,
};
use h235_core::{
    CapabilitySink, ClearToken, DhParameterSet, DhSharedCache, Error, H2356Authenticator,
    MediaAuthenticator, ParamFileSource, ValidationResult,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// One endpoint with its own parameter cache, as two separate processes
/// would have.
fn endpoint(max_strength: usize) -> H2356Authenticator {
    init_tracing();
    let cache = DhSharedCache::new();
    H2356Authenticator::with_cache(&cache, &ParamFileSource::None, max_strength)
}

#[test]
fn test_end_to_end_handshake_agrees_on_session_key() {
    let mut alice = endpoint(usize::MAX);
    let mut bob = endpoint(usize::MAX);

    // Setup: Alice offers, Bob answers on Connect.
    let offer = alice.prepare_tokens().unwrap();
    assert_eq!(bob.validate_tokens(&offer).unwrap(), ValidationResult::Ok);
    let answer = bob.prepare_tokens().unwrap();
    assert_eq!(alice.validate_tokens(&answer).unwrap(), ValidationResult::Ok);

    // Both sides advertise the same ciphers for the strongest group.
    assert_eq!(alice.algorithms(), vec![OID_AES256_CBC]);
    assert_eq!(bob.algorithms(), alice.algorithms());

    let (alice_alg, alice_key) = alice.media_session_info().unwrap();
    let (bob_alg, bob_key) = bob.media_session_info().unwrap();
    assert_eq!(alice_alg, OID_AES256_CBC);
    assert_eq!(alice_alg, bob_alg);
    assert_eq!(alice_key, bob_key);
    assert!(!alice_key.is_empty());
}

#[test]
fn test_negotiation_prefers_strongest_common_group() {
    // Peer only offers DH1024 and DH2048; the local side also knows the
    // default identifier and DH1536.
    let mut local = endpoint(usize::MAX);
    let mut peer = endpoint(usize::MAX);

    local.prepare_tokens().unwrap();
    let offer: Vec<ClearToken> = peer
        .prepare_tokens()
        .unwrap()
        .into_iter()
        .filter(|t| t.token_oid == OID_DH1024 || t.token_oid == OID_DH2048)
        .collect();

    assert_eq!(local.validate_tokens(&offer).unwrap(), ValidationResult::Ok);

    // Identifiers the peer did not offer are pruned; both offered groups
    // survive and gained a remote entry.
    assert_eq!(local.local_identifiers(), vec![OID_DH1024, OID_DH2048]);
    assert_eq!(local.remote_identifiers(), vec![OID_DH1024, OID_DH2048]);

    // The strongest surviving group decides the cipher list.
    assert_eq!(local.algorithms(), vec![OID_AES256_CBC]);
    let (alg, _key) = local.media_session_info().unwrap();
    assert_eq!(alg, OID_AES256_CBC);
}

#[test]
fn test_weak_endpoint_limits_negotiation() {
    // One endpoint caps groups at 128 bytes; the exchange settles on
    // DH1024 and its ciphers.
    let mut strong = endpoint(usize::MAX);
    let mut weak = endpoint(128);

    let offer = strong.prepare_tokens().unwrap();
    assert_eq!(weak.validate_tokens(&offer).unwrap(), ValidationResult::Ok);
    let answer = weak.prepare_tokens().unwrap();
    assert_eq!(strong.validate_tokens(&answer).unwrap(), ValidationResult::Ok);

    assert_eq!(strong.local_identifiers(), vec![OID_H235_V3, OID_DH1024]);
    assert!(strong.algorithms().contains(&OID_AES128_CBC.to_string()));
    assert!(!strong.algorithms().contains(&OID_AES256_CBC.to_string()));

    let (_, strong_key) = strong.media_session_info().unwrap();
    let (_, weak_key) = weak.media_session_info().unwrap();
    assert_eq!(strong_key, weak_key);
}

#[test]
fn test_empty_offer_disables_both_ways() {
    let mut auth = endpoint(128);
    auth.prepare_tokens().unwrap();
    let before = auth.local_identifiers();

    assert_eq!(
        auth.validate_tokens(&[]).unwrap(),
        ValidationResult::Disabled
    );
    assert_eq!(auth.local_identifiers(), before);
    assert!(matches!(
        auth.media_session_info(),
        Err(Error::NoAlgorithmsAvailable)
    ));
}

#[test]
fn test_duplicate_tokens_do_not_build_second_remote_entry() {
    let mut local = endpoint(128);
    let mut peer = endpoint(128);

    local.prepare_tokens().unwrap();
    let mut offer = peer.prepare_tokens().unwrap();
    let dup: Vec<ClearToken> = offer.clone();
    offer.extend(dup);

    assert_eq!(local.validate_tokens(&offer).unwrap(), ValidationResult::Ok);
    assert_eq!(local.remote_identifiers(), vec![OID_DH1024]);
}

#[test]
fn test_generator_and_modulus_lengths_match_for_all_builtins() {
    let mut auth = endpoint(usize::MAX);
    let tokens = auth.prepare_tokens().unwrap();
    let mut checked = 0;
    for token in &tokens {
        if let Some(dh_key) = &token.dh_key {
            assert_eq!(
                dh_key.mod_size.data().len(),
                dh_key.generator.data().len(),
                "{}",
                token.token_oid
            );
            assert_eq!(dh_key.mod_size.bit_length(), dh_key.generator.bit_length());
            checked += 1;
        }
    }
    assert_eq!(checked, 3); // DH1024, DH1536, DH2048
}

#[test]
fn test_builtin_groups_pass_domain_validation() {
    init_tracing();
    // The RFC-group moduli are p ≡ 23 (mod 24), where g = 2 generates the
    // prime-order subgroup; the check must accept them.
    for spec in h235_core::catalog::DH_PARAMETERS
        .iter()
        .filter(|s| s.oid == OID_DH1024 || s.oid == OID_DH2048)
    {
        let set = DhParameterSet::from_well_known(
            &spec.prime_bytes(),
            &spec.generator_bytes(),
            spec.strength,
            spec.send,
        )
        .unwrap();
        assert!(set.validate_domain_parameters(), "{}", spec.oid);
        assert!(set.check_domain_parameters().is_ok(), "{}", spec.oid);
    }
}

#[derive(Default)]
struct RecordingSink {
    calls: Arc<Mutex<Vec<(Vec<String>, bool)>>>,
}

impl CapabilitySink for RecordingSink {
    fn set_dh_key_pair(&mut self, alg_oids: &[String], dh: &DhParameterSet, is_master: bool) {
        assert!(dh.public_key().is_some());
        self.calls
            .lock()
            .unwrap()
            .push((alg_oids.to_vec(), is_master));
    }
}

#[test]
fn test_capability_sink_receives_negotiated_key_pair() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut local = endpoint(128);
    let mut peer = endpoint(128);
    local.set_capability_sink(Box::new(RecordingSink { calls: calls.clone() }));
    local.set_master(true);

    let offer = local.prepare_tokens().unwrap();
    peer.validate_tokens(&offer).unwrap();
    let answer = peer.prepare_tokens().unwrap();
    local.validate_tokens(&answer).unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (algs, is_master) = &calls[0];
    assert!(algs.contains(&OID_AES128_CBC.to_string()));
    assert!(*is_master);
}

#[test]
fn test_factory_creates_std6() {
    H2356Authenticator::register();
    let auth = h235_core::create_mechanism("Std6").unwrap();
    assert_eq!(auth.name(), "Std6");
    assert!(auth.is_active());
}
