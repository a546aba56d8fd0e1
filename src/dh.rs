//! Diffie-Hellman parameter sets
//!
//! A [`DhParameterSet`] owns one DH domain parameter pair (p, g), an
//! optional key pair, and the peer's public value once negotiation has
//! delivered it. Instances come from the built-in parameter tables, from a
//! persisted [`ParamStore`](crate::store::ParamStore) section, or as
//! parameter-preserving clones used to build the remote side's view.

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::store::ParamStore;
use crate::wire::{self, BitString};

const KEY_PRIME: &str = "PRIME";
const KEY_GENERATOR: &str = "GENERATOR";
const KEY_PUBLIC: &str = "PUBLIC";
const KEY_PRIVATE: &str = "PRIVATE";

/// One Diffie-Hellman domain parameter pair plus key state.
#[derive(Debug)]
pub struct DhParameterSet {
    p: Option<BigUint>,
    g: Option<BigUint>,
    public_key: Option<BigUint>,
    private_key: Option<BigUint>,
    remote_key: Option<BigUint>,
    to_send: bool,
    key_size: usize,
    from_store: bool,
}

// A clone represents a fresh party's view of shared parameters, not a
// continuation of someone else's handshake, so the remote key never copies.
impl Clone for DhParameterSet {
    fn clone(&self) -> Self {
        Self {
            p: self.p.clone(),
            g: self.g.clone(),
            public_key: self.public_key.clone(),
            private_key: self.private_key.clone(),
            remote_key: None,
            to_send: self.to_send,
            key_size: self.key_size,
            from_store: self.from_store,
        }
    }
}

impl DhParameterSet {
    /// Construct from well-known constant parameters and generate the half
    /// key immediately. `strength` is the key length in bytes, used only as
    /// a strength-ranking metric during negotiation.
    pub fn from_well_known(
        p_data: &[u8],
        g_data: &[u8],
        strength: usize,
        send: bool,
    ) -> Result<Self> {
        let mut set = Self {
            p: Some(BigUint::from_bytes_be(p_data)),
            g: Some(BigUint::from_bytes_be(g_data)),
            public_key: None,
            private_key: None,
            remote_key: None,
            to_send: send,
            key_size: strength,
            from_store: false,
        };
        set.ensure_half_key()?;
        Ok(set)
    }

    /// Load a complete parameter set from a persisted store section. All
    /// four fields must be present; a partial section is discarded as
    /// [`Error::StorageLoadIncomplete`].
    pub fn from_store(store: &ParamStore, section: &str) -> Result<Self> {
        let p = Self::store_field(store, section, KEY_PRIME)?;
        let g_raw = Self::store_field(store, section, KEY_GENERATOR)?;
        let public = Self::store_field(store, section, KEY_PUBLIC)?;
        let private = Self::store_field(store, section, KEY_PRIVATE)?;

        // GENERATOR carries a one-byte-shifted encoding: only the first
        // byte of the decoded payload is meaningful, interpreted
        // right-aligned in a buffer of the payload's size. Kept for file
        // compatibility with existing deployments.
        let mut g_buf = vec![0u8; g_raw.len()];
        g_buf[g_raw.len() - 1] = g_raw[0];
        let g = BigUint::from_bytes_be(&g_buf);

        let public = BigUint::from_bytes_be(&public);
        let key_size = public.to_bytes_be().len();

        Ok(Self {
            p: Some(BigUint::from_bytes_be(&p)),
            g: Some(g),
            public_key: Some(public),
            private_key: Some(BigUint::from_bytes_be(&private)),
            remote_key: None,
            to_send: true,
            key_size,
            from_store: true,
        })
    }

    fn store_field(store: &ParamStore, section: &str, field: &'static str) -> Result<Vec<u8>> {
        let value = store.get(section, field).ok_or(Error::StorageLoadIncomplete {
            section: section.to_string(),
            field,
        })?;
        let data = base64::decode(value)?;
        if data.is_empty() {
            return Err(Error::StorageLoadIncomplete {
                section: section.to_string(),
                field,
            });
        }
        Ok(data)
    }

    /// Generate the key pair if it does not exist yet. Sets loaded from
    /// storage, or sets that already generated, keep their key pair.
    pub fn ensure_half_key(&mut self) -> Result<()> {
        if self.from_store || self.public_key.is_some() {
            return Ok(());
        }

        let (p, g) = match (&self.p, &self.g) {
            (Some(p), Some(g)) => (p, g),
            _ => {
                return Err(Error::CryptoInitFailure(
                    "domain parameters not set".into(),
                ))
            }
        };
        if p.bits() < 3 {
            return Err(Error::CryptoInitFailure("modulus too small".into()));
        }

        let mut rng = rand::thread_rng();
        let low = BigUint::from(2u8);
        let high = p - BigUint::one();
        let private = rng.gen_biguint_range(&low, &high);
        let public = g.modpow(&private, p);

        self.private_key = Some(private);
        self.public_key = Some(public);
        Ok(())
    }

    /// Encode the public half-key at natural width. Empty when this set is
    /// marked receive-only.
    pub fn encode_half_key(&self) -> BitString {
        if !self.to_send {
            return BitString::new();
        }
        match &self.public_key {
            Some(key) => wire::encode_bit_string(key),
            None => BitString::new(),
        }
    }

    /// Encode the modulus at natural width.
    pub fn encode_modulus(&self) -> BitString {
        if !self.to_send {
            return BitString::new();
        }
        match &self.p {
            Some(p) => wire::encode_bit_string(p),
            None => BitString::new(),
        }
    }

    /// Encode the generator padded out to the modulus byte length and
    /// tagged with the modulus bit length. The wire format carries a single
    /// combined length for the pair, so asymmetric lengths would corrupt
    /// interpretation on the receiving side.
    pub fn encode_generator(&self) -> BitString {
        if !self.to_send {
            return BitString::new();
        }
        let (p, g) = match (&self.p, &self.g) {
            (Some(p), Some(g)) => (p, g),
            _ => return BitString::new(),
        };
        let padded = wire::encode_fixed_width(g, p.to_bytes_be().len());
        let mut bs = BitString::new();
        bs.set_data(p.bits() as usize, &padded);
        bs
    }

    /// Decode the peer's half-key into this (remote-view) set. Absent
    /// fields are a no-op.
    pub fn decode_half_key(&mut self, hk: &BitString) {
        if let Some(value) = wire::decode_bit_string(hk) {
            self.public_key = Some(value);
        }
    }

    /// Decode a peer-supplied modulus. Ignored when this set was loaded
    /// from storage: loaded parameters are authoritative, and accepting a
    /// peer's substitute would open a downgrade path.
    pub fn decode_modulus(&mut self, p: &BitString) {
        if self.from_store {
            return;
        }
        if let Some(value) = wire::decode_bit_string(p) {
            self.p = Some(value);
        }
    }

    /// Decode a peer-supplied generator, under the same storage guard as
    /// [`decode_modulus`](Self::decode_modulus).
    pub fn decode_generator(&mut self, g: &BitString) {
        if self.from_store {
            return;
        }
        if let Some(value) = wire::decode_bit_string(g) {
            self.g = Some(value);
        }
    }

    /// Record the peer's public value for shared-secret computation.
    pub fn set_remote_key(&mut self, key: BigUint) {
        self.remote_key = Some(key);
    }

    /// Compute the DH shared secret. Fails with [`Error::NoRemoteKey`]
    /// until [`set_remote_key`](Self::set_remote_key) has been called.
    /// The result is the secret's natural big-endian length, not re-padded.
    pub fn compute_session_key(&self) -> Result<Vec<u8>> {
        let remote = self.remote_key.as_ref().ok_or_else(|| {
            debug!("Cannot compute shared DH secret: no remote key");
            Error::NoRemoteKey
        })?;
        let (p, private) = match (&self.p, &self.private_key) {
            (Some(p), Some(x)) => (p, x),
            _ => {
                return Err(Error::CryptoInitFailure(
                    "parameter set has no key material".into(),
                ))
            }
        };
        let secret = remote.modpow(private, p);
        if secret.is_zero() {
            return Err(Error::CryptoInitFailure("degenerate shared secret".into()));
        }
        Ok(secret.to_bytes_be())
    }

    /// Write all four fields to a store section, base64 encoded. Every
    /// buffer is sized to the public key's byte length, including the
    /// modulus and generator; this matches the historical file layout and
    /// must stay for compatibility even though it re-encodes those fields
    /// at a foreign width.
    pub fn persist(&self, store: &mut ParamStore, section: &str) -> Result<()> {
        let public = self.public_key.as_ref().ok_or_else(|| {
            Error::CryptoInitFailure("no key pair to persist".into())
        })?;
        let (p, g, private) = match (&self.p, &self.g, &self.private_key) {
            (Some(p), Some(g), Some(x)) => (p, g, x),
            _ => {
                return Err(Error::CryptoInitFailure(
                    "incomplete parameter set".into(),
                ))
            }
        };
        let width = public.to_bytes_be().len();

        store.set(section, KEY_PRIME, base64::encode(left_aligned(p, width)));
        store.set(section, KEY_GENERATOR, base64::encode(left_aligned(g, width)));
        store.set(section, KEY_PUBLIC, base64::encode(left_aligned(public, width)));
        store.set(section, KEY_PRIVATE, base64::encode(left_aligned(private, width)));
        Ok(())
    }

    /// Sanity-check the domain parameters only; key-pair strength is not
    /// validated. Mirrors the classic OpenSSL `DH_check` classes: p not
    /// prime, p not a safe prime, generator unverifiable, g not a valid
    /// generator all return false.
    pub fn validate_domain_parameters(&self) -> bool {
        self.domain_parameter_fault().is_none()
    }

    /// Result form of [`validate_domain_parameters`](Self::validate_domain_parameters)
    /// for callers that treat a failed check as grounds to abort the
    /// connection rather than merely distrust the set.
    pub fn check_domain_parameters(&self) -> Result<()> {
        match self.domain_parameter_fault() {
            None => Ok(()),
            Some(fault) => Err(Error::DomainParameterInvalid(fault)),
        }
    }

    fn domain_parameter_fault(&self) -> Option<&'static str> {
        let (p, g) = match (&self.p, &self.g) {
            (Some(p), Some(g)) => (p, g),
            _ => return Some("domain parameters not set"),
        };

        if !probably_prime(p) {
            warn!("DH check: p value is not prime");
            return Some("p value is not prime");
        }
        let q = (p - BigUint::one()) >> 1;
        if !probably_prime(&q) {
            warn!("DH check: p value is not a safe prime");
            return Some("p value is not a safe prime");
        }

        let two = BigUint::from(2u8);
        let five = BigUint::from(5u8);
        if *g < two || *g > p - &two {
            warn!("DH check: the g value is not a generator");
            return Some("the g value is not a generator");
        }
        if *g == two {
            // 11 mod 24 generates the full group, 23 mod 24 the prime-order
            // subgroup; both are acceptable for key agreement.
            let r = (p % BigUint::from(24u8)).to_bytes_be()[0];
            if r != 11 && r != 23 {
                warn!("DH check: the g value is not a generator");
                return Some("the g value is not a generator");
            }
        } else if *g == five {
            let r = (p % BigUint::from(40u8)).to_bytes_be()[0];
            if r != 23 && r != 39 {
                warn!("DH check: the g value is not a generator");
                return Some("the g value is not a generator");
            }
        } else {
            // Fall back to a subgroup-order check for nonstandard bases.
            let e = g.modpow(&q, p);
            if !e.is_one() && e != p - BigUint::one() {
                warn!("DH check: unable to check the generator value");
                return Some("unable to check the generator value");
            }
        }

        None
    }

    /// True when parameters and keys were loaded verbatim from a store.
    pub fn loaded_from_store(&self) -> bool {
        self.from_store
    }

    /// Whether this set transmits its parameters, or defers to the peer's.
    pub fn to_send(&self) -> bool {
        self.to_send
    }

    /// Strength-ranking key length in bytes.
    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn public_key(&self) -> Option<&BigUint> {
        self.public_key.as_ref()
    }

    pub fn modulus(&self) -> Option<&BigUint> {
        self.p.as_ref()
    }

    pub fn generator(&self) -> Option<&BigUint> {
        self.g.as_ref()
    }
}

/// Value bytes at the start of a `width`-sized zero buffer. Values wider
/// than the buffer keep their natural length.
fn left_aligned(value: &BigUint, width: usize) -> Vec<u8> {
    let raw = value.to_bytes_be();
    if raw.len() >= width {
        return raw;
    }
    let mut out = vec![0u8; width];
    out[..raw.len()].copy_from_slice(&raw);
    out
}

/// Miller-Rabin probabilistic primality test with random bases.
fn probably_prime(n: &BigUint) -> bool {
    let two = BigUint::from(2u8);
    let three = BigUint::from(3u8);
    if *n < two {
        return false;
    }
    if *n == two || *n == three {
        return true;
    }
    if (n % &two).is_zero() {
        return false;
    }

    // n - 1 = d * 2^r with d odd
    let n_minus_one = n - BigUint::one();
    let mut d = n_minus_one.clone();
    let mut r = 0u32;
    while (&d % &two).is_zero() {
        d >>= 1;
        r += 1;
    }

    let mut rng = rand::thread_rng();
    'witness: for _ in 0..8 {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 0..r - 1 {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}
