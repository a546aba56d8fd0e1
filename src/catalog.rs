//! Static algorithm and DH parameter tables
//!
//! Immutable lookup tables tying H.235 algorithm OIDs to cipher
//! descriptors and to the DH parameter OIDs they depend on, plus the
//! well-known DH groups the registry seeds from. Lookups never fail
//! beyond "not found".

use num_bigint::BigUint;

/// Token OID advertising baseline H.235v3 support with no local parameter
/// preference; the peer's defaults apply.
pub const OID_H235_V3: &str = "0.0.8.235.0.3.24";
/// 1024-bit DH group (Oakley group 2).
pub const OID_DH1024: &str = "0.0.8.235.0.3.43";
/// 1536-bit DH group (MODP group 5).
pub const OID_DH1536: &str = "0.0.8.235.0.3.44";
/// 2048-bit DH group (MODP group 14).
pub const OID_DH2048: &str = "0.0.8.235.0.4.77";

pub const OID_DES_CBC: &str = "1.3.14.3.2.7";
pub const OID_DES_EDE3_CBC: &str = "1.2.840.113549.3.7";
pub const OID_AES128_CBC: &str = "2.16.840.1.101.3.4.1.2";
pub const OID_AES192_CBC: &str = "2.16.840.1.101.3.4.1.22";
pub const OID_AES256_CBC: &str = "2.16.840.1.101.3.4.1.42";

/// One well-known DH group. A zero strength marks a negotiate-with-
/// peer-defaults entry that carries no parameters of its own.
pub struct DhParameterSpec {
    pub oid: &'static str,
    /// Key length in bytes; the negotiation strength metric.
    pub strength: usize,
    /// Whether this side transmits the parameters, or is receive-only.
    pub send: bool,
    prime_hex: &'static str,
    generator: u8,
}

impl DhParameterSpec {
    pub fn prime_bytes(&self) -> Vec<u8> {
        decode_hex(self.prime_hex)
    }

    pub fn generator_bytes(&self) -> Vec<u8> {
        vec![self.generator]
    }

    pub fn prime(&self) -> BigUint {
        BigUint::from_bytes_be(&self.prime_bytes())
    }
}

// RFC 2409 Oakley group 2.
const DH1024_P: &str = "\
FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381FFFFFFFFFFFFFFFF";

// RFC 3526 MODP group 5.
const DH1536_P: &str = "\
FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
9ED529077096966D670C354E4ABC9804F1746C08CA237327FFFFFFFFFFFFFFFF";

// RFC 3526 MODP group 14.
const DH2048_P: &str = "\
FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF";

/// Well-known DH groups in negotiation priority order. The OIDs sort the
/// same way lexicographically, so the registry's BTreeMap iteration order
/// matches this table.
pub const DH_PARAMETERS: &[DhParameterSpec] = &[
    DhParameterSpec {
        oid: OID_H235_V3,
        strength: 0,
        send: true,
        prime_hex: "",
        generator: 0,
    },
    DhParameterSpec {
        oid: OID_DH1024,
        strength: 128,
        send: true,
        prime_hex: DH1024_P,
        generator: 2,
    },
    DhParameterSpec {
        oid: OID_DH1536,
        strength: 192,
        send: true,
        prime_hex: DH1536_P,
        generator: 2,
    },
    DhParameterSpec {
        oid: OID_DH2048,
        strength: 256,
        send: true,
        prime_hex: DH2048_P,
        generator: 2,
    },
];

/// Media cipher descriptor advertised for a negotiated DH group.
pub struct CipherDescriptor {
    pub algorithm_oid: &'static str,
    /// Short cipher name as the SSL layer knows it.
    pub cipher: &'static str,
    pub description: &'static str,
}

pub const ENCRYPTIONS: &[CipherDescriptor] = &[
    CipherDescriptor {
        algorithm_oid: OID_DES_CBC,
        cipher: "DES-CBC",
        description: "DES 56 bit",
    },
    CipherDescriptor {
        algorithm_oid: OID_DES_EDE3_CBC,
        cipher: "DES-EDE3-CBC",
        description: "Triple DES 168 bit",
    },
    CipherDescriptor {
        algorithm_oid: OID_AES128_CBC,
        cipher: "AES-128-CBC",
        description: "AES 128 bit",
    },
    CipherDescriptor {
        algorithm_oid: OID_AES192_CBC,
        cipher: "AES-192-CBC",
        description: "AES 192 bit",
    },
    CipherDescriptor {
        algorithm_oid: OID_AES256_CBC,
        cipher: "AES-256-CBC",
        description: "AES 256 bit",
    },
];

struct AlgorithmBinding {
    algorithm_oid: &'static str,
    dh_oid: &'static str,
}

const ALGORITHMS: &[AlgorithmBinding] = &[
    AlgorithmBinding { algorithm_oid: OID_DES_CBC, dh_oid: OID_DH1024 },
    AlgorithmBinding { algorithm_oid: OID_DES_EDE3_CBC, dh_oid: OID_DH1024 },
    AlgorithmBinding { algorithm_oid: OID_AES128_CBC, dh_oid: OID_DH1024 },
    AlgorithmBinding { algorithm_oid: OID_AES192_CBC, dh_oid: OID_DH1536 },
    AlgorithmBinding { algorithm_oid: OID_AES256_CBC, dh_oid: OID_DH2048 },
];

/// Short cipher name for an algorithm OID.
pub fn cipher_for_oid(oid: &str) -> Option<&'static str> {
    ENCRYPTIONS
        .iter()
        .find(|e| e.algorithm_oid == oid)
        .map(|e| e.cipher)
}

/// Algorithm OID for a short cipher name.
pub fn oid_for_cipher(cipher: &str) -> Option<&'static str> {
    ENCRYPTIONS
        .iter()
        .find(|e| e.cipher == cipher)
        .map(|e| e.algorithm_oid)
}

/// Cipher name and description for an algorithm OID.
pub fn algorithm_details(oid: &str) -> Option<(&'static str, &'static str)> {
    ENCRYPTIONS
        .iter()
        .find(|e| e.algorithm_oid == oid)
        .map(|e| (e.cipher, e.description))
}

/// The DH parameter OID an algorithm depends on.
pub fn dh_oid_for_algorithm(algorithm_oid: &str) -> Option<&'static str> {
    ALGORITHMS
        .iter()
        .find(|a| a.algorithm_oid == algorithm_oid)
        .map(|a| a.dh_oid)
}

/// All algorithm OIDs that run over the given DH parameter OID, in table
/// order.
pub fn algorithms_for_dh_oid(dh_oid: &str) -> Vec<String> {
    ALGORITHMS
        .iter()
        .filter(|a| a.dh_oid == dh_oid)
        .map(|a| a.algorithm_oid.to_string())
        .collect()
}

/// Whether an identifier names one of the well-known DH parameter sets.
pub fn is_dh_parameter_oid(identifier: &str) -> bool {
    DH_PARAMETERS.iter().any(|p| p.oid == identifier)
}

/// Full capability list for capability negotiation advertisements.
pub fn capabilities() -> &'static [CipherDescriptor] {
    ENCRYPTIONS
}

fn decode_hex(hex: &str) -> Vec<u8> {
    debug_assert!(hex.len() % 2 == 0);
    (0..hex.len() / 2)
        .map(|i| u8::from_str_radix(&hex[2 * i..2 * i + 2], 16).unwrap_or(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prime_lengths_match_strength() {
        for spec in DH_PARAMETERS.iter().filter(|s| s.strength > 0) {
            assert_eq!(spec.prime_bytes().len(), spec.strength, "{}", spec.oid);
        }
    }

    #[test]
    fn test_table_order_is_lexicographic() {
        let oids: Vec<&str> = DH_PARAMETERS.iter().map(|s| s.oid).collect();
        let mut sorted = oids.clone();
        sorted.sort();
        assert_eq!(oids, sorted);
    }

    #[test]
    fn test_algorithm_lookups() {
        assert_eq!(cipher_for_oid(OID_AES128_CBC), Some("AES-128-CBC"));
        assert_eq!(oid_for_cipher("AES-256-CBC"), Some(OID_AES256_CBC));
        assert_eq!(dh_oid_for_algorithm(OID_AES256_CBC), Some(OID_DH2048));
        assert_eq!(cipher_for_oid("9.9.9"), None);
        assert_eq!(dh_oid_for_algorithm("9.9.9"), None);
    }

    #[test]
    fn test_algorithms_for_dh1024() {
        let algs = algorithms_for_dh_oid(OID_DH1024);
        assert_eq!(algs, vec![OID_DES_CBC, OID_DES_EDE3_CBC, OID_AES128_CBC]);
        assert!(algorithms_for_dh_oid("9.9.9").is_empty());
    }

    #[test]
    fn test_dh_parameter_oid_membership() {
        assert!(is_dh_parameter_oid(OID_DH1024));
        assert!(is_dh_parameter_oid(OID_H235_V3));
        assert!(!is_dh_parameter_oid(OID_AES128_CBC));
    }
}
