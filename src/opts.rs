//! Option records for each provider operation.
//!
//! Every record reports the [Algorithm] tag the provider dispatches on, and key-producing records
//! report whether the resulting key is ephemeral (never persisted to the key store).

use core::fmt;
use std::sync::Arc;

use crate::{
    error::{Error, Result},
    idemix::{Attribute, Nonce, NonceLedger},
    key::KeyRef,
};

/// Algorithm identifiers used to route an operation to its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Algorithm {
    Ecdsa,
    EcdsaP256,
    EcdsaP384,
    EcdsaReRand,
    Aes,
    Aes128,
    Aes192,
    Aes256,
    Hmac,
    HmacTruncated256,
    Sha,
    Sha2,
    Sha3,
    Sha256,
    Sha384,
    Sha3_256,
    Sha3_384,
    X509Certificate,
    IdemixIssuer,
    IdemixUserSecret,
    IdemixNym,
    IdemixRevocation,
    IdemixCredentialRequest,
    IdemixCredential,
    IdemixSignature,
    IdemixNymSignature,
    IdemixCri,
}

impl Algorithm {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Ecdsa => "ECDSA",
            Algorithm::EcdsaP256 => "ECDSAP256",
            Algorithm::EcdsaP384 => "ECDSAP384",
            Algorithm::EcdsaReRand => "ECDSA_RERAND",
            Algorithm::Aes => "AES",
            Algorithm::Aes128 => "AES128",
            Algorithm::Aes192 => "AES192",
            Algorithm::Aes256 => "AES256",
            Algorithm::Hmac => "HMAC",
            Algorithm::HmacTruncated256 => "HMAC_TRUNCATED_256",
            Algorithm::Sha => "SHA",
            Algorithm::Sha2 => "SHA2",
            Algorithm::Sha3 => "SHA3",
            Algorithm::Sha256 => "SHA256",
            Algorithm::Sha384 => "SHA384",
            Algorithm::Sha3_256 => "SHA3_256",
            Algorithm::Sha3_384 => "SHA3_384",
            Algorithm::X509Certificate => "X509Certificate",
            Algorithm::IdemixIssuer => "IDEMIX_ISSUER",
            Algorithm::IdemixUserSecret => "IDEMIX_USER_SECRET",
            Algorithm::IdemixNym => "IDEMIX_NYM",
            Algorithm::IdemixRevocation => "IDEMIX_REVOCATION",
            Algorithm::IdemixCredentialRequest => "IDEMIX_CREDENTIAL_REQUEST",
            Algorithm::IdemixCredential => "IDEMIX_CREDENTIAL",
            Algorithm::IdemixSignature => "IDEMIX_SIGNATURE",
            Algorithm::IdemixNymSignature => "IDEMIX_NYM_SIGNATURE",
            Algorithm::IdemixCri => "IDEMIX_CRI",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyGenOpts {
    /// ECDSA at the provider's default security level.
    Ecdsa { temporary: bool },
    EcdsaP256 { temporary: bool },
    EcdsaP384 { temporary: bool },
    /// AES at the provider's default security level.
    Aes { temporary: bool },
    Aes128 { temporary: bool },
    Aes192 { temporary: bool },
    Aes256 { temporary: bool },
    IdemixIssuer {
        temporary: bool,
        attribute_names: Vec<String>,
    },
    IdemixUserSecret { temporary: bool },
    IdemixRevocation { temporary: bool },
}

impl KeyGenOpts {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            KeyGenOpts::Ecdsa { .. } => Algorithm::Ecdsa,
            KeyGenOpts::EcdsaP256 { .. } => Algorithm::EcdsaP256,
            KeyGenOpts::EcdsaP384 { .. } => Algorithm::EcdsaP384,
            KeyGenOpts::Aes { .. } => Algorithm::Aes,
            KeyGenOpts::Aes128 { .. } => Algorithm::Aes128,
            KeyGenOpts::Aes192 { .. } => Algorithm::Aes192,
            KeyGenOpts::Aes256 { .. } => Algorithm::Aes256,
            KeyGenOpts::IdemixIssuer { .. } => Algorithm::IdemixIssuer,
            KeyGenOpts::IdemixUserSecret { .. } => Algorithm::IdemixUserSecret,
            KeyGenOpts::IdemixRevocation { .. } => Algorithm::IdemixRevocation,
        }
    }

    pub fn ephemeral(&self) -> bool {
        match self {
            KeyGenOpts::Ecdsa { temporary }
            | KeyGenOpts::EcdsaP256 { temporary }
            | KeyGenOpts::EcdsaP384 { temporary }
            | KeyGenOpts::Aes { temporary }
            | KeyGenOpts::Aes128 { temporary }
            | KeyGenOpts::Aes192 { temporary }
            | KeyGenOpts::Aes256 { temporary }
            | KeyGenOpts::IdemixIssuer { temporary, .. }
            | KeyGenOpts::IdemixUserSecret { temporary }
            | KeyGenOpts::IdemixRevocation { temporary } => *temporary,
        }
    }
}

#[derive(Debug, Clone)]
pub enum KeyDerivOpts {
    /// Re-randomize an ECDSA key pair by the given expansion value.
    EcdsaReRand { temporary: bool, expansion: Vec<u8> },
    /// Derive an AES-256 key as HMAC-SHA256(key, arg) truncated to 256 bits.
    HmacTruncated256 { temporary: bool, arg: Vec<u8> },
    /// Derive an HMAC key as HMAC-SHA256(key, arg).
    Hmac { temporary: bool, arg: Vec<u8> },
    /// Derive a fresh pseudonym from a user secret key under the given issuer.
    IdemixNym {
        temporary: bool,
        issuer_public_key: KeyRef,
    },
}

impl KeyDerivOpts {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            KeyDerivOpts::EcdsaReRand { .. } => Algorithm::EcdsaReRand,
            KeyDerivOpts::HmacTruncated256 { .. } => Algorithm::HmacTruncated256,
            KeyDerivOpts::Hmac { .. } => Algorithm::Hmac,
            KeyDerivOpts::IdemixNym { .. } => Algorithm::IdemixNym,
        }
    }

    pub fn ephemeral(&self) -> bool {
        match self {
            KeyDerivOpts::EcdsaReRand { temporary, .. }
            | KeyDerivOpts::HmacTruncated256 { temporary, .. }
            | KeyDerivOpts::Hmac { temporary, .. }
            | KeyDerivOpts::IdemixNym { temporary, .. } => *temporary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyImportOpts {
    /// SEC1-encoded ECDSA public key.
    EcdsaPublicKey { temporary: bool },
    /// Big-endian ECDSA private scalar.
    EcdsaPrivateKey { temporary: bool },
    /// DER-encoded SubjectPublicKeyInfo, as carried by an X.509 certificate.
    X509PublicKey { temporary: bool },
    Aes256 { temporary: bool },
    Hmac { temporary: bool },
    IdemixIssuerPublicKey {
        temporary: bool,
        attribute_names: Vec<String>,
    },
    IdemixNymPublicKey { temporary: bool },
    IdemixRevocationPublicKey { temporary: bool },
}

impl KeyImportOpts {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            KeyImportOpts::EcdsaPublicKey { .. } | KeyImportOpts::EcdsaPrivateKey { .. } => {
                Algorithm::Ecdsa
            }
            KeyImportOpts::X509PublicKey { .. } => Algorithm::X509Certificate,
            KeyImportOpts::Aes256 { .. } => Algorithm::Aes,
            KeyImportOpts::Hmac { .. } => Algorithm::Hmac,
            KeyImportOpts::IdemixIssuerPublicKey { .. } => Algorithm::IdemixIssuer,
            KeyImportOpts::IdemixNymPublicKey { .. } => Algorithm::IdemixNym,
            KeyImportOpts::IdemixRevocationPublicKey { .. } => Algorithm::IdemixRevocation,
        }
    }

    pub fn ephemeral(&self) -> bool {
        match self {
            KeyImportOpts::EcdsaPublicKey { temporary }
            | KeyImportOpts::EcdsaPrivateKey { temporary }
            | KeyImportOpts::X509PublicKey { temporary }
            | KeyImportOpts::Aes256 { temporary }
            | KeyImportOpts::Hmac { temporary }
            | KeyImportOpts::IdemixIssuerPublicKey { temporary, .. }
            | KeyImportOpts::IdemixNymPublicKey { temporary }
            | KeyImportOpts::IdemixRevocationPublicKey { temporary } => *temporary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashOpts {
    /// The provider's configured default hash function.
    Sha,
    Sha256,
    Sha384,
    Sha3_256,
    Sha3_384,
}

impl HashOpts {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            HashOpts::Sha => Algorithm::Sha,
            HashOpts::Sha256 => Algorithm::Sha256,
            HashOpts::Sha384 => Algorithm::Sha384,
            HashOpts::Sha3_256 => Algorithm::Sha3_256,
            HashOpts::Sha3_384 => Algorithm::Sha3_384,
        }
    }

    /// Look up hash options by algorithm name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "SHA256" => Ok(HashOpts::Sha256),
            "SHA384" => Ok(HashOpts::Sha384),
            "SHA3_256" => Ok(HashOpts::Sha3_256),
            "SHA3_384" => Ok(HashOpts::Sha3_384),
            _ => Err(Error::UnsupportedAlgorithm(format!(
                "hash function not recognized [{name}]"
            ))),
        }
    }

    /// Hash options for a hash family ("SHA2" or "SHA3") at a security level in bits.
    pub fn for_family(family: &str, security: usize) -> Result<Self> {
        match (family, security) {
            ("SHA2", 256) => Ok(HashOpts::Sha256),
            ("SHA2", 384) => Ok(HashOpts::Sha384),
            ("SHA3", 256) => Ok(HashOpts::Sha3_256),
            ("SHA3", 384) => Ok(HashOpts::Sha3_384),
            _ => Err(Error::UnsupportedAlgorithm(format!(
                "hash family not supported [{family}] at security level [{security}]"
            ))),
        }
    }
}

/// Presentation options: everything a credential holder references when signing, and a
/// verifier references when checking the resulting signature.
#[derive(Debug, Clone)]
pub struct PresentationOpts {
    /// Pseudonym key: the secret pseudonym for signing, either half for verifying.
    pub nym: KeyRef,
    pub issuer_public_key: KeyRef,
    /// Encoded credential. Only read when signing.
    pub credential: Vec<u8>,
    /// One entry per schema attribute: [Attribute::Hidden] keeps it hidden, any other value
    /// discloses it.
    pub disclosure: Vec<Attribute>,
    /// Index of the revocation handle attribute. Must be hidden.
    pub rh_index: usize,
    /// Encoded credential revocation information for `epoch`.
    pub cri: Vec<u8>,
    pub epoch: u64,
    pub revocation_public_key: KeyRef,
}

#[derive(Debug, Clone)]
pub enum SignerOpts {
    /// The digest is signed as-is.
    Ecdsa,
    /// Build a credential request with a user secret key.
    IdemixCredentialRequest {
        issuer_public_key: KeyRef,
        nonce: Nonce,
    },
    /// Issue a credential with an issuer key over the request passed as the digest.
    IdemixCredential {
        attributes: Vec<Attribute>,
        nonces: Arc<NonceLedger>,
    },
    /// Check an issued credential (passed as the signature) with the user secret key.
    IdemixCredentialCheck { issuer_public_key: KeyRef },
    IdemixSignature(Box<PresentationOpts>),
    IdemixNym { issuer_public_key: KeyRef },
    /// Publish revocation information with a revocation key. The digest is ignored.
    IdemixCri {
        epoch: u64,
        unrevoked_handles: Vec<Attribute>,
    },
}

impl SignerOpts {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            SignerOpts::Ecdsa => Algorithm::Ecdsa,
            SignerOpts::IdemixCredentialRequest { .. } => Algorithm::IdemixCredentialRequest,
            SignerOpts::IdemixCredential { .. } | SignerOpts::IdemixCredentialCheck { .. } => {
                Algorithm::IdemixCredential
            }
            SignerOpts::IdemixSignature(_) => Algorithm::IdemixSignature,
            SignerOpts::IdemixNym { .. } => Algorithm::IdemixNymSignature,
            SignerOpts::IdemixCri { .. } => Algorithm::IdemixCri,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AesGcmOpts {
    /// Additional authenticated data bound to the ciphertext.
    pub aad: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncrypterOpts {
    AesGcm(AesGcmOpts),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecrypterOpts {
    AesGcm(AesGcmOpts),
}

impl EncrypterOpts {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            EncrypterOpts::AesGcm(_) => Algorithm::Aes,
        }
    }
}

impl DecrypterOpts {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            DecrypterOpts::AesGcm(_) => Algorithm::Aes,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Algorithm, HashOpts, KeyDerivOpts, KeyGenOpts, KeyImportOpts};
    use crate::error::Error;

    #[test]
    fn key_gen_opts_report_ephemeral() {
        for temporary in [true, false] {
            for opts in [
                KeyGenOpts::Aes128 { temporary },
                KeyGenOpts::Aes192 { temporary },
                KeyGenOpts::Aes256 { temporary },
                KeyGenOpts::EcdsaP256 { temporary },
                KeyGenOpts::EcdsaP384 { temporary },
            ] {
                assert_eq!(opts.ephemeral(), temporary);
            }
        }
        assert_eq!(
            KeyGenOpts::EcdsaP384 { temporary: false }.algorithm(),
            Algorithm::EcdsaP384
        );
    }

    #[test]
    fn rerand_opts() {
        let opts = KeyDerivOpts::EcdsaReRand {
            temporary: true,
            expansion: Vec::new(),
        };
        assert!(opts.ephemeral());
        assert_eq!(opts.algorithm().as_str(), "ECDSA_RERAND");
    }

    #[test]
    fn hmac_derivation_opts() {
        let opts = KeyDerivOpts::HmacTruncated256 {
            temporary: false,
            arg: b"arg".to_vec(),
        };
        assert!(!opts.ephemeral());
        assert_eq!(opts.algorithm().as_str(), "HMAC_TRUNCATED_256");

        let opts = KeyDerivOpts::Hmac {
            temporary: true,
            arg: b"arg".to_vec(),
        };
        assert!(opts.ephemeral());
        assert_eq!(opts.algorithm().as_str(), "HMAC");
    }

    #[test]
    fn import_opts_algorithms() {
        for temporary in [true, false] {
            let cases = [
                (KeyImportOpts::Hmac { temporary }, "HMAC"),
                (KeyImportOpts::X509PublicKey { temporary }, "X509Certificate"),
                (KeyImportOpts::Aes256 { temporary }, "AES"),
            ];
            for (opts, expected) in cases {
                assert_eq!(opts.algorithm().as_str(), expected);
                assert_eq!(opts.ephemeral(), temporary);
            }
        }
    }

    #[test]
    fn hash_opts_by_name() {
        for opts in [
            HashOpts::Sha256,
            HashOpts::Sha384,
            HashOpts::Sha3_256,
            HashOpts::Sha3_384,
        ] {
            let name = opts.algorithm().as_str();
            assert_eq!(HashOpts::from_name(name).unwrap(), opts);
        }
        let Err(Error::UnsupportedAlgorithm(msg)) = HashOpts::from_name("fool") else {
            panic!("unknown hash name was accepted");
        };
        assert!(msg.contains("hash function not recognized"));
        assert_eq!(HashOpts::Sha.algorithm().as_str(), "SHA");
    }
}
