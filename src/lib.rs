//! A pluggable cryptographic service provider.
//!
//! Callers hold opaque [Key] handles identified by their [Ski] and invoke operations through the
//! [Bccsp] facade. Each operation is routed by the [Algorithm] tag of its options record to a
//! handler registered on a [CspBuilder]. Keys that are not ephemeral are persisted to the
//! provider's [KeyStore].
//!
//! Handlers ship for software ECDSA, AES, HMAC and SHA-2/SHA-3 ([sw]), for ECDSA on a PKCS#11
//! token ([pkcs11]), and for an anonymous credential scheme with pseudonyms and revocation
//! ([idemix]). ECDSA signers emit, and verifiers require, the low-S form of a signature
//! ([ecdsa]).
//!
//! ```
//! use std::sync::Arc;
//!
//! use bccsp::{Bccsp, FactoryOpts, HashOpts, InMemoryKeyStore, KeyGenOpts, SignerOpts};
//!
//! let csp = FactoryOpts::default()
//!     .build(Arc::new(InMemoryKeyStore::new()), None)
//!     .unwrap();
//! let key = csp.key_gen(&KeyGenOpts::Ecdsa { temporary: true }).unwrap();
//! let digest = csp.hash(b"hello", &HashOpts::Sha).unwrap();
//! let signature = csp.sign(&key, &digest, &SignerOpts::Ecdsa).unwrap();
//! assert!(csp.verify(&key, &signature, &digest, &SignerOpts::Ecdsa).unwrap());
//! ```

pub mod config;
pub mod ecdsa;
pub mod error;
pub mod hash;
pub mod idemix;
pub mod key;
pub mod keystore;
pub mod logging;
pub mod opts;
pub mod pkcs11;
pub mod provider;
pub mod sw;
pub mod zkp;

pub use config::{FactoryOpts, SwOpts};
pub use error::{Error, ProtocolViolation, Result, SignatureEncodingError};
pub use key::{Key, KeyRef, Ski};
pub use keystore::{DummyKeyStore, InMemoryKeyStore, KeyStore};
pub use logging::LogSequence;
pub use opts::{
    AesGcmOpts, Algorithm, DecrypterOpts, EncrypterOpts, HashOpts, KeyDerivOpts, KeyGenOpts,
    KeyImportOpts, PresentationOpts, SignerOpts,
};
pub use provider::{Bccsp, Csp, CspBuilder};
