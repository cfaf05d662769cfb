//! ECDSA on a hardware security module, reached through [SessionFactory].
//!
//! The token driver is an external collaborator. This module owns the configuration record, a
//! session pool with bounded retry on session establishment, and the provider handlers for keys
//! that live on the token. Keys that do not live on the token are handed to the software
//! handlers.

use std::sync::Arc;

use crate::{
    opts::Algorithm,
    provider::CspBuilder,
    sw::ecdsa::{EcdsaSigner, EcdsaVerifier},
};

mod ecdsa;
mod opts;
mod session;

pub use ecdsa::{
    HsmEcdsaPrivateKey, HsmEcdsaPublicKey, Pkcs11KeyGenerator, Pkcs11Signer, Pkcs11Verifier,
};
pub use opts::Pkcs11Opts;
pub use session::{Pkcs11Session, SessionFactory, SessionFault, SessionPool};

/// Register the token-backed ECDSA handlers on the builder, in place of the software ones.
pub fn register(builder: CspBuilder, pool: Arc<SessionPool>) -> CspBuilder {
    let generator = Arc::new(Pkcs11KeyGenerator::new(pool.clone()));
    builder
        .key_generator(Algorithm::Ecdsa, generator.clone())
        .key_generator(Algorithm::EcdsaP256, generator.clone())
        .key_generator(Algorithm::EcdsaP384, generator)
        .signer(
            Algorithm::Ecdsa,
            Arc::new(Pkcs11Signer::new(pool.clone(), Arc::new(EcdsaSigner))),
        )
        .verifier(
            Algorithm::Ecdsa,
            Arc::new(Pkcs11Verifier::new(pool, Arc::new(EcdsaVerifier))),
        )
}
