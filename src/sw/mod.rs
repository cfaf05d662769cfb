//! Software implementations of the provider handlers.

use std::sync::Arc;

use crate::{opts::Algorithm, provider::CspBuilder};

pub mod aes;
pub mod ecdsa;
pub mod hash;
pub mod hmac;

/// Register every software handler on the builder.
pub fn register(builder: CspBuilder) -> CspBuilder {
    let hasher = Arc::new(hash::ShaHasher);
    let cipher = Arc::new(aes::AesGcmCipher);
    let hmac_deriver = Arc::new(hmac::HmacKeyDeriver);

    builder
        .key_generator(Algorithm::Ecdsa, Arc::new(ecdsa::EcdsaKeyGenerator))
        .key_generator(Algorithm::Aes, Arc::new(aes::AesKeyGenerator { len: 32 }))
        .key_generator(Algorithm::Aes128, Arc::new(aes::AesKeyGenerator { len: 16 }))
        .key_generator(Algorithm::Aes192, Arc::new(aes::AesKeyGenerator { len: 24 }))
        .key_generator(Algorithm::Aes256, Arc::new(aes::AesKeyGenerator { len: 32 }))
        .key_deriver(Algorithm::EcdsaReRand, Arc::new(ecdsa::EcdsaReRandKeyDeriver))
        .key_deriver(Algorithm::HmacTruncated256, hmac_deriver.clone())
        .key_deriver(Algorithm::Hmac, hmac_deriver)
        .key_importer(Algorithm::Ecdsa, Arc::new(ecdsa::EcdsaKeyImporter))
        .key_importer(
            Algorithm::X509Certificate,
            Arc::new(ecdsa::X509PublicKeyImporter),
        )
        .key_importer(Algorithm::Aes, Arc::new(aes::AesKeyImporter))
        .key_importer(Algorithm::Hmac, Arc::new(hmac::HmacKeyImporter))
        .hasher(Algorithm::Sha256, hasher.clone())
        .hasher(Algorithm::Sha384, hasher.clone())
        .hasher(Algorithm::Sha3_256, hasher.clone())
        .hasher(Algorithm::Sha3_384, hasher)
        .signer(Algorithm::Ecdsa, Arc::new(ecdsa::EcdsaSigner))
        .verifier(Algorithm::Ecdsa, Arc::new(ecdsa::EcdsaVerifier))
        .encryptor(Algorithm::Aes, cipher.clone())
        .decryptor(Algorithm::Aes, cipher)
}
