//! An anonymous credential scheme with pseudonyms, selective disclosure and epoch-scoped
//! revocation, built on algebraic MACs over Ristretto255.
//!
//! The protocol runs in stages:
//!
//! 1. The issuer generates an [IssuerKeyPair] for an ordered attribute schema, and a user
//!    generates a [UserSecretKey].
//! 2. The issuer mints a [Nonce] in its [NonceLedger]. The user answers with a
//!    [CredentialRequest] committing to its secret.
//! 3. The issuer consumes the nonce and issues a [Credential] over an attribute vector. The
//!    holder checks it with [Credential::verify].
//! 4. The holder derives unlinkable pseudonyms ([NymSecretKey]) and signs messages with a
//!    [Presentation] that discloses a chosen subset of attributes. The revocation handle
//!    attribute is never disclosed; instead the presentation proves that it is one of the
//!    handles listed in the [Cri] the revocation authority published for the epoch.
//!
//! Presentations are verified with the issuer's MAC key. Pseudonym signatures and revocation
//! information are publicly verifiable.

use std::sync::Arc;

use crate::{opts::Algorithm, provider::CspBuilder};

mod attribute;
mod credential;
mod handlers;
mod issuer;
mod membership;
mod nym;
mod presentation;
mod request;
mod revocation;

pub use attribute::Attribute;
pub use credential::Credential;
pub use handlers::{
    CredentialRequestSigner, CredentialRequestVerifier, CredentialSigner, CredentialVerifier,
    CriSigner, CriVerifier, IdemixKeyGenerator, IdemixKeyImporter, NymKeyDeriver, NymSigner,
    NymVerifier, PresentationSigner, PresentationVerifier,
};
pub use issuer::{IssuerKeyPair, IssuerPublicKey};
pub use nym::{NymPublicKey, NymSecretKey, NymSignature, UserSecretKey};
pub use presentation::{Presentation, Statement};
pub use request::{CredentialRequest, Nonce, NonceLedger};
pub use revocation::{Cri, RevocationKeyPair, RevocationPublicKey};

/// Register every credential protocol handler on the builder.
pub fn register(builder: CspBuilder) -> CspBuilder {
    let generator = Arc::new(IdemixKeyGenerator);
    let importer = Arc::new(IdemixKeyImporter);

    builder
        .key_generator(Algorithm::IdemixIssuer, generator.clone())
        .key_generator(Algorithm::IdemixUserSecret, generator.clone())
        .key_generator(Algorithm::IdemixRevocation, generator)
        .key_deriver(Algorithm::IdemixNym, Arc::new(NymKeyDeriver))
        .key_importer(Algorithm::IdemixIssuer, importer.clone())
        .key_importer(Algorithm::IdemixNym, importer.clone())
        .key_importer(Algorithm::IdemixRevocation, importer)
        .signer(
            Algorithm::IdemixCredentialRequest,
            Arc::new(CredentialRequestSigner),
        )
        .verifier(
            Algorithm::IdemixCredentialRequest,
            Arc::new(CredentialRequestVerifier),
        )
        .signer(Algorithm::IdemixCredential, Arc::new(CredentialSigner))
        .verifier(Algorithm::IdemixCredential, Arc::new(CredentialVerifier))
        .signer(Algorithm::IdemixSignature, Arc::new(PresentationSigner))
        .verifier(Algorithm::IdemixSignature, Arc::new(PresentationVerifier))
        .signer(Algorithm::IdemixNymSignature, Arc::new(NymSigner))
        .verifier(Algorithm::IdemixNymSignature, Arc::new(NymVerifier))
        .signer(Algorithm::IdemixCri, Arc::new(CriSigner))
        .verifier(Algorithm::IdemixCri, Arc::new(CriVerifier))
}
