//! Provider handlers for the credential protocol.
//!
//! Protocol objects cross the provider boundary in their byte encodings. Verifiers report a
//! failed proof as `Ok(false)`; malformed inputs and protocol violations are errors.

use std::sync::Arc;

use super::{
    attribute::check_issuance_vector,
    credential::Credential,
    issuer::{IssuerKeyPair, IssuerPublicKey},
    nym::{NymPublicKey, NymSecretKey, NymSignature, UserSecretKey},
    presentation::{Presentation, Statement},
    request::CredentialRequest,
    revocation::{Cri, RevocationKeyPair, RevocationPublicKey},
};
use crate::{
    error::{Error, ProtocolViolation, Result},
    key::{downcast, Key, KeyRef},
    opts::{KeyDerivOpts, KeyGenOpts, KeyImportOpts, PresentationOpts, SignerOpts},
    provider::{KeyDeriver, KeyGenerator, KeyImporter, Signer, Verifier},
};

/// Map a proof failure to a negative verdict.
fn verdict(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(err @ (Error::ZkpError(_) | Error::VerificationFailed)) => {
            tracing::debug!(%err, "verification failed");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Resolve the public half of `key` as a `K`. Either half of a key pair is accepted.
fn public_key<K: Key + Clone>(key: &KeyRef) -> Result<K> {
    let public = key.public_key()?;
    Ok(downcast::<K>(public.as_ref())?.clone())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdemixKeyGenerator;

impl KeyGenerator for IdemixKeyGenerator {
    fn key_gen(&self, opts: &KeyGenOpts) -> Result<KeyRef> {
        let mut rng = rand::thread_rng();
        match opts {
            KeyGenOpts::IdemixIssuer {
                attribute_names, ..
            } => Ok(Arc::new(IssuerKeyPair::generate(
                attribute_names.clone(),
                &mut rng,
            )?)),
            KeyGenOpts::IdemixUserSecret { .. } => {
                Ok(Arc::new(UserSecretKey::generate(&mut rng)))
            }
            KeyGenOpts::IdemixRevocation { .. } => {
                Ok(Arc::new(RevocationKeyPair::generate(&mut rng)))
            }
            _ => Err(Error::InvalidOptions("expected idemix key generation options")),
        }
    }
}

/// Derives pseudonyms from user secret keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct NymKeyDeriver;

impl KeyDeriver for NymKeyDeriver {
    fn key_deriv(&self, key: &KeyRef, opts: &KeyDerivOpts) -> Result<KeyRef> {
        let KeyDerivOpts::IdemixNym {
            issuer_public_key, ..
        } = opts
        else {
            return Err(Error::InvalidOptions("expected pseudonym derivation options"));
        };
        let user = downcast::<UserSecretKey>(key.as_ref())?;
        let ipk = public_key::<IssuerPublicKey>(issuer_public_key)?;
        Ok(Arc::new(NymSecretKey::derive(
            user,
            &ipk,
            &mut rand::thread_rng(),
        )))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdemixKeyImporter;

impl KeyImporter for IdemixKeyImporter {
    fn key_import(&self, raw: &[u8], opts: &KeyImportOpts) -> Result<KeyRef> {
        match opts {
            KeyImportOpts::IdemixIssuerPublicKey {
                attribute_names, ..
            } => Ok(Arc::new(IssuerPublicKey::from_bytes(raw, attribute_names)?)),
            KeyImportOpts::IdemixNymPublicKey { .. } => {
                Ok(Arc::new(NymPublicKey::from_bytes(raw)?))
            }
            KeyImportOpts::IdemixRevocationPublicKey { .. } => {
                Ok(Arc::new(RevocationPublicKey::from_bytes(raw)?))
            }
            _ => Err(Error::InvalidOptions("expected idemix import options")),
        }
    }
}

/// Builds credential requests with a user secret key. The digest is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialRequestSigner;

impl Signer for CredentialRequestSigner {
    fn sign(&self, key: &KeyRef, _digest: &[u8], opts: &SignerOpts) -> Result<Vec<u8>> {
        let SignerOpts::IdemixCredentialRequest {
            issuer_public_key,
            nonce,
        } = opts
        else {
            return Err(Error::InvalidOptions("expected credential request options"));
        };
        let user = downcast::<UserSecretKey>(key.as_ref())?;
        let ipk = public_key::<IssuerPublicKey>(issuer_public_key)?;
        CredentialRequest::new(user, &ipk, *nonce).to_bytes()
    }
}

/// Checks a credential request (the signature) on behalf of the issuer `key`.
///
/// The nonce must equal the one in the options. It is not consumed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialRequestVerifier;

impl Verifier for CredentialRequestVerifier {
    fn verify(
        &self,
        key: &KeyRef,
        signature: &[u8],
        _digest: &[u8],
        opts: &SignerOpts,
    ) -> Result<bool> {
        let SignerOpts::IdemixCredentialRequest {
            issuer_public_key,
            nonce,
        } = opts
        else {
            return Err(Error::InvalidOptions("expected credential request options"));
        };
        if issuer_public_key.ski() != key.ski() {
            return Err(Error::InvalidOptions(
                "key does not match the issuer public key in the options",
            ));
        }
        let ipk = public_key::<IssuerPublicKey>(key)?;
        let request = CredentialRequest::from_bytes(signature)?;
        if request.nonce() != nonce {
            return Err(ProtocolViolation::NonceMismatch.into());
        }
        verdict(request.verify(&ipk))
    }
}

/// Issues credentials with an issuer key pair. The digest carries the encoded request.
///
/// The nonce is consumed only once the request proof has been checked, so a rejected request
/// leaves the ledger untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialSigner;

impl Signer for CredentialSigner {
    fn sign(&self, key: &KeyRef, digest: &[u8], opts: &SignerOpts) -> Result<Vec<u8>> {
        let SignerOpts::IdemixCredential { attributes, nonces } = opts else {
            return Err(Error::InvalidOptions("expected credential issuance options"));
        };
        let issuer = downcast::<IssuerKeyPair>(key.as_ref())?;
        check_issuance_vector(issuer.public().attribute_names().len(), attributes)?;
        let request = CredentialRequest::from_bytes(digest)?;
        request.verify(issuer.public())?;

        nonces.consume(issuer.ski(), request.nonce())?;
        let credential = issuer.issue(&request, attributes.clone(), &mut rand::thread_rng())?;
        credential.to_bytes()
    }
}

/// Lets a holder check an issued credential (the signature) with its user secret key.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialVerifier;

impl Verifier for CredentialVerifier {
    fn verify(
        &self,
        key: &KeyRef,
        signature: &[u8],
        _digest: &[u8],
        opts: &SignerOpts,
    ) -> Result<bool> {
        let SignerOpts::IdemixCredentialCheck { issuer_public_key } = opts else {
            return Err(Error::InvalidOptions("expected credential check options"));
        };
        let user = downcast::<UserSecretKey>(key.as_ref())?;
        let ipk = public_key::<IssuerPublicKey>(issuer_public_key)?;
        let credential = Credential::from_bytes(signature)?;
        verdict(credential.verify(user, &ipk))
    }
}

/// Decoded inputs of a presentation.
struct Inputs {
    ipk: IssuerPublicKey,
    cri: Cri,
    rpk: RevocationPublicKey,
}

impl Inputs {
    fn decode(opts: &PresentationOpts) -> Result<Self> {
        Ok(Self {
            ipk: public_key(&opts.issuer_public_key)?,
            cri: Cri::from_bytes(&opts.cri)?,
            rpk: public_key(&opts.revocation_public_key)?,
        })
    }

    fn statement<'a>(&'a self, opts: &'a PresentationOpts, msg: &'a [u8]) -> Statement<'a> {
        Statement {
            ipk: &self.ipk,
            disclosure: &opts.disclosure,
            rh_index: opts.rh_index,
            cri: &self.cri,
            epoch: opts.epoch,
            rpk: &self.rpk,
            msg,
        }
    }
}

/// Signs messages with a credential under a pseudonym, keyed by the user secret key.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresentationSigner;

impl Signer for PresentationSigner {
    fn sign(&self, key: &KeyRef, digest: &[u8], opts: &SignerOpts) -> Result<Vec<u8>> {
        let SignerOpts::IdemixSignature(opts) = opts else {
            return Err(Error::InvalidOptions("expected idemix signature options"));
        };
        let user = downcast::<UserSecretKey>(key.as_ref())?;
        let nym = downcast::<NymSecretKey>(opts.nym.as_ref())?;
        let inputs = Inputs::decode(opts)?;
        let statement = inputs.statement(opts, digest);
        let credential = Credential::from_bytes(&opts.credential)?;
        Presentation::sign(&statement, user, nym, &credential, &mut rand::thread_rng())?
            .to_bytes()
    }
}

/// Verifies presentations with the issuer key pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresentationVerifier;

impl Verifier for PresentationVerifier {
    fn verify(
        &self,
        key: &KeyRef,
        signature: &[u8],
        digest: &[u8],
        opts: &SignerOpts,
    ) -> Result<bool> {
        let SignerOpts::IdemixSignature(opts) = opts else {
            return Err(Error::InvalidOptions("expected idemix signature options"));
        };
        let issuer = downcast::<IssuerKeyPair>(key.as_ref())?;
        let nym = public_key::<NymPublicKey>(&opts.nym)?;
        let inputs = Inputs::decode(opts)?;
        let statement = inputs.statement(opts, digest);
        let presentation = Presentation::from_bytes(signature)?;
        verdict(presentation.verify(&statement, &nym, issuer))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NymSigner;

impl Signer for NymSigner {
    fn sign(&self, key: &KeyRef, digest: &[u8], opts: &SignerOpts) -> Result<Vec<u8>> {
        let SignerOpts::IdemixNym { issuer_public_key } = opts else {
            return Err(Error::InvalidOptions("expected pseudonym signature options"));
        };
        let nym = downcast::<NymSecretKey>(key.as_ref())?;
        let ipk = public_key::<IssuerPublicKey>(issuer_public_key)?;
        nym.sign(&ipk, digest).to_bytes()
    }
}

/// Verifies pseudonym signatures with either half of the pseudonym.
#[derive(Debug, Clone, Copy, Default)]
pub struct NymVerifier;

impl Verifier for NymVerifier {
    fn verify(
        &self,
        key: &KeyRef,
        signature: &[u8],
        digest: &[u8],
        opts: &SignerOpts,
    ) -> Result<bool> {
        let SignerOpts::IdemixNym { issuer_public_key } = opts else {
            return Err(Error::InvalidOptions("expected pseudonym signature options"));
        };
        let nym = public_key::<NymPublicKey>(key)?;
        let ipk = public_key::<IssuerPublicKey>(issuer_public_key)?;
        let signature = NymSignature::from_bytes(signature)?;
        verdict(nym.verify(&ipk, digest, &signature))
    }
}

/// Publishes revocation information with a revocation key pair. The digest is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct CriSigner;

impl Signer for CriSigner {
    fn sign(&self, key: &KeyRef, _digest: &[u8], opts: &SignerOpts) -> Result<Vec<u8>> {
        let SignerOpts::IdemixCri {
            epoch,
            unrevoked_handles,
        } = opts
        else {
            return Err(Error::InvalidOptions("expected revocation information options"));
        };
        let revocation = downcast::<RevocationKeyPair>(key.as_ref())?;
        revocation.publish(*epoch, unrevoked_handles)?.to_bytes()
    }
}

/// Checks the signature on revocation information for the epoch in the options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CriVerifier;

impl Verifier for CriVerifier {
    fn verify(
        &self,
        key: &KeyRef,
        signature: &[u8],
        _digest: &[u8],
        opts: &SignerOpts,
    ) -> Result<bool> {
        let SignerOpts::IdemixCri { epoch, .. } = opts else {
            return Err(Error::InvalidOptions("expected revocation information options"));
        };
        let rpk = public_key::<RevocationPublicKey>(key)?;
        let cri = Cri::from_bytes(signature)?;
        if cri.epoch() != *epoch {
            return Err(ProtocolViolation::HandleRevokedOrEpochStale.into());
        }
        verdict(cri.verify(&rpk))
    }
}
