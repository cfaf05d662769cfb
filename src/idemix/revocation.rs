//! Epoch-scoped credential revocation information.
//!
//! For each epoch the revocation authority publishes the unrevoked handles, signed with its
//! revocation key. Holders prove membership of their hidden handle in the list, so a
//! presentation never shows which entry it matched.

use core::{any::Any, convert::Infallible, fmt};
use std::sync::Arc;

use curve25519_dalek::{
    constants::{RISTRETTO_BASEPOINT_POINT, RISTRETTO_BASEPOINT_TABLE},
    ristretto::CompressedRistretto,
    RistrettoPoint, Scalar,
};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::attribute::Attribute;
use crate::{
    error::{Error, Result},
    key::{Key, KeyRef, Ski},
    zkp::{into_ok, CompactProof, Constraint, Prover, Transcript, Verifier},
};

macro_rules! label {
    ($s:literal) => {
        concat!("bccsp::idemix::revocation::", $s)
    };
}

#[derive(Clone, PartialEq, Eq)]
pub struct RevocationPublicKey {
    pub(crate) point: RistrettoPoint,
    ski: Ski,
}

impl RevocationPublicKey {
    fn new(point: RistrettoPoint) -> Self {
        let ski = Ski::from_public_bytes(point.compress().as_bytes());
        Self { point, ski }
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.point.compress().to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let point = CompressedRistretto::from_slice(bytes)
            .ok()
            .and_then(|c| c.decompress())
            .ok_or_else(|| {
                Error::InvalidKeyMaterial("invalid revocation public key encoding".into())
            })?;
        Ok(Self::new(point))
    }
}

impl fmt::Debug for RevocationPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RevocationPublicKey({})", self.ski)
    }
}

impl Key for RevocationPublicKey {
    fn bytes(&self) -> Result<Vec<u8>> {
        Ok(self.to_bytes().to_vec())
    }

    fn ski(&self) -> &Ski {
        &self.ski
    }

    fn symmetric(&self) -> bool {
        false
    }

    fn private(&self) -> bool {
        false
    }

    fn public_key(&self) -> Result<KeyRef> {
        Ok(Arc::new(self.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct RevocationKeyPair {
    y: Scalar,
    public: Arc<RevocationPublicKey>,
}

impl RevocationKeyPair {
    pub fn generate<R>(rng: &mut R) -> Self
    where
        R: CryptoRngCore + ?Sized,
    {
        let y = Scalar::random(rng);
        let public = RevocationPublicKey::new(&y * RISTRETTO_BASEPOINT_TABLE);
        Self {
            y,
            public: Arc::new(public),
        }
    }

    pub fn public(&self) -> &RevocationPublicKey {
        &self.public
    }

    /// Publish the revocation information for `epoch`. Handles must encode to a non-zero scalar.
    pub fn publish(&self, epoch: u64, unrevoked_handles: &[Attribute]) -> Result<Cri> {
        let unrevoked = unrevoked_handles
            .iter()
            .map(|handle| {
                let handle = handle.encode();
                if handle == Scalar::ZERO {
                    return Err(Error::InvalidOptions("revocation handles must be non-zero"));
                }
                Ok(handle)
            })
            .collect::<Result<Vec<_>>>()?;
        let proof = into_ok(self.prove(epoch, &unrevoked));
        tracing::debug!(
            epoch,
            handles = unrevoked.len(),
            "published revocation information"
        );
        Ok(Cri {
            epoch,
            unrevoked,
            proof,
        })
    }

    fn prove(
        &self,
        epoch: u64,
        unrevoked: &[Scalar],
    ) -> Result<CompactProof, Infallible> {
        let mut transcript = transcript(&self.public, epoch, unrevoked);
        let mut prover = Prover::new(label!("constraints").as_bytes(), &mut transcript);

        // Constrain Y = y * G
        let mut constraint = Constraint::new();
        constraint.add(
            &mut prover,
            (label!("y"), self.y),
            (label!("G"), RISTRETTO_BASEPOINT_POINT),
        )?;
        constraint.eq(&mut prover, (label!("Y"), self.public.point))?;

        Ok(prover.prove_compact())
    }
}

impl Drop for RevocationKeyPair {
    fn drop(&mut self) {
        self.y.zeroize();
    }
}

impl fmt::Debug for RevocationKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevocationKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl Key for RevocationKeyPair {
    fn bytes(&self) -> Result<Vec<u8>> {
        Err(Error::UnsupportedKeyOperation("not supported"))
    }

    fn ski(&self) -> &Ski {
        &self.public.ski
    }

    fn symmetric(&self) -> bool {
        false
    }

    fn private(&self) -> bool {
        true
    }

    fn public_key(&self) -> Result<KeyRef> {
        Ok(self.public.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Credential revocation information: the unrevoked handles of one epoch.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cri {
    epoch: u64,
    unrevoked: Vec<Scalar>,
    proof: CompactProof,
}

impl Cri {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Check the revocation authority's signature.
    pub fn verify(&self, rpk: &RevocationPublicKey) -> Result<()> {
        let mut transcript = transcript(rpk, self.epoch, &self.unrevoked);
        let mut verifier = Verifier::new(label!("constraints").as_bytes(), &mut transcript);

        // Constrain Y = y * G
        let mut constraint = Constraint::new();
        constraint.add(&mut verifier, label!("y"), (label!("G"), RISTRETTO_BASEPOINT_POINT))?;
        constraint.eq(&mut verifier, (label!("Y"), rpk.point))?;

        Ok(verifier.verify_compact(&self.proof)?)
    }

    pub fn contains(&self, handle: &Scalar) -> bool {
        self.unrevoked.iter().any(|h| h == handle)
    }

    pub(crate) fn handles(&self) -> &[Scalar] {
        &self.unrevoked
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes)
            .map_err(|e| Error::Encoding(format!("revocation information: {e}")))
    }
}

fn transcript(
    rpk: &RevocationPublicKey,
    epoch: u64,
    unrevoked: &[Scalar],
) -> Transcript {
    let mut transcript = Transcript::new(label!("transcript").as_bytes());
    transcript.append_message(b"rpk", &rpk.to_bytes());
    transcript.append_message(b"epoch", &epoch.to_be_bytes());
    transcript.append_message(b"count", &(unrevoked.len() as u64).to_be_bytes());
    for handle in unrevoked {
        transcript.append_message(b"handle", handle.as_bytes());
    }
    transcript
}
