//! User secrets, pseudonyms and pseudonym signatures.
//!
//! A pseudonym under an issuer is the commitment `Nym = sk·H_sk + r·H_rand`, where `H_sk` and
//! `H_rand` are derived from the issuer public key and `r` is fresh for every derivation. Two
//! pseudonyms of the same user are unlinkable, under the same issuer or across issuers.

use core::{any::Any, convert::Infallible, fmt};
use std::sync::Arc;

use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_TABLE, ristretto::CompressedRistretto, RistrettoPoint, Scalar,
};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::issuer::IssuerPublicKey;
use crate::{
    error::{Error, Result},
    key::{Key, KeyRef, Ski},
    zkp::{into_ok, CompactProof, Constraint, Prover, Transcript, Verifier},
};

// A small macro to construct the labels for variables that get added to the transcript.
macro_rules! label {
    ($s:literal) => {
        concat!("bccsp::idemix::nym::", $s)
    };
}

/// The holder's long-term secret. It is never exported, and has no public half.
pub struct UserSecretKey {
    pub(crate) sk: Scalar,
    ski: Ski,
}

impl UserSecretKey {
    pub fn generate<R>(rng: &mut R) -> Self
    where
        R: CryptoRngCore + ?Sized,
    {
        let sk = Scalar::random(rng);
        // Identify the secret by a commitment to it, not by the secret itself.
        let ski = Ski::from_public_bytes((&sk * RISTRETTO_BASEPOINT_TABLE).compress().as_bytes());
        Self { sk, ski }
    }
}

impl Drop for UserSecretKey {
    fn drop(&mut self) {
        self.sk.zeroize();
    }
}

impl fmt::Debug for UserSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSecretKey")
            .field("ski", &self.ski)
            .finish_non_exhaustive()
    }
}

impl Key for UserSecretKey {
    fn bytes(&self) -> Result<Vec<u8>> {
        Err(Error::UnsupportedKeyOperation("not supported"))
    }

    fn ski(&self) -> &Ski {
        &self.ski
    }

    fn symmetric(&self) -> bool {
        false
    }

    fn private(&self) -> bool {
        true
    }

    fn public_key(&self) -> Result<KeyRef> {
        Err(Error::UnsupportedKeyOperation(
            "a user secret key has no public key",
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct NymPublicKey {
    pub(crate) point: RistrettoPoint,
    ski: Ski,
}

impl NymPublicKey {
    fn new(point: RistrettoPoint) -> Self {
        let ski = Ski::from_public_bytes(point.compress().as_bytes());
        Self { point, ski }
    }

    /// Compressed encoding of the pseudonym.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.point.compress().to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let point = CompressedRistretto::from_slice(bytes)
            .ok()
            .and_then(|c| c.decompress())
            .ok_or_else(|| Error::InvalidKeyMaterial("invalid pseudonym encoding".into()))?;
        Ok(Self::new(point))
    }

    /// Verify a signature by the pseudonym over `msg`.
    pub fn verify(
        &self,
        ipk: &IssuerPublicKey,
        msg: &[u8],
        signature: &NymSignature,
    ) -> Result<()> {
        let mut transcript = transcript(ipk, msg);
        let mut verifier = Verifier::new(label!("constraints").as_bytes(), &mut transcript);

        // Constrain Nym = sk * H_sk + r * H_rand
        let mut constraint = Constraint::new();
        constraint.add(&mut verifier, label!("sk"), (label!("h_sk"), ipk.h_sk()))?;
        constraint.add(&mut verifier, label!("r"), (label!("h_rand"), ipk.h_rand()))?;
        constraint.eq(&mut verifier, (label!("nym"), self.point))?;

        Ok(verifier.verify_compact(&signature.proof)?)
    }
}

impl fmt::Debug for NymPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NymPublicKey({})", self.ski)
    }
}

impl Key for NymPublicKey {
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

/// A pseudonym together with its opening `(sk, r)`.
pub struct NymSecretKey {
    pub(crate) sk: Scalar,
    pub(crate) r: Scalar,
    pub(crate) public: Arc<NymPublicKey>,
}

impl NymSecretKey {
    pub fn derive<R>(user: &UserSecretKey, ipk: &IssuerPublicKey, rng: &mut R) -> Self
    where
        R: CryptoRngCore + ?Sized,
    {
        let r = Scalar::random(rng);
        let point = ipk.h_sk() * user.sk + ipk.h_rand() * r;
        Self {
            sk: user.sk,
            r,
            public: Arc::new(NymPublicKey::new(point)),
        }
    }

    pub fn public(&self) -> &NymPublicKey {
        &self.public
    }

    /// Whether this pseudonym opens to the given user secret.
    pub fn belongs_to(&self, user: &UserSecretKey) -> bool {
        self.sk == user.sk
    }

    /// Sign `msg` with a proof of knowledge of the pseudonym's opening.
    pub fn sign(&self, ipk: &IssuerPublicKey, msg: &[u8]) -> NymSignature {
        NymSignature {
            proof: into_ok(self.prove(ipk, msg)),
        }
    }

    fn prove(&self, ipk: &IssuerPublicKey, msg: &[u8]) -> Result<CompactProof, Infallible> {
        let mut transcript = transcript(ipk, msg);
        let mut prover = Prover::new(label!("constraints").as_bytes(), &mut transcript);

        // Constrain Nym = sk * H_sk + r * H_rand
        let mut constraint = Constraint::new();
        constraint.add(&mut prover, (label!("sk"), self.sk), (label!("h_sk"), ipk.h_sk()))?;
        constraint.add(&mut prover, (label!("r"), self.r), (label!("h_rand"), ipk.h_rand()))?;
        constraint.eq(&mut prover, (label!("nym"), self.public.point))?;

        Ok(prover.prove_compact())
    }
}

impl Drop for NymSecretKey {
    fn drop(&mut self) {
        self.sk.zeroize();
        self.r.zeroize();
    }
}

impl fmt::Debug for NymSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NymSecretKey")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl Key for NymSecretKey {
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

#[derive(Clone, Serialize, Deserialize)]
pub struct NymSignature {
    proof: CompactProof,
}

impl NymSignature {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

fn transcript(ipk: &IssuerPublicKey, msg: &[u8]) -> Transcript {
    let mut transcript = Transcript::new(label!("transcript").as_bytes());
    transcript.append_message(b"ipk", &ipk.fingerprint());
    transcript.append_message(b"msg", msg);
    transcript
}

#[cfg(test)]
mod test {
    use super::{NymPublicKey, NymSecretKey, UserSecretKey};
    use crate::{
        error::Error,
        idemix::issuer::IssuerKeyPair,
        key::Key,
    };

    fn issuer() -> IssuerKeyPair {
        IssuerKeyPair::generate(vec!["ou".into()], &mut rand::thread_rng()).unwrap()
    }

    #[test]
    fn sign_verify() {
        let mut rng = rand::thread_rng();
        let issuer = issuer();
        let user = UserSecretKey::generate(&mut rng);
        let nym = NymSecretKey::derive(&user, issuer.public(), &mut rng);
        assert!(nym.belongs_to(&user));

        let sig = nym.sign(issuer.public(), b"hello");
        nym.public().verify(issuer.public(), b"hello", &sig).unwrap();

        let Err(Error::ZkpError(_)) = nym.public().verify(issuer.public(), b"other", &sig) else {
            panic!("signature verified over a different message");
        };
        let other = NymSecretKey::derive(&user, issuer.public(), &mut rng);
        let Err(Error::ZkpError(_)) = other.public().verify(issuer.public(), b"hello", &sig)
        else {
            panic!("signature verified under a different pseudonym");
        };
    }

    #[test]
    fn derivations_are_unlinkable() {
        let mut rng = rand::thread_rng();
        let (a, b) = (issuer(), issuer());
        let user = UserSecretKey::generate(&mut rng);
        let first = NymSecretKey::derive(&user, a.public(), &mut rng);
        let second = NymSecretKey::derive(&user, a.public(), &mut rng);
        let third = NymSecretKey::derive(&user, b.public(), &mut rng);
        assert_ne!(first.public(), second.public());
        assert_ne!(first.public(), third.public());
    }

    #[test]
    fn public_key_encoding() {
        let mut rng = rand::thread_rng();
        let issuer = issuer();
        let user = UserSecretKey::generate(&mut rng);
        let nym = NymSecretKey::derive(&user, issuer.public(), &mut rng);
        let decoded = NymPublicKey::from_bytes(&nym.public().to_bytes()).unwrap();
        assert_eq!(&decoded, nym.public());
        assert_eq!(decoded.ski(), nym.ski());

        let Err(Error::InvalidKeyMaterial(_)) = NymPublicKey::from_bytes(&[1; 31]) else {
            panic!("short pseudonym was accepted");
        };
        let Err(Error::UnsupportedKeyOperation(_)) = user.public_key() else {
            panic!("user secret has a public key");
        };
    }
}
