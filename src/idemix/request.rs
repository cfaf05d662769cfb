//! Credential requests and the issuer's nonce bookkeeping.

use core::{convert::Infallible, fmt};
use std::collections::HashMap;

use curve25519_dalek::RistrettoPoint;
use parking_lot::Mutex;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::{issuer::IssuerPublicKey, nym::UserSecretKey};
use crate::{
    error::{Error, ProtocolViolation, Result},
    key::Ski,
    zkp::{into_ok, CompactProof, Constraint, Prover, Transcript, Verifier},
};

macro_rules! label {
    ($s:literal) => {
        concat!("bccsp::idemix::request::", $s)
    };
}

/// Issuer-chosen freshness value a credential request must echo.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce([u8; 32]);

impl Nonce {
    pub fn random<R>(rng: &mut R) -> Self
    where
        R: CryptoRngCore + ?Sized,
    {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn matches(&self, other: &Nonce) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

/// Outstanding issuance nonces, one per issuer key.
///
/// Minting a nonce replaces the previous one for that issuer. A nonce is consumed by the first
/// credential issued against it, so a request cannot be replayed.
#[derive(Debug, Default)]
pub struct NonceLedger {
    pending: Mutex<HashMap<Ski, Nonce>>,
}

impl NonceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self, issuer: &Ski) -> Nonce {
        let nonce = Nonce::random(&mut rand::thread_rng());
        if self.pending.lock().insert(issuer.clone(), nonce).is_some() {
            tracing::debug!(%issuer, "replaced outstanding issuance nonce");
        }
        nonce
    }

    /// Whether `nonce` is outstanding for `issuer`, without consuming it.
    pub fn is_pending(&self, issuer: &Ski, nonce: &Nonce) -> bool {
        self.pending
            .lock()
            .get(issuer)
            .is_some_and(|pending| pending.matches(nonce))
    }

    /// Consume the outstanding nonce for `issuer`. A mismatch leaves it in place.
    pub fn consume(&self, issuer: &Ski, nonce: &Nonce) -> Result<()> {
        let mut pending = self.pending.lock();
        match pending.get(issuer) {
            Some(outstanding) if outstanding.matches(nonce) => {
                pending.remove(issuer);
                Ok(())
            }
            _ => Err(ProtocolViolation::NonceMismatch.into()),
        }
    }
}

/// A holder's request for a credential: a commitment `C = sk·X_sk` to the user secret, and a
/// proof of knowledge of `sk` bound to the issuer key and the nonce.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialRequest {
    pub(crate) nonce: Nonce,
    pub(crate) commitment: RistrettoPoint,
    proof: CompactProof,
}

impl CredentialRequest {
    pub fn new(user: &UserSecretKey, ipk: &IssuerPublicKey, nonce: Nonce) -> Self {
        let commitment = ipk.x_sk * user.sk;
        let proof = into_ok(prove(user, ipk, &nonce, &commitment));
        Self {
            nonce,
            commitment,
            proof,
        }
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Check the proof of knowledge. The nonce is not checked against any ledger.
    pub fn verify(&self, ipk: &IssuerPublicKey) -> Result<()> {
        let mut transcript = transcript(ipk, &self.nonce);
        let mut verifier = Verifier::new(label!("constraints").as_bytes(), &mut transcript);

        // Constrain C = sk * X_sk
        let mut constraint = Constraint::new();
        constraint.add(&mut verifier, label!("sk"), (label!("X_sk"), ipk.x_sk))?;
        constraint.eq(&mut verifier, (label!("C"), self.commitment))?;

        Ok(verifier.verify_compact(&self.proof)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes)
            .map_err(|e| Error::Encoding(format!("credential request: {e}")))
    }
}

fn prove(
    user: &UserSecretKey,
    ipk: &IssuerPublicKey,
    nonce: &Nonce,
    commitment: &RistrettoPoint,
) -> Result<CompactProof, Infallible> {
    let mut transcript = transcript(ipk, nonce);
    let mut prover = Prover::new(label!("constraints").as_bytes(), &mut transcript);

    // Constrain C = sk * X_sk
    let mut constraint = Constraint::new();
    constraint.add(&mut prover, (label!("sk"), user.sk), (label!("X_sk"), ipk.x_sk))?;
    constraint.eq(&mut prover, (label!("C"), *commitment))?;

    Ok(prover.prove_compact())
}

fn transcript(ipk: &IssuerPublicKey, nonce: &Nonce) -> Transcript {
    let mut transcript = Transcript::new(label!("transcript").as_bytes());
    transcript.append_message(b"ipk", &ipk.fingerprint());
    transcript.append_message(b"nonce", nonce.as_bytes());
    transcript
}

#[cfg(test)]
mod test {
    use super::{CredentialRequest, Nonce, NonceLedger};
    use crate::{
        error::{Error, ProtocolViolation},
        idemix::{issuer::IssuerKeyPair, nym::UserSecretKey},
        key::Key,
    };

    #[test]
    fn request_verifies() {
        let mut rng = rand::thread_rng();
        let issuer = IssuerKeyPair::generate(vec!["ou".into()], &mut rng).unwrap();
        let user = UserSecretKey::generate(&mut rng);
        let nonce = Nonce::random(&mut rng);

        let request = CredentialRequest::new(&user, issuer.public(), nonce);
        request.verify(issuer.public()).unwrap();

        let decoded = CredentialRequest::from_bytes(&request.to_bytes().unwrap()).unwrap();
        decoded.verify(issuer.public()).unwrap();
        assert_eq!(decoded.nonce(), &nonce);
    }

    #[test]
    fn request_is_bound_to_issuer_and_nonce() {
        let mut rng = rand::thread_rng();
        let issuer = IssuerKeyPair::generate(vec!["ou".into()], &mut rng).unwrap();
        let other = IssuerKeyPair::generate(vec!["ou".into()], &mut rng).unwrap();
        let user = UserSecretKey::generate(&mut rng);

        let mut request = CredentialRequest::new(&user, issuer.public(), Nonce::random(&mut rng));
        let Err(Error::ZkpError(_)) = request.verify(other.public()) else {
            panic!("request verified under another issuer");
        };
        request.nonce = Nonce::random(&mut rng);
        let Err(Error::ZkpError(_)) = request.verify(issuer.public()) else {
            panic!("request verified with a swapped nonce");
        };
    }

    #[test]
    fn ledger_consumes_once() {
        let mut rng = rand::thread_rng();
        let issuer = IssuerKeyPair::generate(vec!["ou".into()], &mut rng).unwrap();
        let ledger = NonceLedger::new();

        let stale = ledger.mint(issuer.ski());
        let nonce = ledger.mint(issuer.ski());
        assert!(!ledger.is_pending(issuer.ski(), &stale));

        let Err(Error::ProtocolViolation(ProtocolViolation::NonceMismatch)) =
            ledger.consume(issuer.ski(), &stale)
        else {
            panic!("replaced nonce was accepted");
        };
        assert!(ledger.is_pending(issuer.ski(), &nonce));
        ledger.consume(issuer.ski(), &nonce).unwrap();

        let Err(Error::ProtocolViolation(ProtocolViolation::NonceMismatch)) =
            ledger.consume(issuer.ski(), &nonce)
        else {
            panic!("nonce was consumed twice");
        };
    }

    #[test]
    fn concurrent_consume_accepts_one() {
        let mut rng = rand::thread_rng();
        let issuer = IssuerKeyPair::generate(vec!["ou".into()], &mut rng).unwrap();
        let ledger = NonceLedger::new();
        let nonce = ledger.mint(issuer.ski());

        let accepted = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| ledger.consume(issuer.ski(), &nonce).is_ok()))
                .collect();
            workers
                .into_iter()
                .map(|worker| worker.join().unwrap())
                .filter(|accepted| *accepted)
                .count()
        });
        assert_eq!(accepted, 1);
        assert!(!ledger.is_pending(issuer.ski(), &nonce));
    }
}
