//! One-of-many proofs that a committed revocation handle is listed in the revocation
//! information, without revealing which entry it is.
//!
//! For a commitment `C = rh·U + z·G` and listed handles `h_1..h_n`, the holder shows that it
//! knows the discrete log base `G` of one of `P_i = C − h_i·U`. Every branch other than the
//! real one is simulated with a random challenge, and the real branch takes the remainder of
//! the transcript challenge, so a verifier cannot tell the branches apart.

use curve25519_dalek::{constants::RISTRETTO_BASEPOINT_TABLE, RistrettoPoint, Scalar};
use itertools::zip_eq;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{
    error::{ProtocolViolation, Result},
    zkp::Transcript,
};

#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct MembershipProof {
    challenges: Vec<Scalar>,
    responses: Vec<Scalar>,
}

impl MembershipProof {
    /// Prove that `commitment = handle·u + blinding·G` for a `handle` listed in `handles`.
    pub(crate) fn prove<R>(
        transcript: &mut Transcript,
        u: &RistrettoPoint,
        commitment: &RistrettoPoint,
        handles: &[Scalar],
        handle: &Scalar,
        blinding: &Scalar,
        rng: &mut R,
    ) -> Result<Self>
    where
        R: CryptoRngCore + ?Sized,
    {
        let Some(k) = handles.iter().position(|h| h == handle) else {
            return Err(ProtocolViolation::HandleRevokedOrEpochStale.into());
        };

        let mut nonce = Scalar::random(rng);
        let mut challenges: Vec<Scalar> = handles.iter().map(|_| Scalar::random(rng)).collect();
        let mut responses: Vec<Scalar> = handles.iter().map(|_| Scalar::random(rng)).collect();
        let announcements: Vec<RistrettoPoint> = branches(u, commitment, handles)
            .iter()
            .enumerate()
            .map(|(i, p_i)| {
                if i == k {
                    &nonce * RISTRETTO_BASEPOINT_TABLE
                } else {
                    &responses[i] * RISTRETTO_BASEPOINT_TABLE - p_i * challenges[i]
                }
            })
            .collect();

        let c = challenge(transcript, u, commitment, handles, &announcements);
        let simulated: Scalar = challenges
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != k)
            .map(|(_, c_i)| c_i)
            .sum();
        challenges[k] = c - simulated;
        responses[k] = nonce + challenges[k] * blinding;
        nonce.zeroize();

        Ok(Self {
            challenges,
            responses,
        })
    }

    /// Check the proof. A failure means the handle is not shown to be listed.
    pub(crate) fn verify(
        &self,
        transcript: &mut Transcript,
        u: &RistrettoPoint,
        commitment: &RistrettoPoint,
        handles: &[Scalar],
    ) -> Result<()> {
        if self.challenges.len() != handles.len() || self.responses.len() != handles.len() {
            return Err(ProtocolViolation::HandleRevokedOrEpochStale.into());
        }
        let announcements: Vec<RistrettoPoint> = zip_eq(
            branches(u, commitment, handles),
            zip_eq(&self.challenges, &self.responses),
        )
        .map(|(p_i, (c_i, s_i))| s_i * RISTRETTO_BASEPOINT_TABLE - p_i * c_i)
        .collect();

        let c = challenge(transcript, u, commitment, handles, &announcements);
        if self.challenges.iter().sum::<Scalar>() != c {
            return Err(ProtocolViolation::HandleRevokedOrEpochStale.into());
        }
        Ok(())
    }
}

fn branches(
    u: &RistrettoPoint,
    commitment: &RistrettoPoint,
    handles: &[Scalar],
) -> Vec<RistrettoPoint> {
    handles.iter().map(|h_i| commitment - u * h_i).collect()
}

fn challenge(
    transcript: &mut Transcript,
    u: &RistrettoPoint,
    commitment: &RistrettoPoint,
    handles: &[Scalar],
    announcements: &[RistrettoPoint],
) -> Scalar {
    transcript.append_message(b"U", u.compress().as_bytes());
    transcript.append_message(b"C_rh", commitment.compress().as_bytes());
    for (h_i, a_i) in zip_eq(handles, announcements) {
        transcript.append_message(b"h", h_i.as_bytes());
        transcript.append_message(b"A", a_i.compress().as_bytes());
    }
    let mut bytes = [0u8; 64];
    transcript.challenge_bytes(b"c", &mut bytes);
    Scalar::from_bytes_mod_order_wide(&bytes)
}
