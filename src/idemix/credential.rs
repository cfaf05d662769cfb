//! Credential issuance and the holder's check of an issued credential.
//!
//! A credential is an algebraic MAC `(U, V)` with `U = b·G` and
//! `V = (x0 + x_sk·sk + Σ x_i·m_i)·U`. The issuer never learns `sk`: it computes the `sk` term as
//! `b·C` from the request commitment `C = sk·X_sk`. Alongside the MAC the issuer proves that
//! `(U, V)` was computed with the key committed to in its public key.

use core::convert::Infallible;

use curve25519_dalek::{
    constants::{RISTRETTO_BASEPOINT_POINT, RISTRETTO_BASEPOINT_TABLE},
    traits::IsIdentity,
    RistrettoPoint, Scalar,
};
use itertools::zip_eq;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::{
    attribute::{check_issuance_vector, Attribute},
    issuer::{IssuerKeyPair, IssuerPublicKey},
    nym::UserSecretKey,
    request::CredentialRequest,
};
use crate::{
    error::{Error, ProtocolViolation, Result},
    key::Key,
    zkp::{
        into_ok, AllocPointVar, AllocScalarVar, CompactProof, Constraint, Prover, Transcript,
        Verifier,
    },
};

macro_rules! label {
    ($s:literal) => {
        concat!("bccsp::idemix::credential::", $s)
    };
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub(crate) u: RistrettoPoint,
    pub(crate) v: RistrettoPoint,
    pub(crate) attributes: Vec<Attribute>,
    /// Request commitment the credential was issued against.
    pub(crate) commitment: RistrettoPoint,
    proof: CompactProof,
}

impl Credential {
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Check that the credential was issued under `ipk` to the holder of `user`.
    pub fn verify(&self, user: &UserSecretKey, ipk: &IssuerPublicKey) -> Result<()> {
        if self.attributes.len() != ipk.attribute_names().len() {
            return Err(ProtocolViolation::AttributeCountMismatch {
                expected: ipk.attribute_names().len(),
                actual: self.attributes.len(),
            }
            .into());
        }
        if self.commitment != ipk.x_sk * user.sk {
            return Err(Error::VerificationFailed);
        }
        if self.u.is_identity() {
            return Err(Error::VerificationFailed);
        }
        verify_issuance(ipk, self)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::Encoding(format!("credential: {e}")))
    }
}

impl IssuerKeyPair {
    /// Issue a credential over `attributes` for a request. The request nonce is not checked here.
    pub fn issue<R>(
        &self,
        request: &CredentialRequest,
        attributes: Vec<Attribute>,
        rng: &mut R,
    ) -> Result<Credential>
    where
        R: CryptoRngCore + ?Sized,
    {
        let ipk = self.public();
        check_issuance_vector(ipk.attribute_names().len(), &attributes)?;
        request.verify(ipk)?;

        let b = Scalar::random(rng);
        let u = &b * RISTRETTO_BASEPOINT_TABLE;
        let mac: Scalar = self.secret.x0
            + zip_eq(&self.secret.x, &attributes)
                .map(|(x_i, m_i)| x_i * m_i.encode())
                .sum::<Scalar>();
        let v = u * mac + request.commitment * b;

        let proof = into_ok(prove_issuance(self, &b, &u, &v, request, &attributes));
        tracing::debug!(issuer = %self.public.ski(), "issued credential");
        Ok(Credential {
            u,
            v,
            attributes,
            commitment: request.commitment,
            proof,
        })
    }
}

fn prove_issuance(
    issuer: &IssuerKeyPair,
    b: &Scalar,
    u: &RistrettoPoint,
    v: &RistrettoPoint,
    request: &CredentialRequest,
    attributes: &[Attribute],
) -> Result<CompactProof, Infallible> {
    let ipk = issuer.public();
    let mut transcript = transcript(ipk);
    let mut prover = Prover::new(label!("constraints").as_bytes(), &mut transcript);

    let x0_var = prover.alloc_scalar((label!("x0"), issuer.secret.x0))?;
    let x_vars = issuer
        .secret
        .x
        .iter()
        .map(|x_i| prover.alloc_scalar((label!("x_i"), *x_i)))
        .collect::<Result<Vec<_>, _>>()?;
    let b_var = prover.alloc_scalar((label!("b"), *b))?;
    let g_var = prover.alloc_point((label!("G"), RISTRETTO_BASEPOINT_POINT))?;
    let u_var = prover.alloc_point((label!("U"), *u))?;

    // Constrain X0 = x0 * H
    let mut constraint = Constraint::new();
    constraint.add(&mut prover, x0_var, (label!("H"), IssuerPublicKey::h()))?;
    constraint.eq(&mut prover, (label!("X0"), ipk.x0))?;

    // Constrain X_i = x_i * G
    for (x_var, x_point) in zip_eq(&x_vars, &ipk.x) {
        let mut constraint = Constraint::new();
        constraint.add(&mut prover, *x_var, g_var)?;
        constraint.eq(&mut prover, (label!("X_i"), *x_point))?;
    }

    // Constrain U = b * G
    let mut constraint = Constraint::new();
    constraint.add(&mut prover, b_var, g_var)?;
    constraint.eq(&mut prover, u_var)?;

    // Constrain V = x0 * U + sum(x_i * m_i * U) + b * C
    let mut constraint = Constraint::new();
    constraint.add(&mut prover, x0_var, u_var)?;
    for (x_var, m_i) in zip_eq(&x_vars, attributes) {
        let m_i = m_i.encode();
        if m_i != Scalar::ZERO {
            constraint.add(&mut prover, *x_var, (label!("m_i*U"), u * m_i))?;
        }
    }
    constraint.add(&mut prover, b_var, (label!("C"), request.commitment))?;
    constraint.eq(&mut prover, (label!("V"), *v))?;

    Ok(prover.prove_compact())
}

fn verify_issuance(ipk: &IssuerPublicKey, credential: &Credential) -> Result<()> {
    let mut transcript = transcript(ipk);
    let mut verifier = Verifier::new(label!("constraints").as_bytes(), &mut transcript);

    let x0_var = verifier.alloc_scalar(label!("x0"))?;
    let x_vars = ipk
        .x
        .iter()
        .map(|_| verifier.alloc_scalar(label!("x_i")))
        .collect::<Result<Vec<_>, _>>()?;
    let b_var = verifier.alloc_scalar(label!("b"))?;
    let g_var = verifier.alloc_point((label!("G"), RISTRETTO_BASEPOINT_POINT))?;
    let u_var = verifier.alloc_point((label!("U"), credential.u))?;

    // Constrain X0 = x0 * H
    let mut constraint = Constraint::new();
    constraint.add(&mut verifier, x0_var, (label!("H"), IssuerPublicKey::h()))?;
    constraint.eq(&mut verifier, (label!("X0"), ipk.x0))?;

    // Constrain X_i = x_i * G
    for (x_var, x_point) in zip_eq(&x_vars, &ipk.x) {
        let mut constraint = Constraint::new();
        constraint.add(&mut verifier, *x_var, g_var)?;
        constraint.eq(&mut verifier, (label!("X_i"), *x_point))?;
    }

    // Constrain U = b * G
    let mut constraint = Constraint::new();
    constraint.add(&mut verifier, b_var, g_var)?;
    constraint.eq(&mut verifier, u_var)?;

    // Constrain V = x0 * U + sum(x_i * m_i * U) + b * C
    let mut constraint = Constraint::new();
    constraint.add(&mut verifier, x0_var, u_var)?;
    for (x_var, m_i) in zip_eq(&x_vars, &credential.attributes) {
        let m_i = m_i.encode();
        if m_i != Scalar::ZERO {
            constraint.add(&mut verifier, *x_var, (label!("m_i*U"), credential.u * m_i))?;
        }
    }
    constraint.add(&mut verifier, b_var, (label!("C"), credential.commitment))?;
    constraint.eq(&mut verifier, (label!("V"), credential.v))?;

    Ok(verifier.verify_compact(&credential.proof)?)
}

fn transcript(ipk: &IssuerPublicKey) -> Transcript {
    let mut transcript = Transcript::new(label!("transcript").as_bytes());
    transcript.append_message(b"ipk", &ipk.fingerprint());
    transcript
}

#[cfg(test)]
mod test {
    use curve25519_dalek::Scalar;

    use super::Credential;
    use crate::{
        error::{Error, ProtocolViolation},
        idemix::{
            attribute::Attribute,
            issuer::IssuerKeyPair,
            nym::UserSecretKey,
            request::{CredentialRequest, Nonce},
        },
    };

    fn setup() -> (IssuerKeyPair, UserSecretKey, CredentialRequest) {
        let mut rng = rand::thread_rng();
        let issuer = IssuerKeyPair::generate(
            vec!["ou".into(), "role".into(), "eid".into(), "rh".into()],
            &mut rng,
        )
        .unwrap();
        let user = UserSecretKey::generate(&mut rng);
        let request = CredentialRequest::new(&user, issuer.public(), Nonce::random(&mut rng));
        (issuer, user, request)
    }

    fn attributes() -> Vec<Attribute> {
        vec!["org1".into(), Attribute::Int(1), Attribute::Hidden, Attribute::Int(42)]
    }

    #[test]
    fn issue_and_check() {
        let (issuer, user, request) = setup();
        let credential = issuer
            .issue(&request, attributes(), &mut rand::thread_rng())
            .unwrap();
        credential.verify(&user, issuer.public()).unwrap();

        // The MAC equation holds for the holder's secret.
        let mac = issuer.secret.x0
            + issuer.secret.x_sk * user.sk
            + issuer
                .secret
                .x
                .iter()
                .zip(&credential.attributes)
                .map(|(x_i, m_i)| x_i * m_i.encode())
                .sum::<Scalar>();
        assert_eq!(credential.v, credential.u * mac);

        let decoded = Credential::from_bytes(&credential.to_bytes().unwrap()).unwrap();
        decoded.verify(&user, issuer.public()).unwrap();
        assert_eq!(decoded.attributes(), attributes().as_slice());
    }

    #[test]
    fn check_rejects_other_holder_and_tampering() {
        let (issuer, user, request) = setup();
        let mut credential = issuer
            .issue(&request, attributes(), &mut rand::thread_rng())
            .unwrap();

        let other = UserSecretKey::generate(&mut rand::thread_rng());
        let Err(Error::VerificationFailed) = credential.verify(&other, issuer.public()) else {
            panic!("credential accepted for another holder");
        };

        credential.attributes[1] = Attribute::Int(2);
        let Err(Error::ZkpError(_)) = credential.verify(&user, issuer.public()) else {
            panic!("credential with a modified attribute was accepted");
        };
    }

    #[test]
    fn issuance_vector_must_match_schema() {
        let (issuer, _, request) = setup();
        let Err(Error::ProtocolViolation(ProtocolViolation::MissingAttributeValue(2))) =
            issuer.issue(&request, attributes()[..2].to_vec(), &mut rand::thread_rng())
        else {
            panic!("short issuance vector was accepted");
        };
    }

    #[test]
    fn issue_rejects_request_for_other_issuer() {
        let (issuer, user, _) = setup();
        let (other, _, _) = setup();
        let nonce = Nonce::random(&mut rand::thread_rng());
        let request = CredentialRequest::new(&user, other.public(), nonce);
        let Err(Error::ZkpError(_)) =
            issuer.issue(&request, attributes(), &mut rand::thread_rng())
        else {
            panic!("request for another issuer was accepted");
        };
    }
}
