//! Selective-disclosure presentations of a credential.
//!
//! The holder re-randomizes the MAC to `(U', V') = (r·U, r·V)` and commits to `V'`, to the user
//! secret and to every hidden attribute. The issuer, which holds the MAC key, recomputes
//!
//! ```text
//! Z = x0·U' + x_sk·C_sk + Σ_hidden x_j·C_j + Σ_disclosed x_i·m_i·U' − C_v
//! ```
//!
//! and checks a proof that the holder knows openings making `Z` equal to
//! `z_sk·X_sk + Σ_hidden z_j·X_j − r_v·H`. The same proof binds the user secret to the
//! pseudonym. A separate one-of-many proof shows that the commitment to the hidden revocation
//! handle opens to one of the handles listed in the revocation information of the epoch.
//! Every component is freshly randomized, so two presentations of one credential cannot be
//! linked.

use core::convert::Infallible;

use curve25519_dalek::{
    constants::{RISTRETTO_BASEPOINT_POINT, RISTRETTO_BASEPOINT_TABLE},
    traits::IsIdentity,
    RistrettoPoint, Scalar,
};
use itertools::zip_eq;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::{
    attribute::Attribute,
    credential::Credential,
    issuer::{IssuerKeyPair, IssuerPublicKey},
    membership::MembershipProof,
    nym::{NymPublicKey, NymSecretKey, UserSecretKey},
    revocation::{Cri, RevocationPublicKey},
};
use crate::{
    error::{Error, ProtocolViolation, Result},
    zkp::{
        into_ok, AllocPointVar, AllocScalarVar, CompactProof, Constraint, Prover, Transcript,
        Verifier,
    },
};

macro_rules! label {
    ($s:literal) => {
        concat!("bccsp::idemix::presentation::", $s)
    };
}

/// The public inputs of a presentation, shared by the holder and the verifier.
#[derive(Clone, Copy)]
pub struct Statement<'a> {
    pub ipk: &'a IssuerPublicKey,
    /// One entry per schema attribute. [Attribute::Hidden] keeps the attribute hidden.
    pub disclosure: &'a [Attribute],
    /// Index of the revocation handle, which is never disclosed.
    pub rh_index: usize,
    pub cri: &'a Cri,
    pub epoch: u64,
    pub rpk: &'a RevocationPublicKey,
    pub msg: &'a [u8],
}

/// Indices of the hidden attributes, and the position of the revocation handle among them.
struct Layout {
    hidden: Vec<usize>,
    rh_pos: usize,
}

impl Statement<'_> {
    fn layout(&self) -> Result<Layout> {
        let expected = self.ipk.attribute_names().len();
        if self.disclosure.len() != expected {
            return Err(ProtocolViolation::AttributeCountMismatch {
                expected,
                actual: self.disclosure.len(),
            }
            .into());
        }
        let Some(rh) = self.disclosure.get(self.rh_index) else {
            return Err(ProtocolViolation::RhIndexOutOfRange(self.rh_index).into());
        };
        if !rh.is_hidden() {
            return Err(ProtocolViolation::HandleDisclosed.into());
        }
        let hidden: Vec<usize> = (0..expected)
            .filter(|i| self.disclosure[*i].is_hidden())
            .collect();
        let rh_pos = hidden
            .iter()
            .position(|i| *i == self.rh_index)
            .ok_or(ProtocolViolation::HandleDisclosed)?;
        Ok(Layout { hidden, rh_pos })
    }

    /// The revocation information must be signed and be for the requested epoch.
    fn check_cri(&self) -> Result<()> {
        if self.cri.epoch() != self.epoch {
            return Err(ProtocolViolation::HandleRevokedOrEpochStale.into());
        }
        self.cri.verify(self.rpk)
    }

    fn transcript(&self) -> Transcript {
        let mut transcript = Transcript::new(label!("transcript").as_bytes());
        transcript.append_message(b"ipk", &self.ipk.fingerprint());
        transcript.append_message(b"rpk", &self.rpk.to_bytes());
        transcript.append_message(b"epoch", &self.epoch.to_be_bytes());
        transcript.append_message(b"msg", self.msg);
        for attribute in self.disclosure {
            match attribute {
                Attribute::Hidden => transcript.append_message(b"hidden", &[]),
                value => transcript.append_message(b"disclosed", value.encode().as_bytes()),
            }
        }
        transcript
    }

    fn membership_transcript(&self) -> Transcript {
        let mut transcript = self.transcript();
        transcript.append_message(b"proof", b"membership");
        transcript
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct Commitments {
    /// Re-randomized `U'`.
    u: RistrettoPoint,
    commit_v: RistrettoPoint,
    commit_sk: RistrettoPoint,
    /// One commitment per hidden attribute, in schema order.
    commit_hidden: Vec<RistrettoPoint>,
}

struct Witness {
    sk: Scalar,
    r_nym: Scalar,
    r_v: Scalar,
    z_sk: Scalar,
    m_hidden: Vec<Scalar>,
    z_hidden: Vec<Scalar>,
}

impl Drop for Witness {
    fn drop(&mut self) {
        self.sk.zeroize();
        self.r_nym.zeroize();
        self.r_v.zeroize();
        self.z_sk.zeroize();
        self.m_hidden.zeroize();
        self.z_hidden.zeroize();
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Presentation {
    commitments: Commitments,
    proof: CompactProof,
    membership: MembershipProof,
}

impl Presentation {
    /// Present `credential` under the pseudonym `nym`.
    pub fn sign<R>(
        statement: &Statement<'_>,
        user: &UserSecretKey,
        nym: &NymSecretKey,
        credential: &Credential,
        rng: &mut R,
    ) -> Result<Self>
    where
        R: CryptoRngCore + ?Sized,
    {
        let layout = statement.layout()?;
        if credential.attributes.len() != statement.disclosure.len() {
            return Err(ProtocolViolation::AttributeCountMismatch {
                expected: statement.disclosure.len(),
                actual: credential.attributes.len(),
            }
            .into());
        }
        for (i, (disclosed, held)) in zip_eq(statement.disclosure, &credential.attributes)
            .enumerate()
            .filter(|(_, (disclosed, _))| !disclosed.is_hidden())
        {
            if disclosed != held {
                return Err(ProtocolViolation::DisclosedValueMismatch(i).into());
            }
        }
        if !nym.belongs_to(user) {
            return Err(Error::InvalidOptions(
                "pseudonym was not derived from the user secret key",
            ));
        }
        if credential.commitment != statement.ipk.x_sk * user.sk {
            return Err(Error::InvalidOptions(
                "credential was not issued to the user secret key",
            ));
        }

        let m_rh = credential.attributes[statement.rh_index].encode();
        statement.check_cri()?;
        if !statement.cri.contains(&m_rh) {
            return Err(ProtocolViolation::HandleRevokedOrEpochStale.into());
        }

        let ipk = statement.ipk;
        let r = Scalar::random(rng);
        let u = credential.u * r;
        let v = credential.v * r;

        let witness = Witness {
            sk: user.sk,
            r_nym: nym.r,
            r_v: Scalar::random(rng),
            z_sk: Scalar::random(rng),
            m_hidden: layout
                .hidden
                .iter()
                .map(|j| credential.attributes[*j].encode())
                .collect(),
            z_hidden: layout.hidden.iter().map(|_| Scalar::random(rng)).collect(),
        };
        let commitments = Commitments {
            u,
            commit_v: v + IssuerPublicKey::h() * witness.r_v,
            commit_sk: u * witness.sk + &witness.z_sk * RISTRETTO_BASEPOINT_TABLE,
            commit_hidden: zip_eq(&witness.m_hidden, &witness.z_hidden)
                .map(|(m_j, z_j)| u * m_j + z_j * RISTRETTO_BASEPOINT_TABLE)
                .collect(),
        };
        let z = ipk.x_sk * witness.z_sk
            + zip_eq(&layout.hidden, &witness.z_hidden)
                .map(|(j, z_j)| ipk.x[*j] * z_j)
                .sum::<RistrettoPoint>()
            - IssuerPublicKey::h() * witness.r_v;

        let proof = into_ok(prove_presentation(
            statement,
            &layout,
            &nym.public.point,
            &witness,
            &commitments,
            &z,
        ));
        let membership = MembershipProof::prove(
            &mut statement.membership_transcript(),
            &commitments.u,
            &commitments.commit_hidden[layout.rh_pos],
            statement.cri.handles(),
            &m_rh,
            &witness.z_hidden[layout.rh_pos],
            rng,
        )?;
        Ok(Self {
            commitments,
            proof,
            membership,
        })
    }

    /// Verify the presentation with the issuer's MAC key.
    pub fn verify(
        &self,
        statement: &Statement<'_>,
        nym: &NymPublicKey,
        issuer: &IssuerKeyPair,
    ) -> Result<()> {
        if issuer.public() != statement.ipk {
            return Err(Error::InvalidOptions(
                "issuer key pair does not match the issuer public key",
            ));
        }
        let layout = statement.layout()?;
        let c = &self.commitments;
        statement.check_cri()?;
        if c.u.is_identity() || c.commit_hidden.len() != layout.hidden.len() {
            return Err(Error::VerificationFailed);
        }

        let secret = &issuer.secret;
        let mut z = c.u * secret.x0 + c.commit_sk * secret.x_sk - c.commit_v;
        for (j, c_j) in zip_eq(&layout.hidden, &c.commit_hidden) {
            z += c_j * secret.x[*j];
        }
        for (i, m_i) in statement.disclosure.iter().enumerate() {
            if !m_i.is_hidden() {
                z += c.u * (secret.x[i] * m_i.encode());
            }
        }

        verify_presentation(statement, &layout, &nym.point, c, &z, &self.proof)?;
        self.membership.verify(
            &mut statement.membership_transcript(),
            &c.u,
            &c.commit_hidden[layout.rh_pos],
            statement.cri.handles(),
        )
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::Encoding(format!("presentation: {e}")))
    }
}

fn prove_presentation(
    statement: &Statement<'_>,
    layout: &Layout,
    nym: &RistrettoPoint,
    witness: &Witness,
    commitments: &Commitments,
    z: &RistrettoPoint,
) -> Result<CompactProof, Infallible> {
    let ipk = statement.ipk;
    let mut transcript = statement.transcript();
    let mut prover = Prover::new(label!("constraints").as_bytes(), &mut transcript);

    // Allocate variables used in multiple constraint declarations.
    let g_var = prover.alloc_point((label!("G"), RISTRETTO_BASEPOINT_POINT))?;
    let u_var = prover.alloc_point((label!("U"), commitments.u))?;
    let sk_var = prover.alloc_scalar((label!("sk"), witness.sk))?;
    let z_sk_var = prover.alloc_scalar((label!("z_sk"), witness.z_sk))?;
    let m_vars = witness
        .m_hidden
        .iter()
        .map(|m_j| prover.alloc_scalar((label!("m_j"), *m_j)))
        .collect::<Result<Vec<_>, _>>()?;
    let z_vars = witness
        .z_hidden
        .iter()
        .map(|z_j| prover.alloc_scalar((label!("z_j"), *z_j)))
        .collect::<Result<Vec<_>, _>>()?;

    // Constrain Z = z_sk * X_sk + sum(z_j * X_j) - r_v * H
    let mut constraint = Constraint::new();
    constraint.add(&mut prover, z_sk_var, (label!("X_sk"), ipk.x_sk))?;
    constraint.sum(
        &mut prover,
        z_vars.iter().copied(),
        layout.hidden.iter().map(|j| (label!("X_j"), ipk.x[*j])),
    )?;
    constraint.add(
        &mut prover,
        (label!("-r_v"), -witness.r_v),
        (label!("H"), IssuerPublicKey::h()),
    )?;
    constraint.eq(&mut prover, (label!("Z"), *z))?;

    // Constrain C_sk = sk * U + z_sk * G
    let mut constraint = Constraint::new();
    constraint.add(&mut prover, sk_var, u_var)?;
    constraint.add(&mut prover, z_sk_var, g_var)?;
    constraint.eq(&mut prover, (label!("C_sk"), commitments.commit_sk))?;

    // Constrain each C_j = m_j * U + z_j * G
    let iter = zip_eq(zip_eq(&m_vars, &z_vars), &commitments.commit_hidden);
    for ((m_var, z_var), c_j) in iter {
        let mut constraint = Constraint::new();
        constraint.add(&mut prover, *m_var, u_var)?;
        constraint.add(&mut prover, *z_var, g_var)?;
        constraint.eq(&mut prover, (label!("C_j"), *c_j))?;
    }

    // Constrain Nym = sk * H_sk + r_nym * H_rand
    let mut constraint = Constraint::new();
    constraint.add(&mut prover, sk_var, (label!("H_sk"), ipk.h_sk()))?;
    constraint.add(
        &mut prover,
        (label!("r_nym"), witness.r_nym),
        (label!("H_rand"), ipk.h_rand()),
    )?;
    constraint.eq(&mut prover, (label!("Nym"), *nym))?;

    Ok(prover.prove_compact())
}

fn verify_presentation(
    statement: &Statement<'_>,
    layout: &Layout,
    nym: &RistrettoPoint,
    commitments: &Commitments,
    z: &RistrettoPoint,
    proof: &CompactProof,
) -> Result<()> {
    let ipk = statement.ipk;
    let mut transcript = statement.transcript();
    let mut verifier = Verifier::new(label!("constraints").as_bytes(), &mut transcript);

    // Allocate variables used in multiple constraint declarations.
    let g_var = verifier.alloc_point((label!("G"), RISTRETTO_BASEPOINT_POINT))?;
    let u_var = verifier.alloc_point((label!("U"), commitments.u))?;
    let sk_var = verifier.alloc_scalar(label!("sk"))?;
    let z_sk_var = verifier.alloc_scalar(label!("z_sk"))?;
    let m_vars = layout
        .hidden
        .iter()
        .map(|_| verifier.alloc_scalar(label!("m_j")))
        .collect::<Result<Vec<_>, _>>()?;
    let z_vars = layout
        .hidden
        .iter()
        .map(|_| verifier.alloc_scalar(label!("z_j")))
        .collect::<Result<Vec<_>, _>>()?;

    // Constrain Z = z_sk * X_sk + sum(z_j * X_j) - r_v * H
    let mut constraint = Constraint::new();
    constraint.add(&mut verifier, z_sk_var, (label!("X_sk"), ipk.x_sk))?;
    constraint.sum(
        &mut verifier,
        z_vars.iter().copied(),
        layout.hidden.iter().map(|j| (label!("X_j"), ipk.x[*j])),
    )?;
    constraint.add(&mut verifier, label!("-r_v"), (label!("H"), IssuerPublicKey::h()))?;
    constraint.eq(&mut verifier, (label!("Z"), *z))?;

    // Constrain C_sk = sk * U + z_sk * G
    let mut constraint = Constraint::new();
    constraint.add(&mut verifier, sk_var, u_var)?;
    constraint.add(&mut verifier, z_sk_var, g_var)?;
    constraint.eq(&mut verifier, (label!("C_sk"), commitments.commit_sk))?;

    // Constrain each C_j = m_j * U + z_j * G
    let iter = zip_eq(zip_eq(&m_vars, &z_vars), &commitments.commit_hidden);
    for ((m_var, z_var), c_j) in iter {
        let mut constraint = Constraint::new();
        constraint.add(&mut verifier, *m_var, u_var)?;
        constraint.add(&mut verifier, *z_var, g_var)?;
        constraint.eq(&mut verifier, (label!("C_j"), *c_j))?;
    }

    // Constrain Nym = sk * H_sk + r_nym * H_rand
    let mut constraint = Constraint::new();
    constraint.add(&mut verifier, sk_var, (label!("H_sk"), ipk.h_sk()))?;
    constraint.add(&mut verifier, label!("r_nym"), (label!("H_rand"), ipk.h_rand()))?;
    constraint.eq(&mut verifier, (label!("Nym"), *nym))?;

    Ok(verifier.verify_compact(proof)?)
}
