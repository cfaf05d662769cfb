use core::{any::Any, fmt};
use std::sync::Arc;

use blake2::{Blake2b512, Digest};
use curve25519_dalek::{constants::RISTRETTO_BASEPOINT_TABLE, RistrettoPoint, Scalar};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::attribute::check_schema;
use crate::{
    error::{Error, Result},
    hash::hash_labeled,
    key::{Key, KeyRef, Ski},
};

/// Secret scalars of the algebraic MAC: `x0` for the constant term, `x_sk` for the user secret
/// and one `x_i` per schema attribute.
pub(crate) struct IssuerSecret {
    pub(crate) x0: Scalar,
    pub(crate) x_sk: Scalar,
    pub(crate) x: Vec<Scalar>,
}

impl Drop for IssuerSecret {
    fn drop(&mut self) {
        self.x0.zeroize();
        self.x_sk.zeroize();
        self.x.zeroize();
    }
}

/// Issuer public key: commitments to the MAC key and the ordered attribute schema.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuerPublicKey {
    attribute_names: Vec<String>,
    /// `x0·H`
    pub(crate) x0: RistrettoPoint,
    /// `x_sk·G`
    pub(crate) x_sk: RistrettoPoint,
    /// `x_i·G`
    pub(crate) x: Vec<RistrettoPoint>,
    ski: Ski,
}

#[derive(Serialize)]
struct Encoding<'a> {
    attribute_names: &'a [String],
    x0: &'a RistrettoPoint,
    x_sk: &'a RistrettoPoint,
    x: &'a [RistrettoPoint],
}

#[derive(Deserialize)]
struct Decoding {
    attribute_names: Vec<String>,
    x0: RistrettoPoint,
    x_sk: RistrettoPoint,
    x: Vec<RistrettoPoint>,
}

impl IssuerPublicKey {
    /// H is the base point for `x0`. It must have no known discrete log relative to G.
    pub fn h() -> RistrettoPoint {
        hash_labeled("bccsp::idemix::issuer::h", &[])
    }

    fn new(
        attribute_names: Vec<String>,
        x0: RistrettoPoint,
        x_sk: RistrettoPoint,
        x: Vec<RistrettoPoint>,
    ) -> Result<Self> {
        let mut key = Self {
            attribute_names,
            x0,
            x_sk,
            x,
            ski: Ski::new(Vec::new()),
        };
        key.ski = Ski::from_public_bytes(&key.to_bytes()?);
        Ok(key)
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    /// Generator for the user secret in pseudonyms under this issuer.
    pub fn h_sk(&self) -> RistrettoPoint {
        hash_labeled(
            "bccsp::idemix::issuer::h_sk",
            &[self.x0.compress().as_bytes()],
        )
    }

    /// Generator for the pseudonym randomness under this issuer.
    pub fn h_rand(&self) -> RistrettoPoint {
        hash_labeled(
            "bccsp::idemix::issuer::h_rand",
            &[self.x0.compress().as_bytes()],
        )
    }

    /// Digest of the key, bound into every proof made against it.
    pub fn fingerprint(&self) -> Vec<u8> {
        let mut hasher = Blake2b512::new();
        hasher.update("bccsp::idemix::issuer::fingerprint");
        for name in &self.attribute_names {
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
        }
        hasher.update(self.x0.compress().as_bytes());
        hasher.update(self.x_sk.compress().as_bytes());
        for x_i in &self.x {
            hasher.update(x_i.compress().as_bytes());
        }
        hasher.finalize().to_vec()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(&Encoding {
            attribute_names: &self.attribute_names,
            x0: &self.x0,
            x_sk: &self.x_sk,
            x: &self.x,
        })?)
    }

    /// Decode a public key, requiring its schema to equal `attribute_names`.
    pub fn from_bytes(bytes: &[u8], attribute_names: &[String]) -> Result<Self> {
        let encoding: Decoding = rmp_serde::from_slice(bytes)?;
        if encoding.attribute_names != attribute_names {
            return Err(Error::InvalidKeyMaterial(
                "issuer public key does not match the attribute names".into(),
            ));
        }
        if encoding.x.len() != encoding.attribute_names.len() {
            return Err(Error::InvalidKeyMaterial(
                "issuer public key has one element per attribute".into(),
            ));
        }
        check_schema(&encoding.attribute_names)?;
        Self::new(
            encoding.attribute_names,
            encoding.x0,
            encoding.x_sk,
            encoding.x,
        )
    }
}

impl fmt::Debug for IssuerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerPublicKey")
            .field("attribute_names", &self.attribute_names)
            .field("ski", &self.ski)
            .finish_non_exhaustive()
    }
}

impl Key for IssuerPublicKey {
    fn bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes()
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

/// An issuer's MAC key together with its public key.
pub struct IssuerKeyPair {
    pub(crate) secret: IssuerSecret,
    pub(crate) public: Arc<IssuerPublicKey>,
}

impl IssuerKeyPair {
    pub fn generate<R>(attribute_names: Vec<String>, rng: &mut R) -> Result<Self>
    where
        R: CryptoRngCore + ?Sized,
    {
        check_schema(&attribute_names)?;
        let secret = IssuerSecret {
            x0: Scalar::random(rng),
            x_sk: Scalar::random(rng),
            x: (0..attribute_names.len())
                .map(|_| Scalar::random(rng))
                .collect(),
        };
        let public = IssuerPublicKey::new(
            attribute_names,
            IssuerPublicKey::h() * secret.x0,
            &secret.x_sk * RISTRETTO_BASEPOINT_TABLE,
            secret
                .x
                .iter()
                .map(|x_i| x_i * RISTRETTO_BASEPOINT_TABLE)
                .collect(),
        )?;
        Ok(Self {
            secret,
            public: Arc::new(public),
        })
    }

    pub fn public(&self) -> &IssuerPublicKey {
        &self.public
    }
}

impl fmt::Debug for IssuerKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl Key for IssuerKeyPair {
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
