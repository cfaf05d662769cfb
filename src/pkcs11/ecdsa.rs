use core::{any::Any, fmt};
use std::sync::Arc;

use num_bigint::{BigInt, Sign};

use super::SessionPool;
use crate::{
    ecdsa::{is_low_s, marshal_signature, signature_to_low_s, unmarshal_signature, NamedCurve},
    error::{Error, Result},
    key::{downcast, Key, KeyRef, Ski},
    opts::{KeyGenOpts, SignerOpts},
    provider::{KeyGenerator, Signer, Verifier},
};

/// Public half of a key pair held on a token.
#[derive(Clone)]
pub struct HsmEcdsaPublicKey {
    curve: &'static str,
    point: Vec<u8>,
    ski: Ski,
}

impl HsmEcdsaPublicKey {
    fn new(curve: &'static str, point: Vec<u8>) -> Self {
        let ski = Ski::from_public_bytes(&point);
        Self { curve, point, ski }
    }
}

impl fmt::Debug for HsmEcdsaPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HsmEcdsaPublicKey")
            .field("curve", &self.curve)
            .field("ski", &self.ski)
            .finish()
    }
}

impl NamedCurve for HsmEcdsaPublicKey {
    fn curve_name(&self) -> &str {
        self.curve
    }
}

impl Key for HsmEcdsaPublicKey {
    /// Uncompressed SEC1 encoding of the point.
    fn bytes(&self) -> Result<Vec<u8>> {
        Ok(self.point.clone())
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

/// A private key that never leaves the token. The handle only carries its public half.
pub struct HsmEcdsaPrivateKey {
    public: Arc<HsmEcdsaPublicKey>,
}

impl fmt::Debug for HsmEcdsaPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HsmEcdsaPrivateKey")
            .field("curve", &self.public.curve)
            .field("ski", &self.public.ski)
            .finish_non_exhaustive()
    }
}

impl NamedCurve for HsmEcdsaPrivateKey {
    fn curve_name(&self) -> &str {
        self.public.curve
    }
}

impl Key for HsmEcdsaPrivateKey {
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

/// Resolve either half of a token key pair to its public key.
fn hsm_public_key(key: &dyn Key) -> Option<&HsmEcdsaPublicKey> {
    if let Ok(private) = downcast::<HsmEcdsaPrivateKey>(key) {
        return Some(&private.public);
    }
    downcast::<HsmEcdsaPublicKey>(key).ok()
}

pub struct Pkcs11KeyGenerator {
    pool: Arc<SessionPool>,
}

impl Pkcs11KeyGenerator {
    pub fn new(pool: Arc<SessionPool>) -> Self {
        Self { pool }
    }

    fn curve(&self, opts: &KeyGenOpts) -> Result<&'static str> {
        match opts {
            KeyGenOpts::EcdsaP256 { .. } => Ok("P-256"),
            KeyGenOpts::EcdsaP384 { .. } => Ok("P-384"),
            KeyGenOpts::Ecdsa { .. } => match self.pool.opts().security {
                256 => Ok("P-256"),
                384 => Ok("P-384"),
                other => Err(Error::Config(format!(
                    "security level not supported [{other}]"
                ))),
            },
            _ => Err(Error::InvalidOptions("expected ECDSA key generation options")),
        }
    }
}

impl KeyGenerator for Pkcs11KeyGenerator {
    fn key_gen(&self, opts: &KeyGenOpts) -> Result<KeyRef> {
        let curve = self.curve(opts)?;
        let point = self
            .pool
            .with_session(|session| session.generate_ecdsa(curve, opts.ephemeral()))?;
        let public = Arc::new(HsmEcdsaPublicKey::new(curve, point));
        tracing::debug!(curve, ski = %public.ski, "generated key pair on token");
        Ok(Arc::new(HsmEcdsaPrivateKey { public }))
    }
}

/// Signs on the token and emits low-S DER signatures. Keys that do not live on the token are
/// passed to the software signer.
pub struct Pkcs11Signer {
    pool: Arc<SessionPool>,
    software: Arc<dyn Signer>,
}

impl Pkcs11Signer {
    pub fn new(pool: Arc<SessionPool>, software: Arc<dyn Signer>) -> Self {
        Self { pool, software }
    }
}

impl Signer for Pkcs11Signer {
    fn sign(&self, key: &KeyRef, digest: &[u8], opts: &SignerOpts) -> Result<Vec<u8>> {
        let Ok(private) = downcast::<HsmEcdsaPrivateKey>(key.as_ref()) else {
            return self.software.sign(key, digest, opts);
        };
        let SignerOpts::Ecdsa = opts else {
            return Err(Error::InvalidOptions("expected ECDSA signer options"));
        };
        let (r, s) = self
            .pool
            .with_session(|session| session.sign_ecdsa(&private.public.ski, digest))?;
        let der = marshal_signature(
            &BigInt::from_bytes_be(Sign::Plus, &r),
            &BigInt::from_bytes_be(Sign::Plus, &s),
        )?;
        signature_to_low_s(private, &der)
    }
}

pub struct Pkcs11Verifier {
    pool: Arc<SessionPool>,
    software: Arc<dyn Verifier>,
}

impl Pkcs11Verifier {
    pub fn new(pool: Arc<SessionPool>, software: Arc<dyn Verifier>) -> Self {
        Self { pool, software }
    }
}

impl Verifier for Pkcs11Verifier {
    fn verify(
        &self,
        key: &KeyRef,
        signature: &[u8],
        digest: &[u8],
        opts: &SignerOpts,
    ) -> Result<bool> {
        let Some(public) = hsm_public_key(key.as_ref()) else {
            return self.software.verify(key, signature, digest, opts);
        };
        let SignerOpts::Ecdsa = opts else {
            return Err(Error::InvalidOptions("expected ECDSA signer options"));
        };
        let (r, s) = unmarshal_signature(signature)?;
        if !is_low_s(public, &s)? {
            tracing::debug!("rejecting signature with high S");
            return Ok(false);
        }
        let (r, s) = (r.to_bytes_be().1, s.to_bytes_be().1);
        self.pool
            .with_session(|session| session.verify_ecdsa(&public.ski, digest, &r, &s))
    }
}
