//! Software ECDSA over secp256k1.

use core::{any::Any, fmt};
use std::sync::Arc;

use k256::{
    ecdsa::{
        signature::hazmat::{PrehashSigner, PrehashVerifier},
        Signature, SigningKey, VerifyingKey,
    },
    elliptic_curve::PrimeField,
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    FieldBytes, NonZeroScalar, ProjectivePoint, Scalar,
};
use num_bigint::{BigInt, Sign};

use crate::{
    ecdsa::{
        curve_order, is_low_s, marshal_signature, signature_to_low_s, unmarshal_signature,
        NamedCurve,
    },
    error::{Error, Result},
    key::{downcast, Key, KeyRef, Ski},
    opts::{KeyDerivOpts, KeyGenOpts, KeyImportOpts, SignerOpts},
    provider::{KeyDeriver, KeyGenerator, KeyImporter, Signer, Verifier},
};

pub const CURVE: &str = "secp256k1";

pub struct EcdsaPublicKey {
    verifying: VerifyingKey,
    ski: Ski,
}

impl EcdsaPublicKey {
    pub fn new(verifying: VerifyingKey) -> Self {
        let ski = Ski::from_public_bytes(verifying.to_encoded_point(false).as_bytes());
        Self { verifying, ski }
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying
    }
}

impl fmt::Debug for EcdsaPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaPublicKey")
            .field("curve", &CURVE)
            .field("ski", &self.ski)
            .finish()
    }
}

impl NamedCurve for EcdsaPublicKey {
    fn curve_name(&self) -> &str {
        CURVE
    }
}

impl Key for EcdsaPublicKey {
    /// Uncompressed SEC1 encoding of the point.
    fn bytes(&self) -> Result<Vec<u8>> {
        Ok(self.verifying.to_encoded_point(false).as_bytes().to_vec())
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
        Ok(Arc::new(Self::new(self.verifying)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct EcdsaPrivateKey {
    signing: SigningKey,
    public: Arc<EcdsaPublicKey>,
}

impl EcdsaPrivateKey {
    pub fn new(signing: SigningKey) -> Self {
        let public = Arc::new(EcdsaPublicKey::new(*signing.verifying_key()));
        Self { signing, public }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing
    }
}

impl fmt::Debug for EcdsaPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaPrivateKey")
            .field("curve", &CURVE)
            .field("ski", &self.public.ski)
            .finish_non_exhaustive()
    }
}

impl NamedCurve for EcdsaPrivateKey {
    fn curve_name(&self) -> &str {
        CURVE
    }
}

impl Key for EcdsaPrivateKey {
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

/// Resolve either half of a key pair to its verifying key.
fn verifying_key(key: &dyn Key) -> Result<&VerifyingKey> {
    if let Ok(private) = downcast::<EcdsaPrivateKey>(key) {
        return Ok(private.public.verifying_key());
    }
    Ok(downcast::<EcdsaPublicKey>(key)?.verifying_key())
}

fn to_field_bytes(value: &BigInt) -> Option<FieldBytes> {
    let (sign, bytes) = value.to_bytes_be();
    if sign == Sign::Minus || bytes.len() > 32 {
        return None;
    }
    let mut out = FieldBytes::default();
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Some(out)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaKeyGenerator;

impl KeyGenerator for EcdsaKeyGenerator {
    fn key_gen(&self, opts: &KeyGenOpts) -> Result<KeyRef> {
        let KeyGenOpts::Ecdsa { .. } = opts else {
            return Err(Error::InvalidOptions("expected ECDSA key generation options"));
        };
        let signing = SigningKey::random(&mut rand::thread_rng());
        Ok(Arc::new(EcdsaPrivateKey::new(signing)))
    }
}

/// Imports SEC1 public keys and private scalars (raw, or PKCS#8 DER).
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaKeyImporter;

impl KeyImporter for EcdsaKeyImporter {
    fn key_import(&self, raw: &[u8], opts: &KeyImportOpts) -> Result<KeyRef> {
        if raw.is_empty() {
            return Err(Error::InvalidKeyMaterial(
                "invalid raw material, it must not be empty".into(),
            ));
        }
        match opts {
            KeyImportOpts::EcdsaPublicKey { .. } => {
                let verifying = VerifyingKey::from_sec1_bytes(raw).map_err(|e| {
                    Error::InvalidKeyMaterial(format!("failed parsing public key: {e}"))
                })?;
                Ok(Arc::new(EcdsaPublicKey::new(verifying)))
            }
            KeyImportOpts::EcdsaPrivateKey { .. } => {
                let signing = match raw.len() {
                    32 => SigningKey::from_slice(raw).map_err(|e| e.to_string()),
                    _ => SigningKey::from_pkcs8_der(raw).map_err(|e| e.to_string()),
                }
                .map_err(|e| {
                    Error::InvalidKeyMaterial(format!("failed parsing private key: {e}"))
                })?;
                Ok(Arc::new(EcdsaPrivateKey::new(signing)))
            }
            _ => Err(Error::InvalidOptions("expected ECDSA import options")),
        }
    }
}

/// Imports the public key of a DER-encoded SubjectPublicKeyInfo.
#[derive(Debug, Clone, Copy, Default)]
pub struct X509PublicKeyImporter;

impl KeyImporter for X509PublicKeyImporter {
    fn key_import(&self, raw: &[u8], opts: &KeyImportOpts) -> Result<KeyRef> {
        let KeyImportOpts::X509PublicKey { .. } = opts else {
            return Err(Error::InvalidOptions("expected X509 public key import options"));
        };
        let verifying = VerifyingKey::from_public_key_der(raw).map_err(|e| {
            Error::InvalidKeyMaterial(format!("failed parsing subject public key info: {e}"))
        })?;
        Ok(Arc::new(EcdsaPublicKey::new(verifying)))
    }
}

/// Re-randomizes a key pair by an expansion value.
///
/// With `k = (expansion mod (n - 1)) + 1`, a private key `d` becomes `d + k` and a public key `Q`
/// becomes `Q + k·G`, so derivations of both halves of a pair stay paired.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaReRandKeyDeriver;

impl EcdsaReRandKeyDeriver {
    fn offset(expansion: &[u8]) -> Result<Scalar> {
        let n = curve_order(CURVE)?;
        let k = BigInt::from_bytes_be(Sign::Plus, expansion) % (n - 1u32) + 1u32;
        to_field_bytes(&k)
            .and_then(|bytes| Option::from(Scalar::from_repr(bytes)))
            .ok_or_else(|| Error::InvalidKeyMaterial("expansion value out of range".into()))
    }
}

impl KeyDeriver for EcdsaReRandKeyDeriver {
    fn key_deriv(&self, key: &KeyRef, opts: &KeyDerivOpts) -> Result<KeyRef> {
        let KeyDerivOpts::EcdsaReRand { expansion, .. } = opts else {
            return Err(Error::InvalidOptions("expected ECDSA re-randomization options"));
        };
        let k = Self::offset(expansion)?;

        if let Ok(private) = downcast::<EcdsaPrivateKey>(key.as_ref()) {
            let d = *private.signing.as_nonzero_scalar().as_ref() + k;
            let d = Option::<NonZeroScalar>::from(NonZeroScalar::new(d)).ok_or_else(|| {
                Error::InvalidKeyMaterial("re-randomized private key is zero".into())
            })?;
            return Ok(Arc::new(EcdsaPrivateKey::new(SigningKey::from(d))));
        }

        let public = downcast::<EcdsaPublicKey>(key.as_ref())?;
        let q = ProjectivePoint::from(*public.verifying.as_affine())
            + ProjectivePoint::GENERATOR * k;
        let verifying = VerifyingKey::from_affine(q.to_affine()).map_err(|_| {
            Error::InvalidKeyMaterial("re-randomized public key is the identity".into())
        })?;
        Ok(Arc::new(EcdsaPublicKey::new(verifying)))
    }
}

/// Signs digests and emits low-S DER signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaSigner;

impl Signer for EcdsaSigner {
    fn sign(&self, key: &KeyRef, digest: &[u8], opts: &SignerOpts) -> Result<Vec<u8>> {
        let SignerOpts::Ecdsa = opts else {
            return Err(Error::InvalidOptions("expected ECDSA signer options"));
        };
        let private = downcast::<EcdsaPrivateKey>(key.as_ref())?;
        let signature: Signature = private
            .signing
            .sign_prehash(digest)
            .map_err(|e| Error::Signing(e.to_string()))?;
        let (r, s) = signature.split_bytes();
        let der = marshal_signature(
            &BigInt::from_bytes_be(Sign::Plus, &r),
            &BigInt::from_bytes_be(Sign::Plus, &s),
        )?;
        signature_to_low_s(private, &der)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaVerifier;

impl Verifier for EcdsaVerifier {
    fn verify(
        &self,
        key: &KeyRef,
        signature: &[u8],
        digest: &[u8],
        opts: &SignerOpts,
    ) -> Result<bool> {
        let SignerOpts::Ecdsa = opts else {
            return Err(Error::InvalidOptions("expected ECDSA signer options"));
        };
        let verifying = verifying_key(key.as_ref())?;
        let (r, s) = unmarshal_signature(signature)?;
        if !is_low_s(CURVE, &s)? {
            tracing::debug!("rejecting signature with high S");
            return Ok(false);
        }
        let (Some(r), Some(s)) = (to_field_bytes(&r), to_field_bytes(&s)) else {
            return Ok(false);
        };
        let Ok(signature) = Signature::from_scalars(r, s) else {
            return Ok(false);
        };
        Ok(verifying.verify_prehash(digest, &signature).is_ok())
    }
}
