//! HMAC keys and HMAC-based key derivation.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::aes::AesKey;
use crate::{
    error::{Error, Result},
    key::{downcast, KeyRef},
    opts::{KeyDerivOpts, KeyImportOpts},
    provider::{KeyDeriver, KeyImporter},
};

type HmacSha256 = Hmac<Sha256>;

fn hmac_sha256(key: &[u8], arg: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::InvalidKeyMaterial(e.to_string()))?;
    mac.update(arg);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Derives keys from symmetric keys.
///
/// [KeyDerivOpts::HmacTruncated256] yields a non-exportable AES-256 key,
/// [KeyDerivOpts::Hmac] yields an exportable HMAC key.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacKeyDeriver;

impl KeyDeriver for HmacKeyDeriver {
    fn key_deriv(&self, key: &KeyRef, opts: &KeyDerivOpts) -> Result<KeyRef> {
        let parent = downcast::<AesKey>(key.as_ref())?;
        match opts {
            KeyDerivOpts::HmacTruncated256 { arg, .. } => {
                let mut derived = hmac_sha256(parent.material(), arg)?;
                derived.truncate(32);
                Ok(Arc::new(AesKey::new(derived, false)))
            }
            KeyDerivOpts::Hmac { arg, .. } => Ok(Arc::new(AesKey::new(
                hmac_sha256(parent.material(), arg)?,
                true,
            ))),
            _ => Err(Error::InvalidOptions("expected HMAC derivation options")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HmacKeyImporter;

impl KeyImporter for HmacKeyImporter {
    fn key_import(&self, raw: &[u8], opts: &KeyImportOpts) -> Result<KeyRef> {
        let KeyImportOpts::Hmac { .. } = opts else {
            return Err(Error::InvalidOptions("expected HMAC import options"));
        };
        if raw.is_empty() {
            return Err(Error::InvalidKeyMaterial(
                "invalid raw material, it must not be empty".into(),
            ));
        }
        Ok(Arc::new(AesKey::new(raw.to_vec(), false)))
    }
}
