//! AES keys and AES-GCM encryption.

use core::{any::Any, fmt};
use std::sync::Arc;

use aes_gcm::{
    aead::{Aead, KeyInit, Nonce, Payload},
    aes::Aes192,
    Aes128Gcm, Aes256Gcm, AesGcm,
};
use rand::RngCore;
use typenum::U12;
use zeroize::Zeroizing;

use crate::{
    error::{Error, Result},
    key::{downcast, Key, KeyRef, Ski},
    opts::{DecrypterOpts, EncrypterOpts, KeyGenOpts, KeyImportOpts},
    provider::{Decryptor, Encryptor, KeyGenerator, KeyImporter},
};

type Aes192Gcm = AesGcm<Aes192, U12>;

const NONCE_LEN: usize = 12;

/// Symmetric key material, used for AES and as an HMAC key.
pub struct AesKey {
    bytes: Zeroizing<Vec<u8>>,
    exportable: bool,
    ski: Ski,
}

impl AesKey {
    pub fn new(bytes: Vec<u8>, exportable: bool) -> Self {
        let ski = Ski::from_public_bytes(&bytes);
        Self {
            bytes: Zeroizing::new(bytes),
            exportable,
            ski,
        }
    }

    pub(crate) fn material(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesKey")
            .field("len", &self.bytes.len())
            .field("exportable", &self.exportable)
            .field("ski", &self.ski)
            .finish()
    }
}

impl Key for AesKey {
    fn bytes(&self) -> Result<Vec<u8>> {
        match self.exportable {
            true => Ok(self.bytes.to_vec()),
            false => Err(Error::UnsupportedKeyOperation("not supported")),
        }
    }

    fn ski(&self) -> &Ski {
        &self.ski
    }

    fn symmetric(&self) -> bool {
        true
    }

    fn private(&self) -> bool {
        true
    }

    fn public_key(&self) -> Result<KeyRef> {
        Err(Error::UnsupportedKeyOperation(
            "cannot call this method on a symmetric key",
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Generates random AES keys of a fixed length.
#[derive(Debug, Clone, Copy)]
pub struct AesKeyGenerator {
    pub len: usize,
}

impl KeyGenerator for AesKeyGenerator {
    fn key_gen(&self, opts: &KeyGenOpts) -> Result<KeyRef> {
        match opts {
            KeyGenOpts::Aes { .. }
            | KeyGenOpts::Aes128 { .. }
            | KeyGenOpts::Aes192 { .. }
            | KeyGenOpts::Aes256 { .. } => {}
            _ => return Err(Error::InvalidOptions("expected AES key generation options")),
        }
        let mut bytes = vec![0u8; self.len];
        rand::thread_rng().fill_bytes(&mut bytes);
        Ok(Arc::new(AesKey::new(bytes, false)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AesKeyImporter;

impl KeyImporter for AesKeyImporter {
    fn key_import(&self, raw: &[u8], opts: &KeyImportOpts) -> Result<KeyRef> {
        let KeyImportOpts::Aes256 { .. } = opts else {
            return Err(Error::InvalidOptions("expected AES256 import options"));
        };
        if raw.is_empty() {
            return Err(Error::InvalidKeyMaterial(
                "invalid raw material, it must not be empty".into(),
            ));
        }
        if raw.len() != 32 {
            return Err(Error::InvalidKeyMaterial(format!(
                "invalid key length [{}], must be 32 bytes",
                raw.len()
            )));
        }
        Ok(Arc::new(AesKey::new(raw.to_vec(), false)))
    }
}

/// AES-GCM with a random 96-bit nonce prepended to the ciphertext.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmCipher;

fn seal<C: KeyInit + Aead>(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = C::new_from_slice(key).map_err(|e| Error::Cipher(e.to_string()))?;
    let mut nonce = Nonce::<C>::default();
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|e| Error::Cipher(format!("encryption failed: {e}")))?;

    let mut out = nonce.to_vec();
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn open<C: KeyInit + Aead>(key: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < NONCE_LEN {
        return Err(Error::Cipher("ciphertext too short".into()));
    }
    let cipher = C::new_from_slice(key).map_err(|e| Error::Cipher(e.to_string()))?;
    let (nonce, ciphertext) = ciphertext.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::<C>::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|e| Error::Cipher(format!("decryption failed: {e}")))
}

impl Encryptor for AesGcmCipher {
    fn encrypt(&self, key: &KeyRef, plaintext: &[u8], opts: &EncrypterOpts) -> Result<Vec<u8>> {
        let key = downcast::<AesKey>(key.as_ref())?.material();
        let EncrypterOpts::AesGcm(opts) = opts;
        match key.len() {
            16 => seal::<Aes128Gcm>(key, plaintext, &opts.aad),
            24 => seal::<Aes192Gcm>(key, plaintext, &opts.aad),
            32 => seal::<Aes256Gcm>(key, plaintext, &opts.aad),
            len => Err(Error::Cipher(format!("invalid AES key length [{len}]"))),
        }
    }
}

impl Decryptor for AesGcmCipher {
    fn decrypt(&self, key: &KeyRef, ciphertext: &[u8], opts: &DecrypterOpts) -> Result<Vec<u8>> {
        let key = downcast::<AesKey>(key.as_ref())?.material();
        let DecrypterOpts::AesGcm(opts) = opts;
        match key.len() {
            16 => open::<Aes128Gcm>(key, ciphertext, &opts.aad),
            24 => open::<Aes192Gcm>(key, ciphertext, &opts.aad),
            32 => open::<Aes256Gcm>(key, ciphertext, &opts.aad),
            len => Err(Error::Cipher(format!("invalid AES key length [{len}]"))),
        }
    }
}
