//! The provider facade and the handler traits it dispatches to.
//!
//! A [Csp] holds one handler per [Algorithm] for each operation, registered through
//! [CspBuilder]. Every operation looks up the handler by the algorithm tag of its options and
//! fails with [Error::UnsupportedAlgorithm] if none is registered.

use std::{collections::HashMap, sync::Arc};

use digest::DynDigest;

use crate::{
    error::{Error, Result},
    key::{KeyRef, Ski},
    keystore::KeyStore,
    logging::LogSequence,
    opts::{
        Algorithm, DecrypterOpts, EncrypterOpts, HashOpts, KeyDerivOpts, KeyGenOpts,
        KeyImportOpts, SignerOpts,
    },
};

/// Cryptographic service provider.
pub trait Bccsp: Send + Sync {
    fn key_gen(&self, opts: &KeyGenOpts) -> Result<KeyRef>;

    fn key_deriv(&self, key: &KeyRef, opts: &KeyDerivOpts) -> Result<KeyRef>;

    fn key_import(&self, raw: &[u8], opts: &KeyImportOpts) -> Result<KeyRef>;

    fn get_key(&self, ski: &Ski) -> Result<KeyRef>;

    fn hash(&self, msg: &[u8], opts: &HashOpts) -> Result<Vec<u8>>;

    fn get_hash(&self, opts: &HashOpts) -> Result<Box<dyn DynDigest + Send>>;

    /// Sign a digest. The key must be an asymmetric private key.
    fn sign(&self, key: &KeyRef, digest: &[u8], opts: &SignerOpts) -> Result<Vec<u8>>;

    /// Verify a signature over a digest. The key must be asymmetric.
    fn verify(
        &self,
        key: &KeyRef,
        signature: &[u8],
        digest: &[u8],
        opts: &SignerOpts,
    ) -> Result<bool>;

    fn encrypt(&self, key: &KeyRef, plaintext: &[u8], opts: &EncrypterOpts) -> Result<Vec<u8>>;

    fn decrypt(&self, key: &KeyRef, ciphertext: &[u8], opts: &DecrypterOpts) -> Result<Vec<u8>>;
}

pub trait KeyGenerator: Send + Sync {
    fn key_gen(&self, opts: &KeyGenOpts) -> Result<KeyRef>;
}

pub trait KeyDeriver: Send + Sync {
    fn key_deriv(&self, key: &KeyRef, opts: &KeyDerivOpts) -> Result<KeyRef>;
}

pub trait KeyImporter: Send + Sync {
    fn key_import(&self, raw: &[u8], opts: &KeyImportOpts) -> Result<KeyRef>;
}

pub trait Hasher: Send + Sync {
    fn hash(&self, msg: &[u8], opts: &HashOpts) -> Result<Vec<u8>> {
        let mut hasher = self.get_hash(opts)?;
        hasher.update(msg);
        Ok(hasher.finalize().into_vec())
    }

    fn get_hash(&self, opts: &HashOpts) -> Result<Box<dyn DynDigest + Send>>;
}

pub trait Signer: Send + Sync {
    fn sign(&self, key: &KeyRef, digest: &[u8], opts: &SignerOpts) -> Result<Vec<u8>>;
}

pub trait Verifier: Send + Sync {
    fn verify(
        &self,
        key: &KeyRef,
        signature: &[u8],
        digest: &[u8],
        opts: &SignerOpts,
    ) -> Result<bool>;
}

pub trait Encryptor: Send + Sync {
    fn encrypt(&self, key: &KeyRef, plaintext: &[u8], opts: &EncrypterOpts) -> Result<Vec<u8>>;
}

pub trait Decryptor: Send + Sync {
    fn decrypt(&self, key: &KeyRef, ciphertext: &[u8], opts: &DecrypterOpts) -> Result<Vec<u8>>;
}

type Registry<H> = HashMap<Algorithm, Arc<H>>;

fn handler<H: ?Sized>(registry: &Registry<H>, algorithm: Algorithm) -> Result<&Arc<H>> {
    registry
        .get(&algorithm)
        .ok_or_else(|| Error::UnsupportedAlgorithm(algorithm.to_string()))
}

/// Registers handlers for a [Csp].
pub struct CspBuilder {
    keystore: Arc<dyn KeyStore>,
    sequence: Arc<LogSequence>,
    default_hash: HashOpts,
    key_generators: Registry<dyn KeyGenerator>,
    key_derivers: Registry<dyn KeyDeriver>,
    key_importers: Registry<dyn KeyImporter>,
    hashers: Registry<dyn Hasher>,
    signers: Registry<dyn Signer>,
    verifiers: Registry<dyn Verifier>,
    encryptors: Registry<dyn Encryptor>,
    decryptors: Registry<dyn Decryptor>,
}

impl CspBuilder {
    pub fn new(keystore: Arc<dyn KeyStore>) -> Self {
        Self {
            keystore,
            sequence: Arc::new(LogSequence::default()),
            default_hash: HashOpts::Sha256,
            key_generators: HashMap::new(),
            key_derivers: HashMap::new(),
            key_importers: HashMap::new(),
            hashers: HashMap::new(),
            signers: HashMap::new(),
            verifiers: HashMap::new(),
            encryptors: HashMap::new(),
            decryptors: HashMap::new(),
        }
    }

    /// Use the given sequence for operation ids instead of a fresh one starting at zero.
    pub fn sequence(mut self, sequence: Arc<LogSequence>) -> Self {
        self.sequence = sequence;
        self
    }

    /// Hash used for [HashOpts::Sha].
    pub fn default_hash(mut self, opts: HashOpts) -> Self {
        self.default_hash = opts;
        self
    }

    pub fn key_generator(mut self, algorithm: Algorithm, h: Arc<dyn KeyGenerator>) -> Self {
        self.key_generators.insert(algorithm, h);
        self
    }

    pub fn key_deriver(mut self, algorithm: Algorithm, h: Arc<dyn KeyDeriver>) -> Self {
        self.key_derivers.insert(algorithm, h);
        self
    }

    pub fn key_importer(mut self, algorithm: Algorithm, h: Arc<dyn KeyImporter>) -> Self {
        self.key_importers.insert(algorithm, h);
        self
    }

    pub fn hasher(mut self, algorithm: Algorithm, h: Arc<dyn Hasher>) -> Self {
        self.hashers.insert(algorithm, h);
        self
    }

    pub fn signer(mut self, algorithm: Algorithm, h: Arc<dyn Signer>) -> Self {
        self.signers.insert(algorithm, h);
        self
    }

    pub fn verifier(mut self, algorithm: Algorithm, h: Arc<dyn Verifier>) -> Self {
        self.verifiers.insert(algorithm, h);
        self
    }

    pub fn encryptor(mut self, algorithm: Algorithm, h: Arc<dyn Encryptor>) -> Self {
        self.encryptors.insert(algorithm, h);
        self
    }

    pub fn decryptor(mut self, algorithm: Algorithm, h: Arc<dyn Decryptor>) -> Self {
        self.decryptors.insert(algorithm, h);
        self
    }

    pub fn build(self) -> Csp {
        Csp {
            keystore: self.keystore,
            sequence: self.sequence,
            default_hash: self.default_hash,
            key_generators: self.key_generators,
            key_derivers: self.key_derivers,
            key_importers: self.key_importers,
            hashers: self.hashers,
            signers: self.signers,
            verifiers: self.verifiers,
            encryptors: self.encryptors,
            decryptors: self.decryptors,
        }
    }
}

/// A provider backed by a [KeyStore] and a set of algorithm handlers.
pub struct Csp {
    keystore: Arc<dyn KeyStore>,
    sequence: Arc<LogSequence>,
    default_hash: HashOpts,
    key_generators: Registry<dyn KeyGenerator>,
    key_derivers: Registry<dyn KeyDeriver>,
    key_importers: Registry<dyn KeyImporter>,
    hashers: Registry<dyn Hasher>,
    signers: Registry<dyn Signer>,
    verifiers: Registry<dyn Verifier>,
    encryptors: Registry<dyn Encryptor>,
    decryptors: Registry<dyn Decryptor>,
}

impl Csp {
    pub fn keystore(&self) -> &Arc<dyn KeyStore> {
        &self.keystore
    }

    pub fn sequence(&self) -> &Arc<LogSequence> {
        &self.sequence
    }

    fn persist(&self, key: &KeyRef, ephemeral: bool) -> Result<()> {
        if ephemeral {
            return Ok(());
        }
        self.keystore.store_key(key.clone()).inspect_err(|err| {
            tracing::warn!(ski = %key.ski(), %err, "failed storing key");
        })
    }

    fn resolve_hash(&self, opts: &HashOpts) -> HashOpts {
        match opts {
            HashOpts::Sha => self.default_hash,
            other => *other,
        }
    }
}

impl Bccsp for Csp {
    fn key_gen(&self, opts: &KeyGenOpts) -> Result<KeyRef> {
        let span = tracing::debug_span!("key_gen", id = self.sequence.next(), algorithm = %opts.algorithm());
        let _guard = span.enter();

        let key = handler(&self.key_generators, opts.algorithm())?.key_gen(opts)?;
        self.persist(&key, opts.ephemeral())?;
        tracing::debug!(ski = %key.ski(), "generated key");
        Ok(key)
    }

    fn key_deriv(&self, key: &KeyRef, opts: &KeyDerivOpts) -> Result<KeyRef> {
        let span = tracing::debug_span!("key_deriv", id = self.sequence.next(), algorithm = %opts.algorithm());
        let _guard = span.enter();

        let derived = handler(&self.key_derivers, opts.algorithm())?.key_deriv(key, opts)?;
        self.persist(&derived, opts.ephemeral())?;
        tracing::debug!(parent = %key.ski(), ski = %derived.ski(), "derived key");
        Ok(derived)
    }

    fn key_import(&self, raw: &[u8], opts: &KeyImportOpts) -> Result<KeyRef> {
        let span = tracing::debug_span!("key_import", id = self.sequence.next(), algorithm = %opts.algorithm());
        let _guard = span.enter();

        let key = handler(&self.key_importers, opts.algorithm())?.key_import(raw, opts)?;
        self.persist(&key, opts.ephemeral())?;
        tracing::debug!(ski = %key.ski(), "imported key");
        Ok(key)
    }

    fn get_key(&self, ski: &Ski) -> Result<KeyRef> {
        let span = tracing::trace_span!("get_key", id = self.sequence.next(), %ski);
        let _guard = span.enter();

        self.keystore.get_key(ski)
    }

    fn hash(&self, msg: &[u8], opts: &HashOpts) -> Result<Vec<u8>> {
        let opts = self.resolve_hash(opts);
        let span = tracing::trace_span!("hash", id = self.sequence.next(), algorithm = %opts.algorithm());
        let _guard = span.enter();

        handler(&self.hashers, opts.algorithm())?.hash(msg, &opts)
    }

    fn get_hash(&self, opts: &HashOpts) -> Result<Box<dyn DynDigest + Send>> {
        let opts = self.resolve_hash(opts);
        let span = tracing::trace_span!("get_hash", id = self.sequence.next(), algorithm = %opts.algorithm());
        let _guard = span.enter();

        handler(&self.hashers, opts.algorithm())?.get_hash(&opts)
    }

    fn sign(&self, key: &KeyRef, digest: &[u8], opts: &SignerOpts) -> Result<Vec<u8>> {
        let span = tracing::debug_span!("sign", id = self.sequence.next(), algorithm = %opts.algorithm(), ski = %key.ski());
        let _guard = span.enter();

        if key.symmetric() || !key.private() {
            return Err(Error::UnsupportedKeyOperation(
                "signing requires an asymmetric private key",
            ));
        }
        handler(&self.signers, opts.algorithm())?.sign(key, digest, opts)
    }

    fn verify(
        &self,
        key: &KeyRef,
        signature: &[u8],
        digest: &[u8],
        opts: &SignerOpts,
    ) -> Result<bool> {
        let span = tracing::debug_span!("verify", id = self.sequence.next(), algorithm = %opts.algorithm(), ski = %key.ski());
        let _guard = span.enter();

        if key.symmetric() {
            return Err(Error::UnsupportedKeyOperation(
                "verification requires an asymmetric key",
            ));
        }
        let valid = handler(&self.verifiers, opts.algorithm())?.verify(key, signature, digest, opts)?;
        tracing::debug!(valid, "verified signature");
        Ok(valid)
    }

    fn encrypt(&self, key: &KeyRef, plaintext: &[u8], opts: &EncrypterOpts) -> Result<Vec<u8>> {
        let span = tracing::debug_span!("encrypt", id = self.sequence.next(), algorithm = %opts.algorithm(), ski = %key.ski());
        let _guard = span.enter();

        handler(&self.encryptors, opts.algorithm())?.encrypt(key, plaintext, opts)
    }

    fn decrypt(&self, key: &KeyRef, ciphertext: &[u8], opts: &DecrypterOpts) -> Result<Vec<u8>> {
        let span = tracing::debug_span!("decrypt", id = self.sequence.next(), algorithm = %opts.algorithm(), ski = %key.ski());
        let _guard = span.enter();

        handler(&self.decryptors, opts.algorithm())?.decrypt(key, ciphertext, opts)
    }
}
