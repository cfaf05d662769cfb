//! Software handlers driven through the provider facade.

use std::sync::Arc;

use bccsp::{
    ecdsa::{curve_order, marshal_signature, unmarshal_signature},
    AesGcmOpts, Bccsp, Csp, DecrypterOpts, EncrypterOpts, Error, FactoryOpts, HashOpts,
    InMemoryKeyStore, Key, KeyDerivOpts, KeyGenOpts, KeyImportOpts, KeyStore, SignerOpts,
};
use proptest::prelude::*;
use sha3::{Digest, Sha3_256};

fn provider(keystore: Arc<dyn KeyStore>) -> Csp {
    FactoryOpts::default().build(keystore, None).unwrap()
}

#[test]
fn ecdsa_keys_are_persisted_unless_temporary() {
    let keystore = Arc::new(InMemoryKeyStore::new());
    let csp = provider(keystore.clone());

    let kept = csp.key_gen(&KeyGenOpts::Ecdsa { temporary: false }).unwrap();
    let dropped = csp.key_gen(&KeyGenOpts::Ecdsa { temporary: true }).unwrap();
    assert_eq!(keystore.len(), 1);
    assert_eq!(csp.get_key(kept.ski()).unwrap().ski(), kept.ski());
    let Err(Error::KeyNotFound(ski)) = csp.get_key(dropped.ski()) else {
        panic!("temporary key was stored");
    };
    assert_eq!(&ski, dropped.ski());
}

#[test]
fn read_only_store_fails_persistent_generation() {
    let csp = provider(Arc::new(InMemoryKeyStore::sealed(std::iter::empty())));
    let Err(Error::ReadOnlyStoreViolation) =
        csp.key_gen(&KeyGenOpts::Aes256 { temporary: false })
    else {
        panic!("stored a key in a read-only store");
    };
    csp.key_gen(&KeyGenOpts::Aes256 { temporary: true }).unwrap();
}

#[test]
fn ecdsa_sign_verify_rerand() {
    let csp = provider(Arc::new(InMemoryKeyStore::new()));
    let sk = csp.key_gen(&KeyGenOpts::Ecdsa { temporary: true }).unwrap();
    let pk = sk.public_key().unwrap();
    let digest = csp.hash(b"hello world", &HashOpts::Sha).unwrap();

    let sig = csp.sign(&sk, &digest, &SignerOpts::Ecdsa).unwrap();
    assert!(csp.verify(&pk, &sig, &digest, &SignerOpts::Ecdsa).unwrap());

    let (r, s) = unmarshal_signature(&sig).unwrap();
    let high = marshal_signature(&r, &(curve_order("secp256k1").unwrap() - s)).unwrap();
    assert!(!csp.verify(&pk, &high, &digest, &SignerOpts::Ecdsa).unwrap());

    let Err(Error::UnsupportedKeyOperation(_)) = csp.sign(&pk, &digest, &SignerOpts::Ecdsa) else {
        panic!("signed with a public key");
    };

    let rerand = KeyDerivOpts::EcdsaReRand {
        temporary: true,
        expansion: vec![1, 2, 3],
    };
    let derived_sk = csp.key_deriv(&sk, &rerand).unwrap();
    let derived_pk = csp.key_deriv(&pk, &rerand).unwrap();
    assert_eq!(derived_sk.ski(), derived_pk.ski());
    assert_ne!(derived_sk.ski(), sk.ski());

    let sig = csp.sign(&derived_sk, &digest, &SignerOpts::Ecdsa).unwrap();
    assert!(csp.verify(&derived_pk, &sig, &digest, &SignerOpts::Ecdsa).unwrap());
    assert!(!csp.verify(&pk, &sig, &digest, &SignerOpts::Ecdsa).unwrap());
}

#[test]
fn ecdsa_public_key_import() {
    let csp = provider(Arc::new(InMemoryKeyStore::new()));
    let sk = csp.key_gen(&KeyGenOpts::Ecdsa { temporary: true }).unwrap();
    let raw = sk.public_key().unwrap().bytes().unwrap();
    let imported = csp
        .key_import(&raw, &KeyImportOpts::EcdsaPublicKey { temporary: true })
        .unwrap();
    assert_eq!(imported.ski(), sk.ski());

    let Err(Error::InvalidKeyMaterial(_)) =
        csp.key_import(&raw[1..], &KeyImportOpts::EcdsaPublicKey { temporary: true })
    else {
        panic!("truncated point was imported");
    };
}

#[test]
fn aes_and_hmac_derivation() {
    let csp = provider(Arc::new(InMemoryKeyStore::new()));
    let raw = [5u8; 32];
    let key = csp
        .key_import(&raw, &KeyImportOpts::Aes256 { temporary: true })
        .unwrap();
    let derived = csp
        .key_deriv(
            &key,
            &KeyDerivOpts::HmacTruncated256 {
                temporary: true,
                arg: b"label".to_vec(),
            },
        )
        .unwrap();
    assert!(derived.symmetric());
    assert_ne!(derived.ski(), key.ski());

    let opts = AesGcmOpts {
        aad: b"header".to_vec(),
    };
    let ciphertext = csp
        .encrypt(&derived, b"secret", &EncrypterOpts::AesGcm(opts.clone()))
        .unwrap();
    let plaintext = csp
        .decrypt(&derived, &ciphertext, &DecrypterOpts::AesGcm(opts))
        .unwrap();
    assert_eq!(plaintext, b"secret");

    let Err(Error::Cipher(_)) = csp.decrypt(
        &key,
        &ciphertext,
        &DecrypterOpts::AesGcm(AesGcmOpts::default()),
    ) else {
        panic!("decrypted with the wrong key");
    };
}

#[test]
fn hash_streaming_matches_one_shot() {
    let csp = provider(Arc::new(InMemoryKeyStore::new()));
    let mut hasher = csp.get_hash(&HashOpts::Sha3_256).unwrap();
    hasher.update(b"hello ");
    hasher.update(b"world");
    let streamed = hasher.finalize().into_vec();
    assert_eq!(streamed, csp.hash(b"hello world", &HashOpts::Sha3_256).unwrap());
    assert_eq!(streamed, Sha3_256::digest(b"hello world").to_vec());
}

proptest! {
    #[test]
    fn aes_gcm_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..256)) {
        let csp = provider(Arc::new(InMemoryKeyStore::new()));
        let key = csp.key_gen(&KeyGenOpts::Aes128 { temporary: true }).unwrap();
        let ciphertext = csp
            .encrypt(&key, &plaintext, &EncrypterOpts::AesGcm(AesGcmOpts::default()))
            .unwrap();
        let decrypted = csp
            .decrypt(&key, &ciphertext, &DecrypterOpts::AesGcm(AesGcmOpts::default()))
            .unwrap();
        prop_assert_eq!(decrypted, plaintext);
    }
}
