//! The credential lifecycle driven through the provider facade.

use std::sync::Arc;

use bccsp::{
    idemix::{Attribute, Nonce, NonceLedger},
    Bccsp, Csp, Error, FactoryOpts, InMemoryKeyStore, Key, KeyDerivOpts, KeyGenOpts, KeyImportOpts,
    KeyRef, PresentationOpts, ProtocolViolation, SignerOpts,
};

const SCHEMA: [&str; 4] = ["OU", "Role", "EnrollmentID", "RevocationHandle"];
const RH_INDEX: usize = 3;

struct Setup {
    csp: Csp,
    issuer: KeyRef,
    ipk: KeyRef,
    user: KeyRef,
    revocation: KeyRef,
    nonces: Arc<NonceLedger>,
}

fn setup() -> Setup {
    let csp = FactoryOpts::default()
        .build(Arc::new(InMemoryKeyStore::new()), None)
        .unwrap();
    let issuer = csp
        .key_gen(&KeyGenOpts::IdemixIssuer {
            temporary: false,
            attribute_names: SCHEMA.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap();
    let ipk = issuer.public_key().unwrap();
    let user = csp
        .key_gen(&KeyGenOpts::IdemixUserSecret { temporary: true })
        .unwrap();
    let revocation = csp
        .key_gen(&KeyGenOpts::IdemixRevocation { temporary: true })
        .unwrap();
    Setup {
        csp,
        issuer,
        ipk,
        user,
        revocation,
        nonces: Arc::new(NonceLedger::new()),
    }
}

fn attributes(handle: i64) -> Vec<Attribute> {
    vec![
        "org1".into(),
        "member".into(),
        "alice".into(),
        Attribute::Int(handle),
    ]
}

impl Setup {
    fn request(&self, nonce: Nonce) -> Vec<u8> {
        self.csp
            .sign(
                &self.user,
                &[],
                &SignerOpts::IdemixCredentialRequest {
                    issuer_public_key: self.ipk.clone(),
                    nonce,
                },
            )
            .unwrap()
    }

    fn issue(&self, handle: i64) -> Vec<u8> {
        let nonce = self.nonces.mint(self.issuer.ski());
        let request = self.request(nonce);
        self.csp
            .sign(
                &self.issuer,
                &request,
                &SignerOpts::IdemixCredential {
                    attributes: attributes(handle),
                    nonces: self.nonces.clone(),
                },
            )
            .unwrap()
    }

    fn nym(&self) -> KeyRef {
        self.csp
            .key_deriv(
                &self.user,
                &KeyDerivOpts::IdemixNym {
                    temporary: true,
                    issuer_public_key: self.ipk.clone(),
                },
            )
            .unwrap()
    }

    fn cri(&self, epoch: u64, handles: &[i64]) -> Vec<u8> {
        self.csp
            .sign(
                &self.revocation,
                &[],
                &SignerOpts::IdemixCri {
                    epoch,
                    unrevoked_handles: handles.iter().map(|h| Attribute::Int(*h)).collect(),
                },
            )
            .unwrap()
    }

    fn presentation(
        &self,
        nym: &KeyRef,
        credential: &[u8],
        cri: Vec<u8>,
        epoch: u64,
    ) -> PresentationOpts {
        PresentationOpts {
            nym: nym.clone(),
            issuer_public_key: self.ipk.clone(),
            credential: credential.to_vec(),
            disclosure: vec![
                "org1".into(),
                Attribute::Hidden,
                Attribute::Hidden,
                Attribute::Hidden,
            ],
            rh_index: RH_INDEX,
            cri,
            epoch,
            revocation_public_key: self.revocation.public_key().unwrap(),
        }
    }
}

#[test]
fn full_lifecycle() {
    let s = setup();
    let credential = s.issue(42);
    assert!(s
        .csp
        .verify(
            &s.user,
            &credential,
            &[],
            &SignerOpts::IdemixCredentialCheck {
                issuer_public_key: s.ipk.clone(),
            },
        )
        .unwrap());

    let nym = s.nym();
    let opts = SignerOpts::IdemixSignature(Box::new(s.presentation(
        &nym,
        &credential,
        s.cri(5, &[7, 42]),
        5,
    )));
    let msg = b"transfer 10 to bob";
    let signature = s.csp.sign(&s.user, msg, &opts).unwrap();

    // The verifier only sees the public half of the pseudonym.
    let mut verifier_opts = opts.clone();
    if let SignerOpts::IdemixSignature(p) = &mut verifier_opts {
        p.nym = nym.public_key().unwrap();
        p.credential.clear();
    }
    assert!(s.csp.verify(&s.issuer, &signature, msg, &verifier_opts).unwrap());
    assert!(!s
        .csp
        .verify(&s.issuer, &signature, b"transfer 1000 to bob", &verifier_opts)
        .unwrap());
}

#[test]
fn issuance_consumes_nonce() {
    let s = setup();
    let nonce = s.nonces.mint(s.issuer.ski());
    let request = s.request(nonce);
    let opts = SignerOpts::IdemixCredential {
        attributes: attributes(1),
        nonces: s.nonces.clone(),
    };
    s.csp.sign(&s.issuer, &request, &opts).unwrap();

    let Err(Error::ProtocolViolation(ProtocolViolation::NonceMismatch)) =
        s.csp.sign(&s.issuer, &request, &opts)
    else {
        panic!("request was accepted twice");
    };
}

#[test]
fn forged_request_leaves_nonce_pending() {
    let s = setup();
    let other = s
        .csp
        .key_gen(&KeyGenOpts::IdemixIssuer {
            temporary: true,
            attribute_names: SCHEMA.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap();
    let nonce = s.nonces.mint(s.issuer.ski());
    let forged = s
        .csp
        .sign(
            &s.user,
            &[],
            &SignerOpts::IdemixCredentialRequest {
                issuer_public_key: other.public_key().unwrap(),
                nonce,
            },
        )
        .unwrap();
    let opts = SignerOpts::IdemixCredential {
        attributes: attributes(1),
        nonces: s.nonces.clone(),
    };

    assert!(s.csp.sign(&s.issuer, &forged, &opts).is_err());
    assert!(s.nonces.is_pending(s.issuer.ski(), &nonce));

    // The holder's genuine request still goes through.
    s.csp.sign(&s.issuer, &s.request(nonce), &opts).unwrap();
    assert!(!s.nonces.is_pending(s.issuer.ski(), &nonce));
}

#[test]
fn concurrent_issuance_accepts_one_request() {
    let s = setup();
    let nonce = s.nonces.mint(s.issuer.ski());
    let request = s.request(nonce);
    let opts = SignerOpts::IdemixCredential {
        attributes: attributes(1),
        nonces: s.nonces.clone(),
    };

    let issued = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| s.csp.sign(&s.issuer, &request, &opts)))
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .filter(|result| match result {
                Ok(_) => true,
                Err(Error::ProtocolViolation(ProtocolViolation::NonceMismatch)) => false,
                Err(err) => panic!("unexpected issuance error: {err}"),
            })
            .count()
    });
    assert_eq!(issued, 1);
}

#[test]
fn request_verification_checks_nonce() {
    let s = setup();
    let nonce = s.nonces.mint(s.issuer.ski());
    let request = s.request(nonce);

    let opts = SignerOpts::IdemixCredentialRequest {
        issuer_public_key: s.ipk.clone(),
        nonce,
    };
    assert!(s.csp.verify(&s.ipk, &request, &[], &opts).unwrap());

    let opts = SignerOpts::IdemixCredentialRequest {
        issuer_public_key: s.ipk.clone(),
        nonce: Nonce::random(&mut rand::thread_rng()),
    };
    let Err(Error::ProtocolViolation(ProtocolViolation::NonceMismatch)) =
        s.csp.verify(&s.ipk, &request, &[], &opts)
    else {
        panic!("request verified under another nonce");
    };
}

#[test]
fn revocation_handle_stays_hidden() {
    let s = setup();
    let credential = s.issue(42);
    let nym = s.nym();
    let opts = s.presentation(&nym, &credential, s.cri(1, &[42]), 1);
    let signature = s
        .csp
        .sign(&s.user, b"msg", &SignerOpts::IdemixSignature(Box::new(opts.clone())))
        .unwrap();

    let mut disclosed = opts;
    disclosed.disclosure[RH_INDEX] = Attribute::Int(42);
    let Err(Error::ProtocolViolation(ProtocolViolation::HandleDisclosed)) = s.csp.sign(
        &s.user,
        b"msg",
        &SignerOpts::IdemixSignature(Box::new(disclosed.clone())),
    ) else {
        panic!("revocation handle was disclosed");
    };

    disclosed.nym = nym.public_key().unwrap();
    disclosed.credential.clear();
    let Err(Error::ProtocolViolation(ProtocolViolation::HandleDisclosed)) = s.csp.verify(
        &s.issuer,
        &signature,
        b"msg",
        &SignerOpts::IdemixSignature(Box::new(disclosed)),
    ) else {
        panic!("verified with the revocation handle disclosed");
    };
}

#[test]
fn signatures_of_one_credential_are_unlinkable() {
    let s = setup();
    let credential = s.issue(42);
    let nym = s.nym();
    let opts = SignerOpts::IdemixSignature(Box::new(s.presentation(
        &nym,
        &credential,
        s.cri(1, &[7, 42, 99]),
        1,
    )));
    let first = s.csp.sign(&s.user, b"msg", &opts).unwrap();
    let second = s.csp.sign(&s.user, b"msg", &opts).unwrap();
    assert_ne!(first, second);

    let shared = first
        .chunks(32)
        .filter(|chunk| chunk.len() == 32 && second.windows(32).any(|w| w == *chunk))
        .count();
    assert_eq!(shared, 0);
}

#[test]
fn revoked_handle_and_stale_epoch() {
    let s = setup();
    let credential = s.issue(42);
    let nym = s.nym();

    let opts = s.presentation(&nym, &credential, s.cri(2, &[7, 8]), 2);
    let Err(Error::ProtocolViolation(ProtocolViolation::HandleRevokedOrEpochStale)) =
        s.csp
            .sign(&s.user, b"msg", &SignerOpts::IdemixSignature(Box::new(opts)))
    else {
        panic!("signed with a revoked handle");
    };

    let opts = s.presentation(&nym, &credential, s.cri(2, &[42]), 3);
    let Err(Error::ProtocolViolation(ProtocolViolation::HandleRevokedOrEpochStale)) =
        s.csp
            .sign(&s.user, b"msg", &SignerOpts::IdemixSignature(Box::new(opts)))
    else {
        panic!("signed against information for another epoch");
    };

    let cri = s.cri(4, &[42]);
    let rpk = s.revocation.public_key().unwrap();
    let check = |epoch| SignerOpts::IdemixCri {
        epoch,
        unrevoked_handles: Vec::new(),
    };
    assert!(s.csp.verify(&rpk, &cri, &[], &check(4)).unwrap());
    let Err(Error::ProtocolViolation(ProtocolViolation::HandleRevokedOrEpochStale)) =
        s.csp.verify(&rpk, &cri, &[], &check(5))
    else {
        panic!("revocation information accepted for another epoch");
    };
}

#[test]
fn pseudonym_signatures() {
    let s = setup();
    let nym = s.nym();
    let opts = SignerOpts::IdemixNym {
        issuer_public_key: s.ipk.clone(),
    };
    let signature = s.csp.sign(&nym, b"hello", &opts).unwrap();

    // Import the pseudonym as a verifier would receive it.
    let imported = s
        .csp
        .key_import(
            &nym.public_key().unwrap().bytes().unwrap(),
            &KeyImportOpts::IdemixNymPublicKey { temporary: true },
        )
        .unwrap();
    assert_eq!(imported.ski(), nym.ski());
    assert!(s.csp.verify(&imported, &signature, b"hello", &opts).unwrap());
    assert!(!s.csp.verify(&imported, &signature, b"bye", &opts).unwrap());

    let other = s.nym();
    assert_ne!(other.ski(), nym.ski());
    assert!(!s.csp.verify(&other, &signature, b"hello", &opts).unwrap());
}

#[test]
fn issuer_public_key_import() {
    let s = setup();
    let imported = s
        .csp
        .key_import(
            &s.ipk.bytes().unwrap(),
            &KeyImportOpts::IdemixIssuerPublicKey {
                temporary: true,
                attribute_names: SCHEMA.iter().map(|s| s.to_string()).collect(),
            },
        )
        .unwrap();
    assert_eq!(imported.ski(), s.ipk.ski());
    assert!(!imported.private());

    // Only the issuer key pair was persisted.
    assert_eq!(s.csp.get_key(s.issuer.ski()).unwrap().ski(), s.issuer.ski());
}
