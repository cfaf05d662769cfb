use std::sync::Arc;

use anyhow::{ensure, Result};
use bccsp::{
    idemix::{Attribute, NonceLedger},
    Bccsp, FactoryOpts, InMemoryKeyStore, Key, KeyDerivOpts, KeyGenOpts, PresentationOpts,
    SignerOpts,
};
use tracing_subscriber::EnvFilter;

const SCHEMA: [&str; 3] = ["OU", "Role", "RevocationHandle"];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let csp = FactoryOpts::default().build(Arc::new(InMemoryKeyStore::new()), None)?;

    // Issuer and revocation authority set up their keys.
    let issuer = csp.key_gen(&KeyGenOpts::IdemixIssuer {
        temporary: false,
        attribute_names: SCHEMA.iter().map(|name| name.to_string()).collect(),
    })?;
    let ipk = issuer.public_key()?;
    let revocation = csp.key_gen(&KeyGenOpts::IdemixRevocation { temporary: false })?;
    let nonces = Arc::new(NonceLedger::new());

    // The user requests a credential against a fresh nonce.
    let user = csp.key_gen(&KeyGenOpts::IdemixUserSecret { temporary: true })?;
    let nonce = nonces.mint(issuer.ski());
    let request = csp.sign(
        &user,
        &[],
        &SignerOpts::IdemixCredentialRequest {
            issuer_public_key: ipk.clone(),
            nonce,
        },
    )?;
    let credential = csp.sign(
        &issuer,
        &request,
        &SignerOpts::IdemixCredential {
            attributes: vec!["org1".into(), "client".into(), Attribute::Int(1001)],
            nonces: nonces.clone(),
        },
    )?;
    ensure!(
        csp.verify(
            &user,
            &credential,
            &[],
            &SignerOpts::IdemixCredentialCheck {
                issuer_public_key: ipk.clone(),
            },
        )?,
        "issued credential does not check out"
    );
    tracing::info!(len = credential.len(), "credential issued");

    // Revocation information for epoch 1 lists the handle as unrevoked.
    let epoch = 1;
    let cri = csp.sign(
        &revocation,
        &[],
        &SignerOpts::IdemixCri {
            epoch,
            unrevoked_handles: vec![Attribute::Int(1001), Attribute::Int(1002)],
        },
    )?;

    // Sign a message under a fresh pseudonym, disclosing only the organizational unit.
    let nym = csp.key_deriv(
        &user,
        &KeyDerivOpts::IdemixNym {
            temporary: true,
            issuer_public_key: ipk.clone(),
        },
    )?;
    let mut presentation = PresentationOpts {
        nym: nym.clone(),
        issuer_public_key: ipk,
        credential,
        disclosure: vec!["org1".into(), Attribute::Hidden, Attribute::Hidden],
        rh_index: 2,
        cri,
        epoch,
        revocation_public_key: revocation.public_key()?,
    };
    let msg = b"invoke chaincode";
    let signature = csp.sign(
        &user,
        msg,
        &SignerOpts::IdemixSignature(Box::new(presentation.clone())),
    )?;
    tracing::info!(len = signature.len(), nym = %nym.ski(), "message signed");

    presentation.nym = nym.public_key()?;
    presentation.credential.clear();
    let valid = csp.verify(
        &issuer,
        &signature,
        msg,
        &SignerOpts::IdemixSignature(Box::new(presentation)),
    )?;
    ensure!(valid, "presentation did not verify");
    tracing::info!("presentation verified");

    Ok(())
}
