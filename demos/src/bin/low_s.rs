use std::sync::Arc;

use anyhow::{ensure, Result};
use bccsp::{
    ecdsa::{curve_order, is_low_s, marshal_signature, to_low_s, unmarshal_signature},
    Bccsp, FactoryOpts, HashOpts, InMemoryKeyStore, Key, KeyGenOpts, SignerOpts,
};
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;

const CURVE: &str = "secp256k1";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let csp = FactoryOpts::default().build(Arc::new(InMemoryKeyStore::new()), None)?;
    let key = csp.key_gen(&KeyGenOpts::Ecdsa { temporary: true })?;
    let public = key.public_key()?;

    let digest = csp.hash(b"block 42", &HashOpts::Sha)?;
    ensure!(digest == Sha256::digest(b"block 42").to_vec());
    let signature = csp.sign(&key, &digest, &SignerOpts::Ecdsa)?;

    let (r, s) = unmarshal_signature(&signature)?;
    ensure!(is_low_s(CURVE, &s)?, "provider emitted a high-S signature");

    // The same signature with S mirrored around the curve order.
    let high = marshal_signature(&r, &(curve_order(CURVE)? - &s))?;
    ensure!(!csp.verify(&public, &high, &digest, &SignerOpts::Ecdsa)?);
    tracing::info!("high-S form rejected");

    let (_, high_s) = unmarshal_signature(&high)?;
    let canonical = marshal_signature(&r, &to_low_s(CURVE, &high_s)?)?;
    ensure!(canonical == signature);
    ensure!(csp.verify(&public, &canonical, &digest, &SignerOpts::Ecdsa)?);
    tracing::info!("canonical form verified");

    Ok(())
}
