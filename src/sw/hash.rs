//! SHA2 and SHA3 hashing.

use digest::DynDigest;
use sha2::{Sha256, Sha384};
use sha3::{Sha3_256, Sha3_384};

use crate::{
    error::{Error, Result},
    opts::HashOpts,
    provider::Hasher,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ShaHasher;

impl Hasher for ShaHasher {
    fn get_hash(&self, opts: &HashOpts) -> Result<Box<dyn DynDigest + Send>> {
        match opts {
            HashOpts::Sha256 => Ok(Box::new(Sha256::default())),
            HashOpts::Sha384 => Ok(Box::new(Sha384::default())),
            HashOpts::Sha3_256 => Ok(Box::new(Sha3_256::default())),
            HashOpts::Sha3_384 => Ok(Box::new(Sha3_384::default())),
            HashOpts::Sha => Err(Error::InvalidOptions(
                "the default hash must be resolved by the provider",
            )),
        }
    }
}

#[cfg(test)]
mod test {
    use super::ShaHasher;
    use crate::{opts::HashOpts, provider::Hasher};

    #[test]
    fn digests() {
        let cases = [
            (
                HashOpts::Sha256,
                "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
            ),
            (
                HashOpts::Sha3_256,
                "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532",
            ),
        ];
        for (opts, expected) in cases {
            assert_eq!(hex::encode(ShaHasher.hash(b"abc", &opts).unwrap()), expected);
        }
        assert_eq!(ShaHasher.hash(b"abc", &HashOpts::Sha384).unwrap().len(), 48);
        assert_eq!(ShaHasher.hash(b"abc", &HashOpts::Sha3_384).unwrap().len(), 48);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut hasher = ShaHasher.get_hash(&HashOpts::Sha3_256).unwrap();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(
            hasher.finalize().to_vec(),
            ShaHasher.hash(b"hello world", &HashOpts::Sha3_256).unwrap()
        );
    }
}
