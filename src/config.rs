//! Provider configuration and the factory that assembles a [Csp] from it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    idemix,
    keystore::KeyStore,
    opts::HashOpts,
    pkcs11::{self, Pkcs11Opts, SessionFactory, SessionPool},
    provider::{Csp, CspBuilder},
    sw,
};

/// Settings of the software provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwOpts {
    pub security: usize,
    pub hash: String,
}

impl Default for SwOpts {
    fn default() -> Self {
        Self {
            security: 256,
            hash: "SHA2".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryOpts {
    /// Provider to build, "SW" or "PKCS11".
    pub default: String,
    #[serde(rename = "SW")]
    pub sw: SwOpts,
    #[serde(rename = "PKCS11")]
    pub pkcs11: Option<Pkcs11Opts>,
}

impl Default for FactoryOpts {
    fn default() -> Self {
        Self {
            default: "SW".into(),
            sw: SwOpts::default(),
            pkcs11: None,
        }
    }
}

impl FactoryOpts {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Build a provider.
    ///
    /// The software and credential handlers are always registered. For "PKCS11", the token
    /// handlers replace the software ECDSA handlers and `token` must supply the driver.
    pub fn build(
        &self,
        keystore: Arc<dyn KeyStore>,
        token: Option<Arc<dyn SessionFactory>>,
    ) -> Result<Csp> {
        match self.default.as_str() {
            "SW" => {
                let hash = HashOpts::for_family(&self.sw.hash, self.sw.security)?;
                let builder = CspBuilder::new(keystore).default_hash(hash);
                tracing::info!(security = self.sw.security, hash = %self.sw.hash, "building software provider");
                Ok(idemix::register(sw::register(builder)).build())
            }
            "PKCS11" => {
                let opts = self
                    .pkcs11
                    .clone()
                    .ok_or_else(|| Error::Config("missing PKCS11 options".into()))?;
                let token = token
                    .ok_or_else(|| Error::Config("no token driver for PKCS11 provider".into()))?;
                let hash = HashOpts::for_family(&opts.hash, opts.security)?;
                tracing::info!(library = %opts.library, label = %opts.label, "building token provider");
                let pool = Arc::new(SessionPool::new(token, opts));
                let builder = CspBuilder::new(keystore).default_hash(hash);
                Ok(pkcs11::register(idemix::register(sw::register(builder)), pool).build())
            }
            other => Err(Error::Config(format!("unknown provider [{other}]"))),
        }
    }
}
