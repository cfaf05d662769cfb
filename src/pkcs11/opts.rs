use core::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Configuration for a PKCS#11 token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pkcs11Opts {
    /// Security level in bits. Selects the curve for [crate::opts::KeyGenOpts::Ecdsa].
    pub security: usize,
    /// Hash family, "SHA2" or "SHA3".
    pub hash: String,
    /// Path to the token driver library.
    pub library: String,
    pub label: String,
    pub pin: String,
    /// Verify signatures in software instead of on the token.
    #[serde(rename = "softwareverify")]
    pub software_verify: bool,
    /// Mark generated keys as non-modifiable on the token.
    pub immutable: bool,
    /// Number of idle sessions kept open.
    pub session_cache_size: usize,
    /// Retries after the first failed attempt to open a session.
    pub create_session_retries: u32,
    #[serde(with = "millis")]
    pub create_session_retry_delay: Duration,
}

impl Default for Pkcs11Opts {
    fn default() -> Self {
        Self {
            security: 256,
            hash: "SHA2".into(),
            library: String::new(),
            label: String::new(),
            pin: String::new(),
            software_verify: false,
            immutable: false,
            session_cache_size: 10,
            create_session_retries: 10,
            create_session_retry_delay: Duration::from_millis(100),
        }
    }
}

impl fmt::Debug for Pkcs11Opts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pkcs11Opts")
            .field("security", &self.security)
            .field("hash", &self.hash)
            .field("library", &self.library)
            .field("label", &self.label)
            .field("pin", &"<redacted>")
            .field("software_verify", &self.software_verify)
            .field("immutable", &self.immutable)
            .field("session_cache_size", &self.session_cache_size)
            .field("create_session_retries", &self.create_session_retries)
            .field("create_session_retry_delay", &self.create_session_retry_delay)
            .finish()
    }
}

/// Durations as whole milliseconds.
mod millis {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
