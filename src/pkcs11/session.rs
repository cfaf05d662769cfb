use std::{sync::Arc, thread};

use parking_lot::Mutex;

use super::Pkcs11Opts;
use crate::{
    error::{Error, Result},
    key::Ski,
};

/// A failure reported by the token driver.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct SessionFault(pub String);

/// An open session on a token.
pub trait Pkcs11Session: Send {
    /// Generate a key pair on the token and return the uncompressed SEC1 encoding of its public
    /// point. Ephemeral keys are session objects and are not kept on the token.
    fn generate_ecdsa(&mut self, curve: &str, ephemeral: bool) -> Result<Vec<u8>, SessionFault>;

    /// Sign a digest with the private key identified by `ski`, returning big-endian `(r, s)`.
    fn sign_ecdsa(&mut self, ski: &Ski, digest: &[u8])
        -> Result<(Vec<u8>, Vec<u8>), SessionFault>;

    fn verify_ecdsa(
        &mut self,
        ski: &Ski,
        digest: &[u8],
        r: &[u8],
        s: &[u8],
    ) -> Result<bool, SessionFault>;
}

/// Opens sessions on the token described by the options.
pub trait SessionFactory: Send + Sync {
    fn open_session(&self, opts: &Pkcs11Opts) -> Result<Box<dyn Pkcs11Session>, SessionFault>;
}

/// A cache of idle sessions.
///
/// Opening a session is retried with a fixed delay. Operations on an established session are
/// not retried: a fault is returned to the caller and the session is discarded.
pub struct SessionPool {
    factory: Arc<dyn SessionFactory>,
    opts: Pkcs11Opts,
    idle: Mutex<Vec<Box<dyn Pkcs11Session>>>,
}

impl SessionPool {
    pub fn new(factory: Arc<dyn SessionFactory>, opts: Pkcs11Opts) -> Self {
        Self {
            factory,
            opts,
            idle: Mutex::new(Vec::new()),
        }
    }

    pub fn opts(&self) -> &Pkcs11Opts {
        &self.opts
    }

    /// Number of sessions waiting in the cache.
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Run an operation on a cached session, or on a new one if the cache is empty.
    pub fn with_session<T>(
        &self,
        op: impl FnOnce(&mut dyn Pkcs11Session) -> Result<T, SessionFault>,
    ) -> Result<T> {
        let cached = self.idle.lock().pop();
        let mut session = match cached {
            Some(session) => session,
            None => self.open()?,
        };
        match op(session.as_mut()) {
            Ok(value) => {
                self.release(session);
                Ok(value)
            }
            Err(fault) => {
                tracing::warn!(%fault, "token operation failed, discarding session");
                Err(Error::Hsm(fault.0))
            }
        }
    }

    fn release(&self, session: Box<dyn Pkcs11Session>) {
        let mut idle = self.idle.lock();
        if idle.len() < self.opts.session_cache_size {
            idle.push(session);
        }
    }

    fn open(&self) -> Result<Box<dyn Pkcs11Session>> {
        let attempts = self.opts.create_session_retries.saturating_add(1);
        let mut last = SessionFault(String::new());
        for attempt in 1..=attempts {
            match self.factory.open_session(&self.opts) {
                Ok(session) => {
                    tracing::debug!(attempt, label = %self.opts.label, "opened token session");
                    return Ok(session);
                }
                Err(fault) => {
                    tracing::warn!(attempt, attempts, %fault, "failed opening token session");
                    last = fault;
                }
            }
            if attempt < attempts {
                thread::sleep(self.opts.create_session_retry_delay);
            }
        }
        Err(Error::HsmSession {
            attempts,
            reason: last.0,
        })
    }
}
