//! The one shared secret exchanged with the provider during signup.

use std::future::Future;

use constant_time_eq::constant_time_eq;
use md5::{Digest, Md5};
use rand::{distributions::Alphanumeric, Rng};
use tracing::{info, warn};

use crate::error::{PrxError, PrxResult};
use crate::store::{OptionKey, Store};

/// Length of generated secrets.
pub const SECRET_LEN: usize = 16;

/// Random source for shared secrets.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> String;
}

/// Alphanumeric tokens from the thread-local CSPRNG.
#[derive(Debug, Clone, Copy)]
pub struct RandomTokens {
    pub len: usize,
}

impl Default for RandomTokens {
    fn default() -> Self {
        Self { len: SECRET_LEN }
    }
}

impl TokenSource for RandomTokens {
    fn token(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.len)
            .map(char::from)
            .collect()
    }
}

/// MD5 of the secret as lowercase hex; the provider sends this as `id`.
pub fn digest(secret: &str) -> String {
    hex::encode(Md5::digest(secret.as_bytes()))
}

pub struct SharedSecret<'a> {
    store: &'a Store,
    tokens: &'a dyn TokenSource,
}

impl<'a> SharedSecret<'a> {
    pub fn new(store: &'a Store, tokens: &'a dyn TokenSource) -> Self {
        Self { store, tokens }
    }

    /// Create and persist the secret. Refuses when one already exists, before
    /// `ip_check` is ever polled, so a replayed signup cannot rotate the key.
    pub async fn generate<F>(&self, ip_check: F) -> PrxResult<String>
    where
        F: Future<Output = bool>,
    {
        if self.store.has_option(OptionKey::PluginKey)? {
            warn!("audit: key.generate.exists");
            return Err(PrxError::AlreadyExists);
        }
        if !ip_check.await {
            warn!("audit: key.generate.ip_denied");
            return Err(PrxError::AuthDenied);
        }

        let secret = self.tokens.token();
        self.store.set_shared_secret(&secret)?;
        info!("audit: key.generate");
        Ok(secret)
    }

    /// True iff a secret is stored and `candidate` equals its MD5 digest.
    pub fn validate(&self, candidate: &str) -> PrxResult<bool> {
        let Some(secret) = self.store.load_configuration()?.shared_secret else {
            return Ok(false);
        };
        Ok(constant_time_eq(digest(&secret).as_bytes(), candidate.as_bytes()))
    }
}
