//! Admission decision for provider control calls: shared-secret digest
//! plus provider IP confirmation.

use tracing::{debug, warn};

use crate::error::PrxResult;
use crate::ip_auth::IpAuthenticator;
use crate::secret::SharedSecret;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityDecision {
    pub authorized: bool,
}

pub struct SecurityGate<'a> {
    secrets: SharedSecret<'a>,
    authenticator: &'a IpAuthenticator,
    dev_mode: bool,
}

impl<'a> SecurityGate<'a> {
    pub fn new(secrets: SharedSecret<'a>, authenticator: &'a IpAuthenticator, dev_mode: bool) -> Self {
        Self {
            secrets,
            authenticator,
            dev_mode,
        }
    }

    /// `(dev_mode OR key valid) AND ip authenticated`. The IP callout is
    /// skipped when the key already failed.
    pub async fn authorize(&self, caller_key: Option<&str>, caller_ip: &str) -> PrxResult<SecurityDecision> {
        let key_ok = if self.dev_mode {
            debug!("dev mode: skipping key validation");
            true
        } else {
            match caller_key {
                Some(k) => self.secrets.validate(k)?,
                None => false,
            }
        };
        if !key_ok {
            warn!(caller_ip, "audit: gate.denied.key");
            return Ok(SecurityDecision { authorized: false });
        }

        let ip_ok = self.authenticator.authenticate(caller_ip).await;
        if !ip_ok {
            warn!(caller_ip, "audit: gate.denied.ip");
        }
        Ok(SecurityDecision { authorized: ip_ok })
    }
}
