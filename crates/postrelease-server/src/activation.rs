//! The binary enabled/disabled state the provider toggles during signup.

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{PrxError, PrxResult};
use crate::permalink::PermalinkCache;
use crate::provider::{Notification, ProviderNotifier};
use crate::settings::{SiteSettings, SPONSORED_POST_TYPE};
use crate::store::Store;
use crate::template::TemplateManager;

/// Published on the lifecycle channel when the host manages its own routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Activated,
    Deactivated,
}

/// Accepts exactly `0` or `1` (surrounding whitespace ignored).
pub fn parse_enable_flag(raw: Option<&str>) -> PrxResult<bool> {
    match raw.map(str::trim) {
        Some("1") => Ok(true),
        Some("0") => Ok(false),
        Some(other) => Err(PrxError::InvalidInput(format!("status must be 0 or 1, got {other:?}"))),
        None => Err(PrxError::InvalidInput("status is required".into())),
    }
}

pub struct Activation<'a> {
    pub(crate) store: &'a Store,
    pub(crate) settings: &'a SiteSettings,
    pub(crate) notifier: &'a ProviderNotifier,
    pub(crate) permalinks: &'a PermalinkCache,
    pub(crate) events: &'a broadcast::Sender<LifecycleEvent>,
}

impl Activation<'_> {
    /// Move to `enable`.
    ///
    /// * off → on runs the activation hook and notifies the provider.
    /// * on → off deletes every sponsored resource, removes all
    ///   configuration keys and notifies the provider.
    /// * otherwise the flag is rewritten as-is.
    ///
    /// Enabling always leaves a valid template resource behind.
    pub async fn set(&self, enable: bool) -> PrxResult<()> {
        let was = self.store.load_configuration()?.activated;

        match (was, enable) {
            (false, true) => {
                self.activate_hook();
                self.store.set_activated(true)?;
                TemplateManager::new(self.store, self.settings).ensure_valid()?;
                info!("audit: plugin.enable");
                self.notifier.notify(Notification::Activated).await;
            }
            (true, false) => {
                let removed = self.teardown()?;
                info!(removed, "audit: plugin.disable");
                self.notifier.notify(Notification::Deactivated).await;
            }
            (_, true) => {
                self.store.set_activated(true)?;
                TemplateManager::new(self.store, self.settings).ensure_valid()?;
            }
            (_, false) => self.store.set_activated(false)?,
        }
        Ok(())
    }

    /// Full reset: sponsored resources deleted, configuration removed, local
    /// routing flushed. Returns the number of resources deleted.
    pub fn teardown(&self) -> PrxResult<usize> {
        let removed = self.store.delete_posts_of_type(SPONSORED_POST_TYPE)?;
        self.store.clear_configuration()?;
        self.permalinks.flush();
        self.publish(LifecycleEvent::Deactivated);
        Ok(removed)
    }

    fn activate_hook(&self) {
        if self.settings.managed_host {
            self.publish(LifecycleEvent::Activated);
        } else {
            debug!(cached = self.permalinks.len(), "flushing permalink cache");
            self.permalinks.flush();
        }
    }

    fn publish(&self, event: LifecycleEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
