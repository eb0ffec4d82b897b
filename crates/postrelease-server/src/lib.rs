pub mod activation;
pub mod auth;
pub mod clock;
pub mod control;
pub mod dirs;
pub mod error;
pub mod feed;
pub mod gate;
pub mod handlers;
pub mod ip_auth;
pub mod metadata;
pub mod permalink;
pub mod provider;
pub mod redirect;
pub mod secret;
pub mod server;
pub mod settings;
pub mod store;
pub mod template;

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::activation::{Activation, LifecycleEvent};
use crate::clock::{Clock, SystemClock};
use crate::gate::SecurityGate;
use crate::ip_auth::IpAuthenticator;
use crate::metadata::MetadataRewriter;
use crate::permalink::PermalinkCache;
use crate::provider::ProviderNotifier;
use crate::redirect::AdRedirect;
use crate::secret::{RandomTokens, SharedSecret, TokenSource};
use crate::settings::SiteSettings;
use crate::template::TemplateManager;

/// Shared application state threaded through axum handlers. Holds every
/// collaborator explicitly; components are borrowed views over it.
#[derive(Clone)]
pub struct AppState {
    pub store: store::Store,
    pub settings: Arc<SiteSettings>,
    /// Optional bearer token protecting the host-side admin routes.
    pub api_key: Option<String>,
    pub authenticator: IpAuthenticator,
    pub notifier: ProviderNotifier,
    pub clock: Arc<dyn Clock>,
    pub tokens: Arc<dyn TokenSource>,
    pub permalinks: PermalinkCache,
    pub events: broadcast::Sender<LifecycleEvent>,
}

impl AppState {
    pub fn new(store: store::Store, settings: SiteSettings, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = provider::http_client()?;
        let (events, _) = broadcast::channel(16);
        Ok(Self {
            authenticator: IpAuthenticator::new(client.clone(), &settings)?,
            notifier: ProviderNotifier::new(client, &settings)?,
            store,
            settings: Arc::new(settings),
            api_key,
            clock: Arc::new(SystemClock),
            tokens: Arc::new(RandomTokens::default()),
            permalinks: PermalinkCache::default(),
            events,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tokens(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    pub fn secrets(&self) -> SharedSecret<'_> {
        SharedSecret::new(&self.store, self.tokens.as_ref())
    }

    pub fn gate(&self) -> SecurityGate<'_> {
        SecurityGate::new(self.secrets(), &self.authenticator, self.settings.dev_mode)
    }

    pub fn templates(&self) -> TemplateManager<'_> {
        TemplateManager::new(&self.store, &self.settings)
    }

    pub fn activation(&self) -> Activation<'_> {
        Activation {
            store: &self.store,
            settings: &self.settings,
            notifier: &self.notifier,
            permalinks: &self.permalinks,
            events: &self.events,
        }
    }

    pub fn ad_redirect(&self) -> AdRedirect<'_> {
        AdRedirect {
            store: &self.store,
            settings: &self.settings,
            permalinks: &self.permalinks,
        }
    }

    /// Rewriter bound to the template id configured right now.
    pub fn rewriter(&self) -> anyhow::Result<MetadataRewriter<'_>> {
        let template_id = self.store.load_configuration()?.template_resource_id;
        Ok(MetadataRewriter {
            template_id,
            home_url: &self.settings.home_url,
            clock: self.clock.as_ref(),
        })
    }
}

pub use server::{app, resolve_data_dir, run, ServerConfig};
