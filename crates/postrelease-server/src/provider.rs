//! Outbound calls to the provider: the shared HTTP client and the
//! activation/deactivation notifications.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use url::Url;

use crate::settings::SiteSettings;

/// Every provider call gives up after this long.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(2);
/// User agent the provider recognises plugin traffic by.
pub const USER_AGENT: &str = "Wordpress_plugin";

/// Client for provider calls: short timeout, certificate verification on.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .context("build provider http client")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Activated,
    Deactivated,
}

impl Notification {
    fn path(self) -> &'static str {
        match self {
            Notification::Activated => "plugins/Api/PluginActivated",
            Notification::Deactivated => "plugins/Api/PluginDeactivated",
        }
    }
}

/// Tells the provider when this site switches ad serving on or off.
#[derive(Clone)]
pub struct ProviderNotifier {
    client: reqwest::Client,
    activated: Url,
    deactivated: Url,
}

impl ProviderNotifier {
    /// Both notification URLs are resolved here, already carrying `?url={site}`.
    pub fn new(client: reqwest::Client, settings: &SiteSettings) -> Result<Self> {
        let endpoint = |notification: Notification| -> Result<Url> {
            let mut url = settings.provider_endpoint(notification.path())?;
            url.query_pairs_mut().append_pair("url", settings.site_url.as_str());
            Ok(url)
        };
        Ok(Self {
            client,
            activated: endpoint(Notification::Activated)?,
            deactivated: endpoint(Notification::Deactivated)?,
        })
    }

    /// POST `{server}/plugins/Api/Plugin{Activated,Deactivated}?url={site}`.
    /// Returns whether the provider answered with a success status; network
    /// failures and timeouts are logged and reported as `false`.
    pub async fn notify(&self, notification: Notification) -> bool {
        let url = match notification {
            Notification::Activated => &self.activated,
            Notification::Deactivated => &self.deactivated,
        };

        match self.client.post(url.clone()).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(%url, status = %resp.status(), ?notification, "provider notified");
                true
            }
            Ok(resp) => {
                warn!(%url, status = %resp.status(), ?notification, "provider rejected notification");
                false
            }
            Err(e) => {
                warn!(%url, error = %e, ?notification, "provider notification failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(server: &MockServer) -> ProviderNotifier {
        let settings = SiteSettings::new("https://blog.example.com/", &server.uri()).unwrap();
        ProviderNotifier::new(http_client().unwrap(), &settings).unwrap()
    }

    #[tokio::test]
    async fn activation_posts_site_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/plugins/Api/PluginActivated"))
            .and(query_param("url", "https://blog.example.com/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert!(notifier(&server).notify(Notification::Activated).await);
    }

    #[tokio::test]
    async fn provider_base_path_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/partner/plugins/Api/PluginDeactivated"))
            .and(query_param("url", "https://blog.example.com/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let provider = format!("{}/partner", server.uri());
        let settings = SiteSettings::new("https://blog.example.com/", &provider).unwrap();
        let notifier = ProviderNotifier::new(http_client().unwrap(), &settings).unwrap();
        assert!(notifier.notify(Notification::Deactivated).await);
    }

    #[tokio::test]
    async fn server_error_reports_false() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/plugins/Api/PluginDeactivated"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(!notifier(&server).notify(Notification::Deactivated).await);
    }

    #[tokio::test]
    async fn slow_provider_times_out_as_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        assert!(!notifier(&server).notify(Notification::Activated).await);
    }
}
