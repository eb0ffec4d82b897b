//! Site and provider settings resolved once at startup.

use anyhow::{Context, Result};
use url::Url;

pub const DEFAULT_PROVIDER_URL: &str = "https://www.postrelease.com/";
pub const DEFAULT_JS_URL: &str = "https://a.postrelease.com/serve/load.js?async=true";

/// Content type holding the template resource and every sponsored item.
pub const SPONSORED_POST_TYPE: &str = "pr_sponsored_post";
/// Content type of regular site articles, as offered to the indexing feed.
pub const ARTICLE_POST_TYPE: &str = "post";

/// Version string reported to the provider in `status`/`check`. The
/// provider keys the hosted edition on the `.vip` suffix.
pub const PLUGIN_VERSION: &str = "1.3.vip";
/// Current layout version of the option table.
pub const DB_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct SiteSettings {
    /// Public address of this site, reported to the provider.
    pub site_url: Url,
    /// Base for permalinks and the rewritten author link.
    pub home_url: Url,
    pub blog_name: String,
    /// Version of the hosting platform, passed through opaquely.
    pub host_version: String,
    /// Provider base URL, always ending in `/`.
    pub provider_url: Url,
    pub js_url: String,
    /// Skip local key validation (IP authentication still applies).
    pub dev_mode: bool,
    /// The host manages its own routing; publish an event on activation
    /// instead of flushing the permalink cache.
    pub managed_host: bool,
    /// Actor that owns template resources created by provider calls.
    pub author_id: u64,
}

impl SiteSettings {
    pub fn new(site_url: &str, provider_url: &str) -> Result<Self> {
        let site_url = Url::parse(site_url).context("invalid site url")?;
        Ok(Self {
            home_url: site_url.clone(),
            site_url,
            blog_name: String::new(),
            host_version: String::new(),
            provider_url: with_trailing_slash(provider_url)?,
            js_url: DEFAULT_JS_URL.into(),
            dev_mode: false,
            managed_host: false,
            author_id: 1,
        })
    }

    pub fn from_env() -> Result<Self> {
        let site = env_or("PRX_SITE_URL", "http://localhost:8080/");
        let provider = env_or("PRX_SERVER", DEFAULT_PROVIDER_URL);
        let mut settings = Self::new(&site, &provider)?;

        if let Ok(home) = std::env::var("PRX_HOME_URL") {
            settings.home_url = Url::parse(&home).context("invalid PRX_HOME_URL")?;
        }
        settings.blog_name = env_or("PRX_BLOG_NAME", "");
        settings.host_version = env_or("PRX_HOST_VERSION", "");
        settings.js_url = env_or("PRX_JS_URL", DEFAULT_JS_URL);
        settings.dev_mode = env_flag("PRX_DEV");
        settings.managed_host = env_flag("PRX_MANAGED_HOST");
        if let Ok(author) = std::env::var("PRX_AUTHOR_ID") {
            settings.author_id = author.trim().parse().context("invalid PRX_AUTHOR_ID")?;
        }
        Ok(settings)
    }

    /// Blog name, or the site URL when no name is configured.
    pub fn publication_title(&self) -> String {
        if self.blog_name.trim().is_empty() {
            self.site_url.to_string()
        } else {
            self.blog_name.clone()
        }
    }

    /// Resolve a provider API path such as `plugins/Api/AuthenticateIP`.
    pub fn provider_endpoint(&self, path: &str) -> Result<Url> {
        self.provider_url
            .join(path)
            .with_context(|| format!("join provider url with {path}"))
    }

    /// URL of the remote publication dashboard the admin screen embeds.
    pub fn dashboard_url(&self) -> Result<Url> {
        let mut url = self.provider_endpoint("wpplugin/Index/")?;
        url.query_pairs_mut()
            .append_pair("PublicationUrl", self.home_url.as_str())
            .append_pair("vip", "1");
        Ok(url)
    }
}

fn with_trailing_slash(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).context("invalid provider url")?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
