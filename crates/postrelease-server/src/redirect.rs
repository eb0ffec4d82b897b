//! Sends "full ad page" views to the template resource.

use tracing::{debug, info, warn};
use url::{form_urlencoded, Url};

use crate::error::PrxResult;
use crate::permalink::{permalink, PermalinkCache};
use crate::settings::SiteSettings;
use crate::store::Store;

pub const MARKER_PARAM: &str = "prx";
/// Marker on the provider's ad link.
pub const AD_MARKER: &str = "ad";
/// Marker written back after redirecting, so the landing view does not loop.
pub const PAGE_MARKER: &str = "page";

/// `template_url` with every pair of `raw_query` merged in (existing keys are
/// replaced in place, new keys appended) and the marker forced to `page`.
pub fn redirect_target(template_url: &Url, raw_query: &str) -> Url {
    let mut pairs: Vec<(String, String)> = template_url.query_pairs().into_owned().collect();
    let incoming = form_urlencoded::parse(raw_query.as_bytes()).into_owned();
    let marker = std::iter::once((MARKER_PARAM.to_owned(), PAGE_MARKER.to_owned()));

    for (key, value) in incoming.chain(marker) {
        match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => pairs.push((key, value)),
        }
    }

    let mut url = template_url.clone();
    url.set_query(None);
    url.query_pairs_mut()
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    url
}

pub struct AdRedirect<'a> {
    pub(crate) store: &'a Store,
    pub(crate) settings: &'a SiteSettings,
    pub(crate) permalinks: &'a PermalinkCache,
}

impl AdRedirect<'_> {
    /// Where an `prx=ad` view should go, or `None` to render normally: the
    /// site is not activated, no template is configured, or its address
    /// cannot be resolved.
    pub fn resolve(&self, raw_query: &str) -> PrxResult<Option<Url>> {
        let cfg = self.store.load_configuration()?;
        if !cfg.activated {
            debug!("ad view while deactivated; not redirecting");
            return Ok(None);
        }
        let Some(id) = cfg.template_resource_id else {
            debug!("ad view without template resource; not redirecting");
            return Ok(None);
        };

        let Some(template_url) = self.template_url(id)? else {
            warn!(id, "template resource has no permalink; not redirecting");
            return Ok(None);
        };

        let target = redirect_target(&template_url, raw_query);
        info!(id, target = %target, "audit: ad.redirect");
        Ok(Some(target))
    }

    fn template_url(&self, id: u64) -> PrxResult<Option<Url>> {
        if let Some(url) = self.permalinks.get(id) {
            return Ok(Some(url));
        }
        let url = self
            .store
            .get_post(id)?
            .and_then(|post| permalink(self.settings, &post));
        if let Some(url) = &url {
            self.permalinks.insert(id, url.clone());
        }
        Ok(url)
    }
}
