//! The singleton template resource the provider renders full-page ads into.

use tracing::{info, warn};

use crate::error::{PrxError, PrxResult};
use crate::settings::{SiteSettings, DB_VERSION, SPONSORED_POST_TYPE};
use crate::store::{NewPost, Post, PostStatus, Store};

pub const TITLE_MARKER: &str = r#"<span class="prx_title"></span>"#;
pub const BODY_MARKER: &str = r#"<span class="prx_body"></span>"#;
pub const SLUG_MARKER: &str = "postrelease";
/// 1960-01-01T00:00:00Z in unix seconds.
pub const SENTINEL_EPOCH: i64 = -315_619_200;

/// Checks every sentinel field. The error names the first field that differs.
pub fn check_sentinels(post: &Post) -> PrxResult<()> {
    let bad = if post.status != PostStatus::Publish {
        Some("status")
    } else if !post.slug.contains(SLUG_MARKER) {
        Some("slug")
    } else if post.post_type != SPONSORED_POST_TYPE {
        Some("type")
    } else if post.title != TITLE_MARKER {
        Some("title")
    } else if post.content != BODY_MARKER {
        Some("body")
    } else {
        None
    };
    match bad {
        Some(field) => Err(PrxError::ResourceCorrupt(field)),
        None => Ok(()),
    }
}

pub struct TemplateManager<'a> {
    store: &'a Store,
    settings: &'a SiteSettings,
}

impl<'a> TemplateManager<'a> {
    pub fn new(store: &'a Store, settings: &'a SiteSettings) -> Self {
        Self { store, settings }
    }

    /// Return the id of a valid template resource, creating a new one when
    /// none is configured or the configured one is missing or corrupt. The
    /// flag reports whether a new resource was created. A corrupt resource is
    /// left in place; only the configured id moves.
    pub fn ensure_valid(&self) -> PrxResult<(u64, bool)> {
        let Some(id) = self.store.load_configuration()?.template_resource_id else {
            return Ok((self.create()?, true));
        };

        match self.store.get_post(id)? {
            None => {
                warn!(id, "template resource missing; recreating");
            }
            Some(post) => match check_sentinels(&post) {
                Ok(()) => return Ok((id, false)),
                Err(e) => warn!(id, error = %e, "template resource invalid; recreating"),
            },
        }
        Ok((self.create()?, true))
    }

    /// Insert a fresh template resource and point the configuration at it.
    pub fn create(&self) -> PrxResult<u64> {
        let post = self.store.insert_post(NewPost {
            post_type: SPONSORED_POST_TYPE.into(),
            title: TITLE_MARKER.into(),
            content: BODY_MARKER.into(),
            status: PostStatus::Publish,
            slug: SLUG_MARKER.into(),
            author_id: self.settings.author_id,
            created_at: SENTINEL_EPOCH,
            comments_open: false,
            pings_open: false,
        })?;
        self.store.set_template_id(post.id)?;
        info!(id = post.id, slug = %post.slug, "audit: template.create");
        Ok(post.id)
    }

    /// Bring an older option layout up to [`DB_VERSION`]. Returns whether
    /// anything ran.
    pub fn upgrade(&self) -> PrxResult<bool> {
        let current = self.store.load_configuration()?.schema_version;
        if current >= DB_VERSION {
            return Ok(false);
        }
        let (id, created) = self.ensure_valid()?;
        self.store.set_schema_version(DB_VERSION)?;
        info!(from = current, to = DB_VERSION, template_id = id, created, "audit: schema.upgrade");
        Ok(true)
    }
}
