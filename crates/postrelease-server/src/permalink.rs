use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use url::Url;

use crate::settings::{SiteSettings, ARTICLE_POST_TYPE};
use crate::store::Post;

/// Public address of a published post: `{home}/{slug}/` for articles,
/// `{home}/{type}/{slug}/` for other types. `None` for unpublished posts.
pub fn permalink(settings: &SiteSettings, post: &Post) -> Option<Url> {
    if !post.is_published() || post.slug.is_empty() {
        return None;
    }
    let relative = if post.post_type == ARTICLE_POST_TYPE {
        format!("{}/", post.slug)
    } else {
        format!("{}/{}/", post.post_type, post.slug)
    };
    with_dir(&settings.home_url).join(&relative).ok()
}

fn with_dir(base: &Url) -> Url {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

/// Resolved permalinks by post id: the local routing table flushed on
/// activation.
#[derive(Clone, Default)]
pub struct PermalinkCache {
    inner: Arc<RwLock<HashMap<u64, Url>>>,
}

impl PermalinkCache {
    pub fn get(&self, id: u64) -> Option<Url> {
        self.inner.read().ok()?.get(&id).cloned()
    }

    pub fn insert(&self, id: u64, url: Url) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(id, url);
        }
    }

    /// Forget one post, e.g. after it was deleted.
    pub fn remove(&self, id: u64) -> Option<Url> {
        self.inner.write().ok()?.remove(&id)
    }

    pub fn flush(&self) {
        if let Ok(mut map) = self.inner.write() {
            map.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
