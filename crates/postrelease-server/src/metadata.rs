//! Byline rewrites for the template resource, so a rendered ad never shows
//! the sentinel author or the 1960 creation date.

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::clock::Clock;
use crate::store::Post;

pub const PROMOTED_AUTHOR: &str = "Promoted";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Byline {
    pub author: String,
    pub author_link: String,
    pub date: DateTime<Utc>,
}

pub struct MetadataRewriter<'a> {
    pub(crate) template_id: Option<u64>,
    pub(crate) home_url: &'a Url,
    pub(crate) clock: &'a dyn Clock,
}

impl MetadataRewriter<'_> {
    fn is_template(&self, rendering: Option<&Post>) -> bool {
        matches!((rendering, self.template_id), (Some(post), Some(id)) if post.id == id)
    }

    pub fn author_name(&self, rendering: Option<&Post>, name: String) -> String {
        if self.is_template(rendering) {
            PROMOTED_AUTHOR.to_owned()
        } else {
            name
        }
    }

    pub fn author_link(&self, rendering: Option<&Post>, link: String) -> String {
        if self.is_template(rendering) {
            self.home_url.to_string()
        } else {
            link
        }
    }

    pub fn timestamp(&self, rendering: Option<&Post>, at: DateTime<Utc>) -> DateTime<Utc> {
        if self.is_template(rendering) {
            self.clock.now()
        } else {
            at
        }
    }

    /// All three filters applied to one rendered post.
    pub fn byline(&self, post: &Post, author: String, author_link: String) -> Byline {
        let shown = DateTime::from_timestamp(post.modified_at, 0).unwrap_or_default();
        Byline {
            author: self.author_name(Some(post), author),
            author_link: self.author_link(Some(post), author_link),
            date: self.timestamp(Some(post), shown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::PostStatus;
    use chrono::TimeZone;

    fn post(id: u64) -> Post {
        Post {
            id,
            post_type: "pr_sponsored_post".into(),
            title: String::new(),
            content: String::new(),
            status: PostStatus::Publish,
            slug: "postrelease".into(),
            author_id: 1,
            created_at: -315_619_200,
            modified_at: -315_619_200,
            comments_open: false,
            pings_open: false,
        }
    }

    #[test]
    fn template_byline_is_masked() {
        let home = Url::parse("https://blog.example.com/").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 15, 9, 30, 0).unwrap();
        let clock = FixedClock(now);
        let rw = MetadataRewriter { template_id: Some(42), home_url: &home, clock: &clock };

        let b = rw.byline(&post(42), "admin".into(), "https://blog.example.com/author/admin/".into());
        assert_eq!(b.author, "Promoted");
        assert_eq!(b.author_link, "https://blog.example.com/");
        assert_eq!(b.date, now);
    }

    #[test]
    fn other_posts_pass_through() {
        let home = Url::parse("https://blog.example.com/").unwrap();
        let clock = FixedClock(Utc::now());
        let rw = MetadataRewriter { template_id: Some(42), home_url: &home, clock: &clock };
        let then = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();

        let other = post(7);
        assert_eq!(rw.author_name(Some(&other), "Jane".into()), "Jane");
        assert_eq!(rw.author_link(Some(&other), "/author/jane".into()), "/author/jane");
        assert_eq!(rw.timestamp(Some(&other), then), then);
    }

    #[test]
    fn missing_context_or_template_is_a_no_op() {
        let home = Url::parse("https://blog.example.com/").unwrap();
        let clock = FixedClock(Utc::now());
        let then = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();

        let rw = MetadataRewriter { template_id: Some(42), home_url: &home, clock: &clock };
        assert_eq!(rw.author_name(None, "Jane".into()), "Jane");
        assert_eq!(rw.timestamp(None, then), then);

        let rw = MetadataRewriter { template_id: None, home_url: &home, clock: &clock };
        assert_eq!(rw.author_name(Some(&post(42)), "Jane".into()), "Jane");
    }
}
