//! XML article feed the provider crawls to index the publication.

use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::permalink::permalink;
use crate::settings::SiteSettings;
use crate::store::Post;

pub const DEFAULT_POST_LIMIT: usize = 200;
pub const MAX_POST_LIMIT: usize = 200;

static SCRIPT_OR_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<(?:script|style)\b[^>]*/?>")
        .expect("static regex")
});

/// Page size from the `num` parameter: 1..=200, anything else is 200.
pub fn clamp_limit(requested: Option<i64>) -> usize {
    match requested {
        Some(n) if (1..=MAX_POST_LIMIT as i64).contains(&n) => n as usize,
        _ => DEFAULT_POST_LIMIT,
    }
}

/// Remove `<script>` and `<style>` elements with their contents.
pub fn sanitize_content(html: &str) -> String {
    SCRIPT_OR_STYLE.replace_all(html, "").into_owned()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap in CDATA, splitting any `]]>` so the section cannot be closed early.
fn cdata(s: &str) -> String {
    format!("<![CDATA[{}]]>", s.replace("]]>", "]]]]><![CDATA[>"))
}

pub fn render(settings: &SiteSettings, posts: &[Post]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n<articles>\n");
    for post in posts {
        let link = permalink(settings, post).map(|u| u.to_string()).unwrap_or_default();
        // Writing to a String cannot fail.
        let _ = writeln!(
            xml,
            "<article><id>{}</id><link>{}</link><title>{}</title><content>{}</content></article>",
            post.id,
            cdata(&link),
            cdata(&escape_html(&post.title)),
            cdata(&sanitize_content(&post.content)),
        );
    }
    xml.push_str("</articles>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PostStatus;

    #[test]
    fn limit_clamps_out_of_range_to_default() {
        assert_eq!(clamp_limit(Some(0)), 200);
        assert_eq!(clamp_limit(Some(500)), 200);
        assert_eq!(clamp_limit(Some(-1)), 200);
        assert_eq!(clamp_limit(None), 200);
        assert_eq!(clamp_limit(Some(50)), 50);
        assert_eq!(clamp_limit(Some(1)), 1);
        assert_eq!(clamp_limit(Some(200)), 200);
    }

    #[test]
    fn scripts_and_styles_are_stripped() {
        let html = "<p>a</p><SCRIPT type=\"x\">alert(1)\n</script ><style>p{}</style><p>b</p><script src=x />";
        assert_eq!(sanitize_content(html), "<p>a</p><p>b</p>");
    }

    #[test]
    fn cdata_cannot_be_terminated_by_content() {
        assert_eq!(cdata("a]]>b"), "<![CDATA[a]]]]><![CDATA[>b]]>");
    }

    #[test]
    fn renders_article_elements() {
        let settings = SiteSettings::new("https://blog.example.com/", "https://prx.example.com/").unwrap();
        let post = Post {
            id: 7,
            post_type: "post".into(),
            title: "Fish & <Chips>".into(),
            content: "<p>body</p><script>x()</script>".into(),
            status: PostStatus::Publish,
            slug: "fish".into(),
            author_id: 1,
            created_at: 0,
            modified_at: 0,
            comments_open: true,
            pings_open: true,
        };
        let xml = render(&settings, &[post]);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>"));
        assert!(xml.contains("<id>7</id>"));
        assert!(xml.contains("<link><![CDATA[https://blog.example.com/fish/]]></link>"));
        assert!(xml.contains("<title><![CDATA[Fish &amp; &lt;Chips&gt;]]></title>"));
        assert!(xml.contains("<content><![CDATA[<p>body</p>]]></content>"));
        assert!(xml.trim_end().ends_with("</articles>"));
    }

    #[test]
    fn empty_feed_is_still_a_document() {
        let settings = SiteSettings::new("https://blog.example.com/", "https://prx.example.com/").unwrap();
        let xml = render(&settings, &[]);
        assert!(xml.contains("<articles>\n</articles>"));
    }
}
