use serde::{Deserialize, Serialize};

/// Keys of the persisted option table. The string forms are the wire names
/// the provider sees in diagnostics and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKey {
    TemplatePostId,
    PluginActivated,
    PluginKey,
    DatabaseVersion,
}

impl OptionKey {
    pub const ALL: [OptionKey; 4] = [
        OptionKey::TemplatePostId,
        OptionKey::PluginActivated,
        OptionKey::PluginKey,
        OptionKey::DatabaseVersion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OptionKey::TemplatePostId => "template_post_id",
            OptionKey::PluginActivated => "plugin_activated",
            OptionKey::PluginKey => "plugin_key",
            OptionKey::DatabaseVersion => "database_version",
        }
    }
}

/// Typed view of the option table. A missing key reads as the field default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    pub template_resource_id: Option<u64>,
    pub activated: bool,
    pub shared_secret: Option<String>,
    pub schema_version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostStatus {
    Publish,
    Draft,
    Private,
    Trash,
}

/// A content item held on behalf of the host: site posts as well as the
/// managed sponsored type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub post_type: String,
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    pub slug: String,
    pub author_id: u64,
    /// Unix seconds. May be negative (the template sentinel predates 1970).
    pub created_at: i64,
    pub modified_at: i64,
    pub comments_open: bool,
    pub pings_open: bool,
}

/// Insert payload; the store assigns `id` and de-duplicates `slug`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub post_type: String,
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    pub slug: String,
    pub author_id: u64,
    pub created_at: i64,
    #[serde(default)]
    pub comments_open: bool,
    #[serde(default)]
    pub pings_open: bool,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Publish
    }
}
