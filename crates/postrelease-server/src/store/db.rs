use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use redb::{Database, ReadableTable, TableDefinition};

use super::crypto::EncryptionKey;
use super::model::{NewPost, Post};

pub(crate) const OPTIONS: TableDefinition<&str, &str> = TableDefinition::new("options");
pub(crate) const POSTS: TableDefinition<u64, &[u8]> = TableDefinition::new("posts");
pub(crate) const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

const POST_SEQUENCE: &str = "posts";

/// Handle to the on-disk database. Cheap to clone; every clone shares the
/// same redb instance.
#[derive(Clone)]
pub struct Store {
    pub(crate) db: Arc<Database>,
    pub(crate) key: Arc<EncryptionKey>,
}

impl Store {
    /// Open (or create) the database at `path` and make sure every table exists.
    pub fn open(path: &Path, key: EncryptionKey) -> Result<Self> {
        let db = Database::create(path)
            .with_context(|| format!("open database at {}", path.display()))?;

        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(OPTIONS)?;
            write_txn.open_table(POSTS)?;
            write_txn.open_table(SEQUENCES)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            key: Arc::new(key),
        })
    }

    /// Insert a post, assigning a fresh id. A slug already taken by another
    /// post of the same type gets a numeric suffix (`-2`, `-3`, ...).
    pub fn insert_post(&self, new: NewPost) -> Result<Post> {
        let write_txn = self.db.begin_write()?;
        let post = {
            let mut seq = write_txn.open_table(SEQUENCES)?;
            let next = seq.get(POST_SEQUENCE)?.map(|v| v.value()).unwrap_or(0) + 1;
            seq.insert(POST_SEQUENCE, next)?;

            let mut posts = write_txn.open_table(POSTS)?;
            let mut taken = Vec::new();
            for item in posts.iter()? {
                let (_k, v) = item?;
                let existing = decode(v.value())?;
                if existing.post_type == new.post_type {
                    taken.push(existing.slug);
                }
            }

            let post = Post {
                id: next,
                slug: unique_slug(&new.slug, &taken),
                post_type: new.post_type,
                title: new.title,
                content: new.content,
                status: new.status,
                author_id: new.author_id,
                created_at: new.created_at,
                modified_at: new.created_at,
                comments_open: new.comments_open,
                pings_open: new.pings_open,
            };
            let bytes = encode(&post)?;
            posts.insert(post.id, bytes.as_slice())?;
            post
        };
        write_txn.commit()?;
        Ok(post)
    }

    /// Overwrite an existing post in place. Returns false if no such id.
    pub fn update_post(&self, post: &Post) -> Result<bool> {
        let bytes = encode(post)?;
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut posts = write_txn.open_table(POSTS)?;
            let existed = posts.get(post.id)?.is_some();
            if existed {
                posts.insert(post.id, bytes.as_slice())?;
            }
            existed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    pub fn get_post(&self, id: u64) -> Result<Option<Post>> {
        let read_txn = self.db.begin_read()?;
        let posts = read_txn.open_table(POSTS)?;
        match posts.get(id)? {
            Some(v) => Ok(Some(decode(v.value())?)),
            None => Ok(None),
        }
    }

    /// Delete a post by id. Returns true if it existed.
    pub fn delete_post(&self, id: u64) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut posts = write_txn.open_table(POSTS)?;
            let existed = posts.remove(id)?.is_some();
            existed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Delete every post of `post_type`, returning how many were removed.
    pub fn delete_posts_of_type(&self, post_type: &str) -> Result<usize> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut posts = write_txn.open_table(POSTS)?;
            let mut doomed = Vec::new();
            for item in posts.iter()? {
                let (k, v) = item?;
                if decode(v.value())?.post_type == post_type {
                    doomed.push(k.value());
                }
            }
            for id in &doomed {
                posts.remove(*id)?;
            }
            doomed.len()
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Published posts of `post_type`, newest first, at most `limit`.
    pub fn recent_published(&self, post_type: &str, limit: usize) -> Result<Vec<Post>> {
        let read_txn = self.db.begin_read()?;
        let posts = read_txn.open_table(POSTS)?;

        let mut out = Vec::new();
        for item in posts.iter()? {
            let (_k, v) = item?;
            let post = decode(v.value())?;
            if post.post_type == post_type && post.is_published() {
                out.push(post);
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out.truncate(limit);
        Ok(out)
    }

    pub fn count_posts_of_type(&self, post_type: &str) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let posts = read_txn.open_table(POSTS)?;
        let mut n = 0;
        for item in posts.iter()? {
            let (_k, v) = item?;
            if decode(v.value())?.post_type == post_type {
                n += 1;
            }
        }
        Ok(n)
    }
}

fn unique_slug(wanted: &str, taken: &[String]) -> String {
    if !taken.iter().any(|s| s == wanted) {
        return wanted.to_owned();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{wanted}-{n}");
        if !taken.iter().any(|s| *s == candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn encode(post: &Post) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(post, bincode::config::standard()).context("bincode encode post")
}

fn decode(bytes: &[u8]) -> Result<Post> {
    let (post, _): (Post, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .context("bincode decode post")?;
    Ok(post)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::crypto::generate_key;
    use crate::store::model::PostStatus;

    /// Fresh store in a temp dir. The `TempDir` must outlive the store.
    pub(crate) fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("postrelease.db"), generate_key()).unwrap();
        (dir, store)
    }

    pub(crate) fn article(title: &str, created_at: i64) -> NewPost {
        NewPost {
            post_type: "post".into(),
            title: title.into(),
            content: format!("<p>{title}</p>"),
            status: PostStatus::Publish,
            slug: title.to_lowercase().replace(' ', "-"),
            author_id: 3,
            created_at,
            comments_open: true,
            pings_open: true,
        }
    }

    #[test]
    fn insert_assigns_increasing_ids() {
        let (_dir, store) = temp_store();
        let a = store.insert_post(article("First", 10)).unwrap();
        let b = store.insert_post(article("Second", 20)).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.get_post(2).unwrap().unwrap().title, "Second");
    }

    #[test]
    fn duplicate_slug_gets_suffix() {
        let (_dir, store) = temp_store();
        let a = store.insert_post(article("Same", 1)).unwrap();
        let b = store.insert_post(article("Same", 2)).unwrap();
        let c = store.insert_post(article("Same", 3)).unwrap();
        assert_eq!(a.slug, "same");
        assert_eq!(b.slug, "same-2");
        assert_eq!(c.slug, "same-3");
    }

    #[test]
    fn delete_posts_of_type_leaves_other_types() {
        let (_dir, store) = temp_store();
        store.insert_post(article("Keep", 1)).unwrap();
        let mut sponsored = article("Gone", 2);
        sponsored.post_type = "pr_sponsored_post".into();
        store.insert_post(sponsored.clone()).unwrap();
        store.insert_post(sponsored).unwrap();

        assert_eq!(store.delete_posts_of_type("pr_sponsored_post").unwrap(), 2);
        assert_eq!(store.count_posts_of_type("pr_sponsored_post").unwrap(), 0);
        assert_eq!(store.count_posts_of_type("post").unwrap(), 1);
    }

    #[test]
    fn recent_published_orders_newest_first_and_skips_drafts() {
        let (_dir, store) = temp_store();
        store.insert_post(article("Old", 100)).unwrap();
        store.insert_post(article("New", 300)).unwrap();
        let mut draft = article("Draft", 500);
        draft.status = PostStatus::Draft;
        store.insert_post(draft).unwrap();

        let titles: Vec<_> = store
            .recent_published("post", 10)
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, ["New", "Old"]);
        assert_eq!(store.recent_published("post", 1).unwrap().len(), 1);
    }

    #[test]
    fn negative_timestamps_survive_storage() {
        let (_dir, store) = temp_store();
        let post = store.insert_post(article("Sixties", -315_619_200)).unwrap();
        assert_eq!(store.get_post(post.id).unwrap().unwrap().created_at, -315_619_200);
    }

    #[test]
    fn update_missing_post_reports_false() {
        let (_dir, store) = temp_store();
        let mut post = store.insert_post(article("Edit", 1)).unwrap();
        post.title = "Edited".into();
        assert!(store.update_post(&post).unwrap());
        post.id = 99;
        assert!(!store.update_post(&post).unwrap());
    }
}
