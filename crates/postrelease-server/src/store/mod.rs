pub mod crypto;
pub mod db;
pub mod model;
pub mod options;

pub use db::Store;
pub use model::{Configuration, NewPost, OptionKey, Post, PostStatus};
