use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};

pub mod database;
pub mod network;

pub const STATUS_DRAFT: &str = "draft";
pub const STATUS_PRIVATE: &str = "private";
pub const STATUS_PUBLIC: &str = "public";

pub const FORMAT_MARKDOWN: &str = "markdown";
pub const FORMAT_REST: &str = "rest";

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Status {
    pub id: i64,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Format {
    pub id: i64,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub value: String,
    /// Number of public posts carrying this tag, see [`crate::tags::recount`].
    pub count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub content: String,
    pub summary_html: Option<String>,
    pub content_html: Option<String>,
    pub status_id: i64,
    pub user_id: i64,
    pub format_id: i64,
    pub createdate: OffsetDateTime,
    pub pubdate: Option<OffsetDateTime>,
    pub lastmoddate: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct Page {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub content_html: Option<String>,
    pub status_id: i64,
    pub user_id: i64,
    pub format_id: i64,
    pub createdate: OffsetDateTime,
    pub pubdate: Option<OffsetDateTime>,
    pub lastmoddate: OffsetDateTime,
}

/// A public post joined with its author.
#[derive(Debug, Clone, FromRow)]
pub struct PublicPost {
    #[sqlx(flatten)]
    pub post: Post,
    pub username: String,
}

/// A post or page row joined with its status value, for admin listings.
#[derive(Debug, Clone, FromRow)]
pub struct OwnedEntry {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub status: String,
    pub pubdate: Option<OffsetDateTime>,
    pub lastmoddate: OffsetDateTime,
}

/// Current time truncated to whole seconds, so stored timestamps compare
/// correctly as text.
pub fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now - Duration::nanoseconds(i64::from(now.nanosecond()))
}

/// The single condition gating external visibility of a post or page.
pub fn is_public(status: &str, pubdate: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    status == STATUS_PUBLIC && pubdate.is_some_and(|pubdate| pubdate <= now)
}

/// Hex SHA-256 of `seed` followed by `text`.
pub fn hashify(seed: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
