//! Query functions over the shared schema. Each takes the connection of the
//! current unit of work; callers decide whether that is a pooled connection
//! or an open transaction.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use time::{Date, Month, OffsetDateTime};

use super::{Format, OwnedEntry, Page, PublicPost, Status, Tag, User, STATUS_PUBLIC};

pub async fn user_by_credentials(
    conn: &mut SqliteConnection,
    username: &str,
    password_hash: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT id, username, password FROM users WHERE username = ? AND password = ?")
        .bind(username)
        .bind(password_hash)
        .fetch_optional(conn)
        .await
}

pub async fn user_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT id, username, password FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn user_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT id, username, password FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(conn)
        .await
}

pub async fn insert_user(
    conn: &mut SqliteConnection,
    username: &str,
    password_hash: &str,
) -> Result<i64, sqlx::Error> {
    Ok(sqlx::query("INSERT INTO users (username, password) VALUES (?, ?)")
        .bind(username)
        .bind(password_hash)
        .execute(conn)
        .await?
        .last_insert_rowid())
}

pub async fn statuses(conn: &mut SqliteConnection) -> Result<Vec<Status>, sqlx::Error> {
    sqlx::query_as("SELECT id, value FROM status ORDER BY id")
        .fetch_all(conn)
        .await
}

pub async fn status_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Status>, sqlx::Error> {
    sqlx::query_as("SELECT id, value FROM status WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn insert_status(conn: &mut SqliteConnection, value: &str) -> Result<i64, sqlx::Error> {
    Ok(sqlx::query("INSERT INTO status (value) VALUES (?)")
        .bind(value)
        .execute(conn)
        .await?
        .last_insert_rowid())
}

pub async fn formats(conn: &mut SqliteConnection) -> Result<Vec<Format>, sqlx::Error> {
    sqlx::query_as("SELECT id, value FROM formats ORDER BY id")
        .fetch_all(conn)
        .await
}

pub async fn format_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Format>, sqlx::Error> {
    sqlx::query_as("SELECT id, value FROM formats WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn insert_format(conn: &mut SqliteConnection, value: &str) -> Result<i64, sqlx::Error> {
    Ok(sqlx::query("INSERT INTO formats (value) VALUES (?)")
        .bind(value)
        .execute(conn)
        .await?
        .last_insert_rowid())
}

pub async fn tags(conn: &mut SqliteConnection) -> Result<Vec<Tag>, sqlx::Error> {
    sqlx::query_as("SELECT id, value, count FROM tags ORDER BY value")
        .fetch_all(conn)
        .await
}

pub async fn tag_by_value(
    conn: &mut SqliteConnection,
    value: &str,
) -> Result<Option<Tag>, sqlx::Error> {
    sqlx::query_as("SELECT id, value, count FROM tags WHERE value = ?")
        .bind(value)
        .fetch_optional(conn)
        .await
}

pub async fn tag_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<Tag>, sqlx::Error> {
    sqlx::query_as("SELECT id, value, count FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn get_or_create_tag(
    conn: &mut SqliteConnection,
    value: &str,
) -> Result<Tag, sqlx::Error> {
    if let Some(tag) = tag_by_value(&mut *conn, value).await? {
        return Ok(tag);
    }

    let id = sqlx::query("INSERT INTO tags (value, count) VALUES (?, 0)")
        .bind(value)
        .execute(conn)
        .await?
        .last_insert_rowid();

    Ok(Tag {
        id,
        value: value.to_string(),
        count: 0,
    })
}

pub async fn tags_for_post(
    conn: &mut SqliteConnection,
    post_id: i64,
) -> Result<Vec<Tag>, sqlx::Error> {
    sqlx::query_as(
        "SELECT t.id, t.value, t.count FROM tags t
         JOIN post_tags pt ON pt.tag_id = t.id
         WHERE pt.post_id = ?
         ORDER BY t.value",
    )
    .bind(post_id)
    .fetch_all(conn)
    .await
}

pub async fn set_post_tags(
    conn: &mut SqliteConnection,
    post_id: i64,
    tag_ids: &[i64],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;

    for tag_id in tag_ids {
        sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(*tag_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// The `limit` most used tags that are on at least one public post.
pub async fn most_used_tags(
    conn: &mut SqliteConnection,
    limit: i64,
) -> Result<Vec<Tag>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, value, count FROM tags WHERE count > 0 ORDER BY count DESC, value LIMIT ?",
    )
    .bind(limit)
    .fetch_all(conn)
    .await
}

pub async fn count_public_posts_with_tag(
    conn: &mut SqliteConnection,
    tag_id: i64,
    now: OffsetDateTime,
) -> Result<i64, sqlx::Error> {
    let filter = PostFilter {
        tag_id: Some(tag_id),
        ..PostFilter::default()
    };
    count_public_posts(conn, &filter, now).await
}

pub async fn set_tag_count(
    conn: &mut SqliteConnection,
    tag_id: i64,
    count: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tags SET count = ? WHERE id = ?")
        .bind(count)
        .bind(tag_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Narrows the public post listing. All conditions are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub tag_id: Option<i64>,
    pub user_id: Option<i64>,
    /// Inclusive lower bound on pubdate.
    pub published_from: Option<OffsetDateTime>,
    /// Exclusive upper bound on pubdate.
    pub published_until: Option<OffsetDateTime>,
}

impl PostFilter {
    pub fn year(year: i32) -> Option<Self> {
        Some(Self {
            published_from: Some(start_of(year, Month::January)?),
            published_until: Some(start_of(year.checked_add(1)?, Month::January)?),
            ..Self::default()
        })
    }

    pub fn month(year: i32, month: u8) -> Option<Self> {
        let month = Month::try_from(month).ok()?;
        let (next_year, next_month) = match month {
            Month::December => (year.checked_add(1)?, Month::January),
            month => (year, month.next()),
        };

        Some(Self {
            published_from: Some(start_of(year, month)?),
            published_until: Some(start_of(next_year, next_month)?),
            ..Self::default()
        })
    }
}

fn start_of(year: i32, month: Month) -> Option<OffsetDateTime> {
    Some(Date::from_calendar_date(year, month, 1).ok()?.midnight().assume_utc())
}

/// Joins posts to status and author and applies the public predicate.
fn public_posts_query<'a>(
    select: &str,
    filter: &PostFilter,
    now: OffsetDateTime,
) -> QueryBuilder<'a, Sqlite> {
    let mut query = QueryBuilder::new(select);
    query.push(
        " FROM posts p
         JOIN status s ON s.id = p.status_id
         JOIN users u ON u.id = p.user_id",
    );

    if let Some(tag_id) = filter.tag_id {
        query
            .push(" JOIN post_tags pt ON pt.post_id = p.id AND pt.tag_id = ")
            .push_bind(tag_id);
    }

    query
        .push(" WHERE s.value = ")
        .push_bind(STATUS_PUBLIC)
        .push(" AND p.pubdate IS NOT NULL AND p.pubdate <= ")
        .push_bind(now);

    if let Some(user_id) = filter.user_id {
        query.push(" AND p.user_id = ").push_bind(user_id);
    }
    if let Some(from) = filter.published_from {
        query.push(" AND p.pubdate >= ").push_bind(from);
    }
    if let Some(until) = filter.published_until {
        query.push(" AND p.pubdate < ").push_bind(until);
    }

    query
}

pub async fn count_public_posts(
    conn: &mut SqliteConnection,
    filter: &PostFilter,
    now: OffsetDateTime,
) -> Result<i64, sqlx::Error> {
    public_posts_query("SELECT COUNT(*)", filter, now)
        .build_query_scalar()
        .fetch_one(conn)
        .await
}

/// Newest first. `limit` of `None` returns every matching post.
pub async fn public_posts(
    conn: &mut SqliteConnection,
    filter: &PostFilter,
    now: OffsetDateTime,
    limit: Option<i64>,
    offset: i64,
) -> Result<Vec<PublicPost>, sqlx::Error> {
    let mut query = public_posts_query("SELECT p.*, u.username", filter, now);
    query
        .push(" ORDER BY p.pubdate DESC, p.id DESC LIMIT ")
        .push_bind(limit.unwrap_or(-1))
        .push(" OFFSET ")
        .push_bind(offset);

    query.build_query_as::<PublicPost>().fetch_all(conn).await
}

pub async fn public_post_by_slug(
    conn: &mut SqliteConnection,
    slug: &str,
    now: OffsetDateTime,
) -> Result<Option<PublicPost>, sqlx::Error> {
    let mut query = public_posts_query("SELECT p.*, u.username", &PostFilter::default(), now);
    query.push(" AND p.slug = ").push_bind(slug.to_string());
    query.build_query_as::<PublicPost>().fetch_optional(conn).await
}

pub async fn public_page_by_slug(
    conn: &mut SqliteConnection,
    slug: &str,
    now: OffsetDateTime,
) -> Result<Option<Page>, sqlx::Error> {
    sqlx::query_as(
        "SELECT p.* FROM pages p JOIN status s ON s.id = p.status_id
         WHERE s.value = ? AND p.pubdate IS NOT NULL AND p.pubdate <= ? AND p.slug = ?",
    )
    .bind(STATUS_PUBLIC)
    .bind(now)
    .bind(slug)
    .fetch_optional(conn)
    .await
}

pub async fn public_pages(
    conn: &mut SqliteConnection,
    now: OffsetDateTime,
) -> Result<Vec<Page>, sqlx::Error> {
    sqlx::query_as(
        "SELECT p.* FROM pages p JOIN status s ON s.id = p.status_id
         WHERE s.value = ? AND p.pubdate IS NOT NULL AND p.pubdate <= ?
         ORDER BY p.title",
    )
    .bind(STATUS_PUBLIC)
    .bind(now)
    .fetch_all(conn)
    .await
}

/// Table holding an editable entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Post,
    Page,
}

impl EntryKind {
    fn table(self) -> &'static str {
        match self {
            EntryKind::Post => "posts",
            EntryKind::Page => "pages",
        }
    }
}

/// Column values written when an entry is saved. Summary fields are ignored
/// for pages.
#[derive(Debug, Clone)]
pub struct EntryWrite<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub summary: Option<&'a str>,
    pub content: &'a str,
    pub summary_html: Option<&'a str>,
    pub content_html: &'a str,
    pub status_id: i64,
    pub format_id: i64,
    pub pubdate: Option<OffsetDateTime>,
    pub lastmoddate: OffsetDateTime,
}

pub async fn owned_post(
    conn: &mut SqliteConnection,
    user_id: i64,
    id: i64,
) -> Result<Option<super::Post>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM posts WHERE user_id = ? AND id = ?")
        .bind(user_id)
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn owned_page(
    conn: &mut SqliteConnection,
    user_id: i64,
    id: i64,
) -> Result<Option<Page>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM pages WHERE user_id = ? AND id = ?")
        .bind(user_id)
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn count_owned(
    conn: &mut SqliteConnection,
    kind: EntryKind,
    user_id: i64,
) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE user_id = ?", kind.table());
    sqlx::query_scalar(&sql)
        .bind(user_id)
        .fetch_one(conn)
        .await
}

/// Most recently modified first.
pub async fn owned_entries(
    conn: &mut SqliteConnection,
    kind: EntryKind,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<OwnedEntry>, sqlx::Error> {
    let sql = format!(
        "SELECT e.id, e.title, e.slug, s.value AS status, e.pubdate, e.lastmoddate
         FROM {} e JOIN status s ON s.id = e.status_id
         WHERE e.user_id = ?
         ORDER BY e.lastmoddate DESC, e.id DESC
         LIMIT ? OFFSET ?",
        kind.table()
    );
    sqlx::query_as(&sql)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(conn)
        .await
}

pub async fn insert_entry(
    conn: &mut SqliteConnection,
    kind: EntryKind,
    user_id: i64,
    createdate: OffsetDateTime,
    entry: &EntryWrite<'_>,
) -> Result<i64, sqlx::Error> {
    let query = match kind {
        EntryKind::Post => sqlx::query(
            "INSERT INTO posts (title, slug, summary, content, summary_html, content_html,
                 status_id, format_id, pubdate, lastmoddate, user_id, createdate)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.title)
        .bind(entry.slug)
        .bind(entry.summary)
        .bind(entry.content)
        .bind(entry.summary_html)
        .bind(entry.content_html),
        EntryKind::Page => sqlx::query(
            "INSERT INTO pages (title, slug, content, content_html,
                 status_id, format_id, pubdate, lastmoddate, user_id, createdate)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.title)
        .bind(entry.slug)
        .bind(entry.content)
        .bind(entry.content_html),
    };

    Ok(query
        .bind(entry.status_id)
        .bind(entry.format_id)
        .bind(entry.pubdate)
        .bind(entry.lastmoddate)
        .bind(user_id)
        .bind(createdate)
        .execute(conn)
        .await?
        .last_insert_rowid())
}

pub async fn update_entry(
    conn: &mut SqliteConnection,
    kind: EntryKind,
    id: i64,
    entry: &EntryWrite<'_>,
) -> Result<(), sqlx::Error> {
    let query = match kind {
        EntryKind::Post => sqlx::query(
            "UPDATE posts SET title = ?, slug = ?, summary = ?, content = ?, summary_html = ?,
                 content_html = ?, status_id = ?, format_id = ?, pubdate = ?, lastmoddate = ?
             WHERE id = ?",
        )
        .bind(entry.title)
        .bind(entry.slug)
        .bind(entry.summary)
        .bind(entry.content)
        .bind(entry.summary_html)
        .bind(entry.content_html),
        EntryKind::Page => sqlx::query(
            "UPDATE pages SET title = ?, slug = ?, content = ?,
                 content_html = ?, status_id = ?, format_id = ?, pubdate = ?, lastmoddate = ?
             WHERE id = ?",
        )
        .bind(entry.title)
        .bind(entry.slug)
        .bind(entry.content)
        .bind(entry.content_html),
    };

    query
        .bind(entry.status_id)
        .bind(entry.format_id)
        .bind(entry.pubdate)
        .bind(entry.lastmoddate)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Markup source of every post, for recompiling the cached HTML.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostSource {
    pub id: i64,
    pub format: String,
    pub summary: Option<String>,
    pub content: String,
}

pub async fn post_sources(conn: &mut SqliteConnection) -> Result<Vec<PostSource>, sqlx::Error> {
    sqlx::query_as(
        "SELECT p.id, f.value AS format, p.summary, p.content
         FROM posts p JOIN formats f ON f.id = p.format_id
         ORDER BY p.id",
    )
    .fetch_all(conn)
    .await
}

pub async fn set_post_html(
    conn: &mut SqliteConnection,
    id: i64,
    summary_html: Option<&str>,
    content_html: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE posts SET summary_html = ?, content_html = ? WHERE id = ?")
        .bind(summary_html)
        .bind(content_html)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn year_filter_covers_calendar_year() {
        let filter = PostFilter::year(2010).unwrap();
        assert_eq!(filter.published_from, Some(datetime!(2010-01-01 0:00 UTC)));
        assert_eq!(filter.published_until, Some(datetime!(2011-01-01 0:00 UTC)));
        assert_eq!(filter.tag_id, None);
    }

    #[test]
    fn december_rolls_into_next_year() {
        let filter = PostFilter::month(2010, 12).unwrap();
        assert_eq!(filter.published_from, Some(datetime!(2010-12-01 0:00 UTC)));
        assert_eq!(filter.published_until, Some(datetime!(2011-01-01 0:00 UTC)));
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert_eq!(PostFilter::month(2010, 0), None);
        assert_eq!(PostFilter::month(2010, 13), None);
    }
}
