//! Schema versioning, data migrations and first-time installation.

use std::{collections::BTreeSet, str::FromStr};

use indexmap::IndexMap;
use sqlx::{
    migrate::{Migrate, Migrator},
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqliteConnection, SqlitePool,
};

use crate::markup::{self, Format};
use crate::model::{
    self, database, FORMAT_MARKDOWN, FORMAT_REST, STATUS_DRAFT, STATUS_PRIVATE, STATUS_PUBLIC,
};
use crate::{slug, tags, Error};

pub static MIGRATOR: Migrator = sqlx::migrate!();

const WELCOME_TITLE: &str = "Welcome to Imposter!";
const WELCOME_CONTENT: &str = "
Imposter was installed correctly!

This is just a sample post to show Imposter works.

**Have a lot of fun blogging!**
";

pub async fn connect(url: &str) -> Result<SqlitePool, Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    tracing::info!("connecting to {}", url);
    Ok(SqlitePoolOptions::new().connect_with(options).await?)
}

async fn applied_versions(pool: &SqlitePool) -> Result<BTreeSet<i64>, Error> {
    let mut conn = pool.acquire().await?;
    conn.ensure_migrations_table().await?;
    Ok(conn
        .list_applied_migrations()
        .await?
        .into_iter()
        .map(|migration| migration.version)
        .collect())
}

/// Brings the schema to the newest version, then runs the data migration of
/// every version applied by this call. Returns those versions.
pub async fn upgrade(
    pool: &SqlitePool,
    replacements: &IndexMap<String, String>,
) -> Result<Vec<i64>, Error> {
    let before = applied_versions(pool).await?;
    MIGRATOR.run(pool).await?;
    let applied: Vec<i64> = applied_versions(pool)
        .await?
        .difference(&before)
        .copied()
        .collect();

    let mut tx = pool.begin().await?;
    for version in &applied {
        tracing::info!("applied schema version {}", version);
        match version {
            3 => {
                recompile_posts(&mut tx, replacements).await?;
            }
            4 => {
                tags::recount_all(&mut tx, model::now()).await?;
            }
            _ => {}
        }
    }
    tx.commit().await?;

    Ok(applied)
}

/// Reverts the schema to `target`. Data needs no reverting since the
/// columns the data migrations fill are dropped with it.
pub async fn downgrade(pool: &SqlitePool, target: i64) -> Result<(), Error> {
    MIGRATOR.undo(pool, target).await?;
    tracing::info!("schema reverted to version {}", target);
    Ok(())
}

/// Refreshes the cached HTML of every post from its stored markup.
pub async fn recompile_posts(
    conn: &mut SqliteConnection,
    replacements: &IndexMap<String, String>,
) -> Result<usize, Error> {
    let sources = database::post_sources(&mut *conn).await?;
    for source in &sources {
        let compiled = markup::compile_entry(
            Format::from_value(&source.format),
            source.summary.as_deref(),
            &source.content,
            replacements,
        )?;

        database::set_post_html(
            &mut *conn,
            source.id,
            compiled.summary_html.as_ref().map(|html| html.0.as_str()),
            &compiled.content_html.0,
        )
        .await?;
    }

    tracing::info!("recompiled {} posts", sources.len());
    Ok(sources.len())
}

/// Creates the schema and seeds it with one user, the statuses, formats,
/// two tags and a public welcome post.
pub async fn install(
    pool: &SqlitePool,
    secret_key: &str,
    username: &str,
    password: &str,
) -> Result<(), Error> {
    upgrade(pool, &IndexMap::new()).await?;

    let mut tx = pool.begin().await?;
    let password = model::hashify(secret_key, password);
    let user_id = database::insert_user(&mut tx, username, &password).await?;

    for status in [STATUS_DRAFT, STATUS_PRIVATE] {
        database::insert_status(&mut tx, status).await?;
    }
    let public = database::insert_status(&mut tx, STATUS_PUBLIC).await?;

    database::insert_format(&mut tx, FORMAT_REST).await?;
    let markdown = database::insert_format(&mut tx, FORMAT_MARKDOWN).await?;

    let mut tag_ids = Vec::new();
    for value in ["imposter", "weblog"] {
        tag_ids.push(database::get_or_create_tag(&mut tx, value).await?.id);
    }

    let now = model::now();
    let compiled =
        markup::compile_entry(Format::Markdown, None, WELCOME_CONTENT, &IndexMap::new())?;
    let post_id = database::insert_entry(
        &mut tx,
        database::EntryKind::Post,
        user_id,
        now,
        &database::EntryWrite {
            title: WELCOME_TITLE,
            slug: &slug::slugify(WELCOME_TITLE),
            summary: None,
            content: WELCOME_CONTENT,
            summary_html: None,
            content_html: &compiled.content_html.0,
            status_id: public,
            format_id: markdown,
            pubdate: Some(now),
            lastmoddate: now,
        },
    )
    .await?;

    database::set_post_tags(&mut tx, post_id, &tag_ids).await?;
    for tag_id in tag_ids {
        tags::recount(&mut tx, tag_id, now).await?;
    }

    tx.commit().await?;
    tracing::info!("installed database with user {}", username);
    Ok(())
}

/// Fresh in-memory database at the newest schema version.
pub async fn memory() -> Result<SqlitePool, Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true))
        .await?;
    upgrade(&pool, &IndexMap::new()).await?;
    Ok(pool)
}
