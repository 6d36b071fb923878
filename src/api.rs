//! Public JSON projection of the weblog. Read only; unknown or non-public
//! resources answer `404 {"err": "not found"}`.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};

use crate::app::{self, AppState};
use crate::compat::MyJson;
use crate::model::{
    self,
    database::{self, PostFilter},
    network::{PostsJson, PublicPostJson, StatusesJson, TagsJson, UsernameJson, ValueJson},
    PublicPost,
};
use crate::routes;
use crate::Error;

async fn latest(state: &AppState) -> Result<Vec<PublicPost>, Error> {
    let mut conn = state.pool.acquire().await?;
    Ok(database::public_posts(
        &mut conn,
        &PostFilter::default(),
        model::now(),
        Some(i64::from(state.config.api.feed_items)),
        0,
    )
    .await?)
}

async fn post_by_slug(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<MyJson<PublicPostJson>, Error> {
    let slug: String = app::param(&params, "slug")?;
    let mut conn = state.pool.acquire().await?;
    let post = database::public_post_by_slug(&mut conn, &slug, model::now())
        .await?
        .ok_or(Error::NotFound)?;

    Ok(MyJson(PublicPostJson::new(
        post,
        &state.config.site.post_datetime_format,
    )))
}

async fn status_by_id(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<MyJson<ValueJson>, Error> {
    let mut conn = state.pool.acquire().await?;
    let status = database::status_by_id(&mut conn, app::param(&params, "id")?)
        .await?
        .ok_or(Error::NotFound)?;
    Ok(MyJson(ValueJson {
        value: status.value,
    }))
}

async fn format_by_id(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<MyJson<ValueJson>, Error> {
    let mut conn = state.pool.acquire().await?;
    let format = database::format_by_id(&mut conn, app::param(&params, "id")?)
        .await?
        .ok_or(Error::NotFound)?;
    Ok(MyJson(ValueJson {
        value: format.value,
    }))
}

async fn user_by_id(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<MyJson<UsernameJson>, Error> {
    let mut conn = state.pool.acquire().await?;
    let user = database::user_by_id(&mut conn, app::param(&params, "id")?)
        .await?
        .ok_or(Error::NotFound)?;
    Ok(MyJson(UsernameJson {
        username: user.username,
    }))
}

/// `[pubdate, slug]` pairs of the latest public posts.
async fn sluglist_latest(
    State(state): State<AppState>,
) -> Result<MyJson<PostsJson<(String, String)>>, Error> {
    let format = &state.config.site.post_datetime_format;
    let posts = latest(&state)
        .await?
        .into_iter()
        .map(|PublicPost { post, .. }| {
            let pubdate = post.pubdate.map(|pubdate| format.format(pubdate));
            (pubdate.unwrap_or_default(), post.slug)
        })
        .collect();

    Ok(MyJson(PostsJson { posts }))
}

async fn posts_latest(
    State(state): State<AppState>,
) -> Result<MyJson<PostsJson<PublicPostJson>>, Error> {
    let format = &state.config.site.post_datetime_format;
    let posts = latest(&state)
        .await?
        .into_iter()
        .map(|post| PublicPostJson::new(post, format))
        .collect();

    Ok(MyJson(PostsJson { posts }))
}

async fn statuslist(State(state): State<AppState>) -> Result<MyJson<StatusesJson>, Error> {
    let mut conn = state.pool.acquire().await?;
    let statuses = database::statuses(&mut conn).await?;
    Ok(MyJson(StatusesJson {
        statuses: statuses.into_iter().map(|status| status.value).collect(),
    }))
}

async fn taglist(State(state): State<AppState>) -> Result<MyJson<TagsJson>, Error> {
    let mut conn = state.pool.acquire().await?;
    let tags = database::tags(&mut conn).await?;
    Ok(MyJson(TagsJson {
        tags: tags.into_iter().map(|tag| tag.value).collect(),
    }))
}

async fn sluglist_by_tag(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<MyJson<PostsJson<String>>, Error> {
    let value: String = app::param(&params, "tag")?;
    let mut conn = state.pool.acquire().await?;
    let tag = database::tag_by_value(&mut conn, &value)
        .await?
        .ok_or(Error::NotFound)?;

    let filter = PostFilter {
        tag_id: Some(tag.id),
        ..PostFilter::default()
    };
    let posts = database::public_posts(&mut conn, &filter, model::now(), None, 0)
        .await?
        .into_iter()
        .map(|public| public.post.slug)
        .collect();

    Ok(MyJson(PostsJson { posts }))
}

async fn not_found() -> Error {
    Error::NotFound
}

pub fn router(state: AppState) -> Router {
    let config = &state.config.api;
    let routes = &config.routes;
    let mount = |route: &str| routes::mount(&config.prefix, route);

    Router::new()
        .route(&mount(&routes.post_by_slug), get(post_by_slug))
        .route(&mount(&routes.status_by_id), get(status_by_id))
        .route(&mount(&routes.format_by_id), get(format_by_id))
        .route(&mount(&routes.user_by_id), get(user_by_id))
        .route(&mount(&routes.sluglist_latest), get(sluglist_latest))
        .route(&mount(&routes.posts_latest), get(posts_latest))
        .route(&mount(&routes.statuslist), get(statuslist))
        .route(&mount(&routes.taglist), get(taglist))
        .route(&mount(&routes.sluglist_by_tag), get(sluglist_by_tag))
        .fallback(not_found)
        .with_state(state)
}
