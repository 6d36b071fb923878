//! The public, read-only HTML site and its feeds.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::header,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use sqlx::SqliteConnection;
use tera::Context;
use time::OffsetDateTime;
use tower_http::services::ServeDir;

use crate::app::{self, AppState};
use crate::config::Config;
use crate::feed::{self, FeedEntry, FeedMeta};
use crate::model::{self, database, database::PostFilter, Post, PublicPost, Tag};
use crate::paginate::Pagination;
use crate::routes;
use crate::tags::{self, CloudTag};
use crate::Error;

fn path(config: &Config, route: &str, params: &[(&str, &str)]) -> String {
    routes::path(&config.frontend.prefix, route, params)
}

fn static_base(config: &Config, route: &str) -> String {
    let route = routes::fill(route, &[("path", "")]);
    routes::mount(&config.frontend.prefix, route.trim_end_matches('/'))
}

pub fn post_path(config: &Config, post: &Post) -> String {
    let date = post.pubdate.unwrap_or(post.createdate);
    path(
        config,
        &config.frontend.routes.post,
        &[
            ("year", &date.year().to_string()),
            ("month", &format!("{:02}", u8::from(date.month()))),
            ("day", &format!("{:02}", date.day())),
            ("slug", &post.slug),
        ],
    )
}

fn tag_path(config: &Config, tag: &str) -> String {
    path(config, &config.frontend.routes.postlist_by_tag_index, &[("tag", tag)])
}

fn user_path(config: &Config, username: &str) -> String {
    path(
        config,
        &config.frontend.routes.postlist_by_username_index,
        &[("username", username)],
    )
}

fn absolute(config: &Config, path: &str) -> Result<String, Error> {
    config
        .site
        .base_url
        .join(path)
        .map(String::from)
        .map_err(|err| Error::Feed(err.to_string()))
}

#[derive(Serialize, Debug)]
struct Link {
    title: String,
    url: String,
}

#[derive(Serialize, Debug)]
struct TagLink {
    value: String,
    url: String,
}

#[derive(Serialize, Debug)]
struct CloudLink {
    #[serde(flatten)]
    tag: CloudTag,
    url: String,
}

#[derive(Serialize, Debug)]
struct SiteLinks {
    index: String,
    rss: String,
    atom: String,
    static_base: String,
}

#[derive(Serialize, Debug)]
struct SiteContext<'a> {
    title: &'a str,
    description: &'a str,
    base_url: &'a str,
    links: SiteLinks,
    tagcloud: Vec<CloudLink>,
    pages: Vec<Link>,
}

/// Context every frontend template receives: site data, the tag cloud and
/// the public pages.
async fn site_context(
    state: &AppState,
    conn: &mut SqliteConnection,
    now: OffsetDateTime,
) -> Result<Context, Error> {
    let config = &state.config;
    let routes = &config.frontend.routes;

    let most_used =
        database::most_used_tags(&mut *conn, i64::from(config.frontend.tagcloud.count)).await?;
    let tagcloud = tags::cloud(&most_used, &config.frontend.tagcloud)
        .into_iter()
        .map(|tag| CloudLink {
            url: tag_path(config, &tag.value),
            tag,
        })
        .collect();

    let pages = database::public_pages(&mut *conn, now)
        .await?
        .into_iter()
        .map(|page| Link {
            url: path(config, &routes.page, &[("slug", &page.slug)]),
            title: page.title,
        })
        .collect();

    let mut context = Context::new();
    context.insert(
        "site",
        &SiteContext {
            title: &config.site.title,
            description: &config.site.description,
            base_url: config.site.base_url.as_str(),
            links: SiteLinks {
                index: path(config, &routes.index, &[]),
                rss: path(config, &routes.rss, &[]),
                atom: path(config, &routes.atom, &[]),
                static_base: static_base(config, &routes.static_files),
            },
            tagcloud,
            pages,
        },
    );
    Ok(context)
}

#[derive(Serialize, Debug)]
struct PostView {
    title: String,
    url: String,
    pubdate: String,
    username: String,
    user_url: String,
    summary_html: Option<String>,
    content_html: String,
    tags: Vec<TagLink>,
}

impl PostView {
    fn new(config: &Config, public: PublicPost, tags: Vec<Tag>) -> Self {
        let PublicPost { post, username } = public;
        Self {
            url: post_path(config, &post),
            pubdate: post
                .pubdate
                .map(|pubdate| config.site.post_datetime_format.format(pubdate))
                .unwrap_or_default(),
            user_url: user_path(config, &username),
            username,
            tags: tags
                .into_iter()
                .map(|tag| TagLink {
                    url: tag_path(config, &tag.value),
                    value: tag.value,
                })
                .collect(),
            title: post.title,
            summary_html: post.summary_html,
            content_html: post.content_html.unwrap_or_default(),
        }
    }
}

async fn post_view(
    config: &Config,
    conn: &mut SqliteConnection,
    public: PublicPost,
) -> Result<PostView, Error> {
    let tags = database::tags_for_post(conn, public.post.id).await?;
    Ok(PostView::new(config, public, tags))
}

/// One page of public posts matching `filter`. `link` builds the URL of
/// another page of the same listing.
async fn post_list(
    state: &AppState,
    filter: PostFilter,
    page: u32,
    heading: Option<String>,
    link: impl Fn(u32) -> String,
) -> Result<Html<String>, Error> {
    let config = &state.config;
    let now = model::now();
    let mut conn = state.pool.acquire().await?;

    let total = database::count_public_posts(&mut conn, &filter, now).await?;
    let pagination = Pagination::new(
        page,
        config.frontend.entries_per_page,
        u64::try_from(total).unwrap_or_default(),
    );

    let mut posts = Vec::new();
    let window = if pagination.is_past_end() {
        Vec::new()
    } else {
        database::public_posts(
            &mut conn,
            &filter,
            now,
            Some(pagination.limit()),
            pagination.offset(),
        )
        .await?
    };
    for public in window {
        posts.push(post_view(config, &mut conn, public).await?);
    }

    let mut context = site_context(state, &mut conn, now).await?;
    drop(conn);

    context.insert("heading", &heading);
    context.insert("posts", &posts);
    context.insert("summaries", &config.frontend.summaries);
    context.insert("pagination", &pagination);
    context.insert("prev_url", &pagination.prev.map(&link));
    context.insert("next_url", &pagination.next.map(&link));
    state.render("frontend/post_list.html", &context)
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, Error> {
    let config = state.config.clone();
    post_list(&state, PostFilter::default(), 1, None, |page| {
        path(&config, &config.frontend.routes.postlist, &[("page", &page.to_string())])
    })
    .await
}

async fn postlist(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Html<String>, Error> {
    let config = state.config.clone();
    post_list(&state, PostFilter::default(), app::page_param(&params)?, None, |page| {
        path(&config, &config.frontend.routes.postlist, &[("page", &page.to_string())])
    })
    .await
}

async fn postlist_by_year(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Html<String>, Error> {
    let year: i32 = app::param(&params, "year")?;
    let filter = PostFilter::year(year).ok_or(Error::NotFound)?;

    let config = state.config.clone();
    let year = year.to_string();
    post_list(
        &state,
        filter,
        app::page_param(&params)?,
        Some(format!("Posts from {}", year)),
        |page| {
            path(
                &config,
                &config.frontend.routes.postlist_by_year,
                &[("year", &year), ("page", &page.to_string())],
            )
        },
    )
    .await
}

async fn postlist_by_month(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Html<String>, Error> {
    let year: i32 = app::param(&params, "year")?;
    let month: u8 = app::param(&params, "month")?;
    let filter = PostFilter::month(year, month).ok_or(Error::NotFound)?;

    let config = state.config.clone();
    let (year, month) = (year.to_string(), format!("{:02}", month));
    post_list(
        &state,
        filter,
        app::page_param(&params)?,
        Some(format!("Posts from {}-{}", year, month)),
        |page| {
            path(
                &config,
                &config.frontend.routes.postlist_by_month,
                &[("year", &year), ("month", &month), ("page", &page.to_string())],
            )
        },
    )
    .await
}

async fn postlist_by_tag(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Html<String>, Error> {
    let value: String = app::param(&params, "tag")?;
    let mut conn = state.pool.acquire().await?;
    let tag = database::tag_by_value(&mut conn, &value)
        .await?
        .ok_or(Error::NotFound)?;
    drop(conn);

    let filter = PostFilter {
        tag_id: Some(tag.id),
        ..PostFilter::default()
    };

    let config = state.config.clone();
    post_list(
        &state,
        filter,
        app::page_param(&params)?,
        Some(format!("Posts tagged {}", tag.value)),
        |page| {
            path(
                &config,
                &config.frontend.routes.postlist_by_tag,
                &[("tag", &tag.value), ("page", &page.to_string())],
            )
        },
    )
    .await
}

async fn postlist_by_username(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Html<String>, Error> {
    let username: String = app::param(&params, "username")?;
    let mut conn = state.pool.acquire().await?;
    let user = database::user_by_username(&mut conn, &username)
        .await?
        .ok_or(Error::NotFound)?;
    drop(conn);

    let filter = PostFilter {
        user_id: Some(user.id),
        ..PostFilter::default()
    };

    let config = state.config.clone();
    post_list(
        &state,
        filter,
        app::page_param(&params)?,
        Some(format!("Posts by {}", user.username)),
        |page| {
            path(
                &config,
                &config.frontend.routes.postlist_by_username,
                &[("username", &user.username), ("page", &page.to_string())],
            )
        },
    )
    .await
}

async fn show_post(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Html<String>, Error> {
    let year: i32 = app::param(&params, "year")?;
    let month: u8 = app::param(&params, "month")?;
    let day: u8 = app::param(&params, "day")?;
    let slug: String = app::param(&params, "slug")?;

    let now = model::now();
    let mut conn = state.pool.acquire().await?;
    let public = database::public_post_by_slug(&mut conn, &slug, now)
        .await?
        .ok_or(Error::NotFound)?;

    // the date in the URL has to be the publication date
    let published = public.post.pubdate.map(|pubdate| pubdate.date());
    if published.map(|date| (date.year(), u8::from(date.month()), date.day()))
        != Some((year, month, day))
    {
        return Err(Error::NotFound);
    }

    let post = post_view(&state.config, &mut conn, public).await?;
    let mut context = site_context(&state, &mut conn, now).await?;
    context.insert("post", &post);
    state.render("frontend/post.html", &context)
}

#[derive(Serialize, Debug)]
struct PageView {
    title: String,
    content_html: String,
}

async fn show_page(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Html<String>, Error> {
    let slug: String = app::param(&params, "slug")?;

    let now = model::now();
    let mut conn = state.pool.acquire().await?;
    let page = database::public_page_by_slug(&mut conn, &slug, now)
        .await?
        .ok_or(Error::NotFound)?;

    let mut context = site_context(&state, &mut conn, now).await?;
    context.insert(
        "page",
        &PageView {
            title: page.title,
            content_html: page.content_html.unwrap_or_default(),
        },
    );
    state.render("frontend/page.html", &context)
}

async fn feed_entries(state: &AppState) -> Result<Vec<FeedEntry>, Error> {
    let config = &state.config;
    let mut conn = state.pool.acquire().await?;
    let posts = database::public_posts(
        &mut conn,
        &PostFilter::default(),
        model::now(),
        Some(i64::from(config.frontend.feed_items)),
        0,
    )
    .await?;

    posts
        .into_iter()
        .map(|PublicPost { post, username }| {
            Ok(FeedEntry {
                url: absolute(config, &post_path(config, &post))?,
                author: username,
                pubdate: post.pubdate.unwrap_or(post.createdate),
                lastmoddate: post.lastmoddate,
                summary_html: post.summary_html.filter(|_| config.frontend.summaries),
                content_html: post.content_html.unwrap_or_default(),
                title: post.title,
            })
        })
        .collect()
}

fn feed_meta(config: &Config, route: &str) -> Result<FeedMeta, Error> {
    Ok(FeedMeta {
        title: config.site.title.clone(),
        description: config.site.description.clone(),
        site_url: absolute(config, &path(config, &config.frontend.routes.index, &[]))?,
        feed_url: absolute(config, &path(config, route, &[]))?,
    })
}

async fn rss(State(state): State<AppState>) -> Result<Response, Error> {
    let meta = feed_meta(&state.config, &state.config.frontend.routes.rss)?;
    let xml = feed::rss(&meta, &feed_entries(&state).await?)?;
    Ok(([(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")], xml).into_response())
}

async fn atom(State(state): State<AppState>) -> Result<Response, Error> {
    let meta = feed_meta(&state.config, &state.config.frontend.routes.atom)?;
    let xml = feed::atom(&meta, &feed_entries(&state).await?)?;
    Ok(([(header::CONTENT_TYPE, "application/atom+xml; charset=utf-8")], xml).into_response())
}

pub fn router(state: AppState) -> Router {
    let config = &state.config.frontend;
    let routes = &config.routes;
    let mount = |route: &str| routes::mount(&config.prefix, route);

    let mut router = Router::new()
        .route(&mount(&routes.index), get(index))
        .route(&mount(&routes.postlist), get(postlist))
        .route(&mount(&routes.postlist_by_year_index), get(postlist_by_year))
        .route(&mount(&routes.postlist_by_year), get(postlist_by_year))
        .route(&mount(&routes.postlist_by_month_index), get(postlist_by_month))
        .route(&mount(&routes.postlist_by_month), get(postlist_by_month))
        .route(&mount(&routes.postlist_by_tag_index), get(postlist_by_tag))
        .route(&mount(&routes.postlist_by_tag), get(postlist_by_tag))
        .route(&mount(&routes.postlist_by_username_index), get(postlist_by_username))
        .route(&mount(&routes.postlist_by_username), get(postlist_by_username))
        .route(&mount(&routes.post), get(show_post))
        .route(&mount(&routes.page), get(show_page))
        .route(&mount(&routes.rss), get(rss))
        .route(&mount(&routes.atom), get(atom));

    if let Some(theme_dir) = &config.theme_dir {
        router = router.nest_service(
            &static_base(&state.config, &routes.static_files),
            ServeDir::new(theme_dir.join("static")),
        );
    }
    if let Some(upload_dir) = &config.upload_dir {
        router = router.nest_service(
            &static_base(&state.config, &routes.uploads),
            ServeDir::new(upload_dir.to_path_buf()),
        );
    }

    router
        .layer(middleware::map_response(app::html_not_found))
        .with_state(state)
}
