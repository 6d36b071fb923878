//! The authenticated editor for posts and pages.

use std::collections::HashMap;

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tera::Context;
use tower_http::services::ServeDir;
use tower_sessions::{MemoryStore, Session, SessionManagerLayer};

use crate::app::{self, AppState};
use crate::compat::MyForm;
use crate::config::Config;
use crate::markup;
use crate::model::{
    self,
    database::{self, EntryKind, EntryWrite},
    network::{EntryForm, FieldErrors, LoginForm},
    Format, Status, FORMAT_MARKDOWN, STATUS_DRAFT, STATUS_PUBLIC,
};
use crate::paginate::Pagination;
use crate::routes;
use crate::{slug, tags, Error};

/// Served under the static route when no theme directory is configured.
const BUILTIN_STATIC: &[(&str, &str)] =
    &[("admin.css", include_str!("../static/admin/admin.css"))];

const USER_ID: &str = "user_id";
const FLASHES: &str = "flashes";

async fn push_flash(session: &Session, message: &str) -> Result<(), Error> {
    let mut flashes: Vec<String> = session.get(FLASHES).await?.unwrap_or_default();
    flashes.push(message.to_string());
    session.insert(FLASHES, flashes).await?;
    Ok(())
}

async fn take_flashes(session: &Session) -> Result<Vec<String>, Error> {
    Ok(session.remove(FLASHES).await?.unwrap_or_default())
}

#[derive(Serialize, Debug)]
struct AdminLinks {
    index: String,
    login: String,
    logout: String,
    posts: String,
    pages: String,
    new_post: String,
    new_page: String,
    recalculate: String,
    static_base: String,
}

impl AdminLinks {
    fn new(config: &Config) -> Self {
        let prefix = config.admin.prefix.as_str();
        let routes = &config.admin.routes;
        Self {
            index: routes::path(prefix, &routes.index, &[]),
            login: routes::path(prefix, &routes.login, &[]),
            logout: routes::path(prefix, &routes.logout, &[]),
            posts: list_path(config, EntryKind::Post, 1),
            pages: list_path(config, EntryKind::Page, 1),
            new_post: routes::path(prefix, &routes.new_post, &[]),
            new_page: routes::path(prefix, &routes.new_page, &[]),
            recalculate: routes::path(prefix, &routes.recalculate_tagcounts, &[]),
            static_base: static_base(config),
        }
    }
}

fn static_base(config: &Config) -> String {
    let route = routes::fill(&config.admin.routes.static_files, &[("path", "")]);
    routes::mount(&config.admin.prefix, route.trim_end_matches('/'))
}

fn list_path(config: &Config, kind: EntryKind, page: u32) -> String {
    let routes = &config.admin.routes;
    let route = match kind {
        EntryKind::Post => &routes.posts_list,
        EntryKind::Page => &routes.pages_list,
    };
    routes::path(&config.admin.prefix, route, &[("page", &page.to_string())])
}

fn edit_path(config: &Config, kind: EntryKind, id: i64) -> String {
    let routes = &config.admin.routes;
    let route = match kind {
        EntryKind::Post => &routes.edit_post,
        EntryKind::Page => &routes.edit_page,
    };
    routes::path(&config.admin.prefix, route, &[("id", &id.to_string())])
}

fn save_path(config: &Config, kind: EntryKind, id: Option<i64>) -> String {
    let routes = &config.admin.routes;
    let (route, id) = match (kind, id) {
        (EntryKind::Post, Some(id)) => (&routes.save_post, id.to_string()),
        (EntryKind::Page, Some(id)) => (&routes.save_page, id.to_string()),
        (EntryKind::Post, None) => (&routes.save_new_post, String::new()),
        (EntryKind::Page, None) => (&routes.save_new_page, String::new()),
    };
    routes::path(&config.admin.prefix, route, &[("id", &id)])
}

fn noun(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Post => "post",
        EntryKind::Page => "page",
    }
}

#[derive(Serialize, Debug)]
struct AdminContext<'a> {
    site_title: &'a str,
    username: Option<&'a str>,
    flashes: Vec<String>,
    links: AdminLinks,
}

async fn context(
    state: &AppState,
    session: &Session,
    username: Option<&str>,
) -> Result<Context, Error> {
    let mut context = Context::new();
    context.insert(
        "admin",
        &AdminContext {
            site_title: &state.config.site.title,
            username,
            flashes: take_flashes(session).await?,
            links: AdminLinks::new(&state.config),
        },
    );
    Ok(context)
}

/// The logged in user. Requests without one are sent to the login form.
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub session: Session,
}

impl CurrentUser {
    async fn load(session: Session, state: &AppState) -> Result<Option<Self>, Error> {
        let Some(id) = session.get::<i64>(USER_ID).await? else {
            return Ok(None);
        };

        let mut conn = state.pool.acquire().await?;
        Ok(database::user_by_id(&mut conn, id)
            .await?
            .map(|user| CurrentUser {
                id: user.id,
                username: user.username,
                session,
            }))
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match CurrentUser::load(session, state).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(Redirect::to(&AdminLinks::new(&state.config).login).into_response()),
            Err(err) => Err(err.into_response()),
        }
    }
}

async fn login_form(
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>, Error> {
    let mut context = context(&state, &session, None).await?;
    context.insert("username", "");
    context.insert("error", &None::<String>);
    state.render("admin/login.html", &context)
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    MyForm(form): MyForm<LoginForm>,
) -> Result<Response, Error> {
    let password = model::hashify(&state.config.site.secret_key, &form.password);
    let mut conn = state.pool.acquire().await?;
    let user = database::user_by_credentials(&mut conn, &form.username, &password).await?;
    drop(conn);

    let Some(user) = user else {
        tracing::info!("failed login for {:?}", form.username);
        let mut context = context(&state, &session, None).await?;
        context.insert("username", &form.username);
        context.insert("error", "Unknown user");
        return Ok(state.render("admin/login.html", &context)?.into_response());
    };

    session.cycle_id().await?;
    session.insert(USER_ID, user.id).await?;
    push_flash(&session, "You were logged in").await?;
    tracing::info!("{} logged in", user.username);

    Ok(Redirect::to(&AdminLinks::new(&state.config).index).into_response())
}

async fn logout(State(state): State<AppState>, user: CurrentUser) -> Result<Redirect, Error> {
    user.session.flush().await?;
    push_flash(&user.session, "You were logged out").await?;
    tracing::info!("{} logged out", user.username);

    Ok(Redirect::to(&AdminLinks::new(&state.config).login))
}

#[derive(Serialize, Debug)]
struct EntryRow {
    title: String,
    status: String,
    /// Visible on the frontend right now.
    live: bool,
    pubdate: String,
    lastmoddate: String,
    edit_url: String,
}

async fn list_entries(
    state: &AppState,
    user: &CurrentUser,
    kind: EntryKind,
    page: u32,
) -> Result<Html<String>, Error> {
    let config = &state.config;
    let mut conn = state.pool.acquire().await?;

    let total = database::count_owned(&mut conn, kind, user.id).await?;
    let pagination = Pagination::new(
        page,
        config.admin.entries_per_page,
        u64::try_from(total).unwrap_or_default(),
    );
    let entries = if pagination.is_past_end() {
        Vec::new()
    } else {
        database::owned_entries(
            &mut conn,
            kind,
            user.id,
            pagination.limit(),
            pagination.offset(),
        )
        .await?
    };
    drop(conn);

    let format = &config.site.post_datetime_format;
    let now = model::now();
    let rows: Vec<EntryRow> = entries
        .into_iter()
        .map(|entry| EntryRow {
            edit_url: edit_path(config, kind, entry.id),
            live: model::is_public(&entry.status, entry.pubdate, now),
            pubdate: entry.pubdate.map(|pubdate| format.format(pubdate)).unwrap_or_default(),
            lastmoddate: format.format(entry.lastmoddate),
            title: entry.title,
            status: entry.status,
        })
        .collect();

    let mut context = context(state, &user.session, Some(&user.username)).await?;
    context.insert("kind", &format!("{}s", noun(kind)));
    context.insert("entries", &rows);
    context.insert("pagination", &pagination);
    context.insert("prev_url", &pagination.prev.map(|page| list_path(config, kind, page)));
    context.insert("next_url", &pagination.next.map(|page| list_path(config, kind, page)));
    state.render("admin/index.html", &context)
}

async fn index(State(state): State<AppState>, user: CurrentUser) -> Result<Html<String>, Error> {
    list_entries(&state, &user, EntryKind::Post, 1).await
}

async fn posts_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Html<String>, Error> {
    list_entries(&state, &user, EntryKind::Post, app::page_param(&params)?).await
}

async fn pages_list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Html<String>, Error> {
    list_entries(&state, &user, EntryKind::Page, app::page_param(&params)?).await
}

struct EditForm<'a> {
    kind: EntryKind,
    id: Option<i64>,
    form: &'a EntryForm,
    errors: &'a FieldErrors,
    formats: &'a [Format],
    statuses: &'a [Status],
}

async fn render_edit(
    state: &AppState,
    user: &CurrentUser,
    edit: EditForm<'_>,
) -> Result<Response, Error> {
    let heading = match edit.id {
        Some(_) => format!("Edit {}", noun(edit.kind)),
        None => format!("New {}", noun(edit.kind)),
    };

    let mut context = context(state, &user.session, Some(&user.username)).await?;
    context.insert("kind", noun(edit.kind));
    context.insert("heading", &heading);
    context.insert("action", &save_path(&state.config, edit.kind, edit.id));
    context.insert("form", edit.form);
    context.insert("errors", edit.errors);
    context.insert("formats", edit.formats);
    context.insert("statuses", edit.statuses);
    Ok(state.render("admin/edit.html", &context)?.into_response())
}

async fn edit_entry(
    state: &AppState,
    user: &CurrentUser,
    kind: EntryKind,
    id: Option<i64>,
) -> Result<Response, Error> {
    let mut conn = state.pool.acquire().await?;
    let formats = database::formats(&mut conn).await?;
    let statuses = database::statuses(&mut conn).await?;

    let form = match (kind, id) {
        (EntryKind::Post, Some(id)) => {
            let post = database::owned_post(&mut conn, user.id, id)
                .await?
                .ok_or(Error::NotFound)?;
            let tags = database::tags_for_post(&mut conn, id).await?;
            EntryForm::from_post(&post, &tags)
        }
        (EntryKind::Page, Some(id)) => {
            let page = database::owned_page(&mut conn, user.id, id)
                .await?
                .ok_or(Error::NotFound)?;
            EntryForm::from_page(&page)
        }
        (_, None) => EntryForm {
            format: formats
                .iter()
                .find(|format| format.value == FORMAT_MARKDOWN)
                .map(|format| format.id.to_string())
                .unwrap_or_default(),
            status: statuses
                .iter()
                .find(|status| status.value == STATUS_DRAFT)
                .map(|status| status.id.to_string())
                .unwrap_or_default(),
            ..EntryForm::default()
        },
    };
    drop(conn);

    let edit = EditForm {
        kind,
        id,
        form: &form,
        errors: &FieldErrors::new(),
        formats: &formats,
        statuses: &statuses,
    };
    render_edit(state, user, edit).await
}

fn id_param(params: &HashMap<String, String>) -> Result<i64, Error> {
    app::param(params, "id")
}

async fn new_post(State(state): State<AppState>, user: CurrentUser) -> Result<Response, Error> {
    edit_entry(&state, &user, EntryKind::Post, None).await
}

async fn edit_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Response, Error> {
    edit_entry(&state, &user, EntryKind::Post, Some(id_param(&params)?)).await
}

async fn new_page(State(state): State<AppState>, user: CurrentUser) -> Result<Response, Error> {
    edit_entry(&state, &user, EntryKind::Page, None).await
}

async fn edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Response, Error> {
    edit_entry(&state, &user, EntryKind::Page, Some(id_param(&params)?)).await
}

/// Validates, compiles and stores one post or page in a single transaction.
/// Invalid input re-renders the form and leaves the database untouched.
async fn save_entry(
    state: &AppState,
    user: &CurrentUser,
    kind: EntryKind,
    id: Option<i64>,
    form: EntryForm,
) -> Result<Response, Error> {
    let created = id.is_none();
    let mut tx = state.pool.begin().await?;

    let existing_slug = match (kind, id) {
        (EntryKind::Post, Some(id)) => database::owned_post(&mut tx, user.id, id)
            .await?
            .map(|post| post.slug),
        (EntryKind::Page, Some(id)) => database::owned_page(&mut tx, user.id, id)
            .await?
            .map(|page| page.slug),
        (_, None) => None,
    };
    if id.is_some() && existing_slug.is_none() {
        return Err(Error::NotFound);
    }

    let formats = database::formats(&mut tx).await?;
    let statuses = database::statuses(&mut tx).await?;
    let mut edit = EditForm {
        kind,
        id,
        form: &form,
        errors: &FieldErrors::new(),
        formats: &formats,
        statuses: &statuses,
    };

    let entry = match form.validate(&formats, &statuses) {
        Ok(entry) => entry,
        Err(errors) => {
            edit.errors = &errors;
            return render_edit(state, user, edit).await;
        }
    };

    let mut errors = FieldErrors::new();
    let format = markup::Format::from_value(&entry.format.value);
    let replacements = &state.config.admin.repl_tags;

    let summary_html = match (kind, &entry.summary) {
        (EntryKind::Post, Some(summary)) => {
            match markup::compile(format, &markup::substitute(summary, replacements)) {
                Ok(html) => Some(html.0),
                Err(err) => {
                    errors.insert("summary", err.to_string());
                    None
                }
            }
        }
        _ => None,
    };
    let content = markup::substitute(&entry.content, replacements);
    let content_html = match markup::compile(format, &content) {
        Ok(html) => html.0,
        Err(err) => {
            errors.insert("content", err.to_string());
            String::new()
        }
    };

    let slug = match existing_slug.filter(|slug| !slug.is_empty()) {
        Some(slug) => slug,
        None => slug::slugify(&entry.title),
    };
    if slug.is_empty() {
        errors.insert(
            "title",
            "The title needs some letters or digits to build a URL from.".into(),
        );
    }

    if !errors.is_empty() {
        edit.errors = &errors;
        return render_edit(state, user, edit).await;
    }

    let now = model::now();
    let pubdate = match entry.pubdate {
        None if entry.status.value == STATUS_PUBLIC => Some(now),
        pubdate => pubdate,
    };

    let write = EntryWrite {
        title: &entry.title,
        slug: &slug,
        summary: entry.summary.as_deref().filter(|_| kind == EntryKind::Post),
        content: &entry.content,
        summary_html: summary_html.as_deref(),
        content_html: &content_html,
        status_id: entry.status.id,
        format_id: entry.format.id,
        pubdate,
        lastmoddate: now,
    };

    let saved = match id {
        Some(id) => database::update_entry(&mut tx, kind, id, &write)
            .await
            .map(|()| id),
        None => database::insert_entry(&mut tx, kind, user.id, now, &write).await,
    };
    let id = match saved {
        Ok(id) => id,
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            errors.insert(
                "title",
                format!("Another {} already uses this title or its URL.", noun(kind)),
            );
            edit.errors = &errors;
            return render_edit(state, user, edit).await;
        }
        Err(err) => return Err(err.into()),
    };

    if kind == EntryKind::Post {
        tags::replace_post_tags(&mut tx, id, &entry.tags, now).await?;
    }
    tx.commit().await?;

    let message = if created {
        format!("New {} was successfully added", noun(kind))
    } else {
        format!("{} updated", capitalized(noun(kind)))
    };
    push_flash(&user.session, &message).await?;
    tracing::info!("{} saved {} {}", user.username, noun(kind), id);

    Ok(Redirect::to(&edit_path(&state.config, kind, id)).into_response())
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

async fn save_new_post(
    State(state): State<AppState>,
    user: CurrentUser,
    MyForm(form): MyForm<EntryForm>,
) -> Result<Response, Error> {
    save_entry(&state, &user, EntryKind::Post, None, form).await
}

async fn save_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(params): Path<HashMap<String, String>>,
    MyForm(form): MyForm<EntryForm>,
) -> Result<Response, Error> {
    save_entry(&state, &user, EntryKind::Post, Some(id_param(&params)?), form).await
}

async fn save_new_page(
    State(state): State<AppState>,
    user: CurrentUser,
    MyForm(form): MyForm<EntryForm>,
) -> Result<Response, Error> {
    save_entry(&state, &user, EntryKind::Page, None, form).await
}

async fn save_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(params): Path<HashMap<String, String>>,
    MyForm(form): MyForm<EntryForm>,
) -> Result<Response, Error> {
    save_entry(&state, &user, EntryKind::Page, Some(id_param(&params)?), form).await
}

async fn recalculate_tagcounts(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Redirect, Error> {
    let mut tx = state.pool.begin().await?;
    let count = tags::recount_all(&mut tx, model::now()).await?;
    tx.commit().await?;

    push_flash(&user.session, &format!("Recalculated {} tag counts", count)).await?;
    Ok(Redirect::to(&AdminLinks::new(&state.config).index))
}

async fn builtin_static(Path(params): Path<HashMap<String, String>>) -> Result<Response, Error> {
    let path: String = app::param(&params, "path")?;
    let (_, css) = BUILTIN_STATIC
        .iter()
        .find(|(name, _)| *name == path)
        .ok_or(Error::NotFound)?;
    Ok(([(header::CONTENT_TYPE, "text/css; charset=utf-8")], *css).into_response())
}

pub fn router(state: AppState) -> Router {
    let config = &state.config.admin;
    let routes = &config.routes;
    let mount = |route: &str| routes::mount(&config.prefix, route);

    let mut router = Router::new()
        .route(&mount(&routes.login), get(login_form).post(login))
        .route(&mount(&routes.logout), get(logout))
        .route(&mount(&routes.index), get(index))
        .route(&mount(&routes.posts_list), get(posts_list))
        .route(&mount(&routes.pages_list), get(pages_list))
        .route(&mount(&routes.new_post), get(new_post))
        .route(&mount(&routes.edit_post), get(edit_post))
        .route(&mount(&routes.save_new_post), post(save_new_post))
        .route(&mount(&routes.save_post), post(save_post))
        .route(&mount(&routes.new_page), get(new_page))
        .route(&mount(&routes.edit_page), get(edit_page))
        .route(&mount(&routes.save_new_page), post(save_new_page))
        .route(&mount(&routes.save_page), post(save_page))
        .route(&mount(&routes.recalculate_tagcounts), post(recalculate_tagcounts));

    router = match &config.theme_dir {
        Some(theme_dir) => router.nest_service(
            &static_base(&state.config),
            ServeDir::new(theme_dir.join("static")),
        ),
        None => router.route(&mount(&routes.static_files), get(builtin_static)),
    };

    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.config.site.base_url.scheme() == "https");

    router
        .layer(sessions)
        .layer(middleware::map_response(app::html_not_found))
        .with_state(state)
}
