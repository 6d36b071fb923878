#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use imposter::{
    admin, api,
    app::AppState,
    config::Config,
    db, frontend,
};
use sqlx::SqlitePool;
use tower::ServiceExt;

pub const SECRET: &str = "seed";
pub const DRAFT: &str = "1";
pub const PUBLIC: &str = "3";
pub const REST: &str = "1";
pub const MARKDOWN: &str = "2";

pub fn config() -> Arc<Config> {
    Arc::new(
        toml::from_str(
            r#"
            [site]
            title = "Imposter test"
            description = "Another weblog"
            base_url = "http://example.com/"
            secret_key = "seed"

            [db]
            url = "sqlite::memory:"
            "#,
        )
        .unwrap(),
    )
}

pub struct Site {
    pub pool: SqlitePool,
    pub admin: Router,
    pub frontend: Router,
    pub api: Router,
}

/// Installed in-memory database with user `admin` / `secret` and the
/// welcome post.
pub async fn site() -> Site {
    let pool = db::memory().await.unwrap();
    db::install(&pool, SECRET, "admin", "secret").await.unwrap();

    let config = config();
    let state = AppState::new(pool.clone(), config, None).unwrap();
    Site {
        admin: admin::router(state.clone()),
        frontend: frontend::router(state.clone()),
        api: api::router(state),
        pool,
    }
}

pub async fn get(router: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    let mut request = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_form(
    router: &Router,
    uri: &str,
    cookie: Option<&str>,
    form: &[(&str, &str)],
) -> Response<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    let body = serde_urlencoded::to_string(form).unwrap();
    router
        .clone()
        .oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

pub async fn body(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

/// Logs in and returns the session cookie as sent back by a browser.
pub async fn login(router: &Router, username: &str, password: &str) -> String {
    let response = post_form(
        router,
        "/login",
        None,
        &[("username", username), ("password", password)],
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    cookie.split(';').next().unwrap().to_string()
}

/// Saves a new post through the admin and returns its id.
pub async fn new_post(admin: &Router, cookie: &str, form: &[(&str, &str)]) -> i64 {
    let response = post_form(admin, "/post/new/save", Some(cookie), form).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    edited_id(&location(&response))
}

/// Id in an `/post/{id}/edit` redirect.
pub fn edited_id(location: &str) -> i64 {
    location
        .trim_start_matches("/post/")
        .trim_start_matches("/page/")
        .trim_end_matches("/edit")
        .parse()
        .unwrap()
}
