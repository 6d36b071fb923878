//! Pieces shared by the three web applications.

use std::{collections::HashMap, net::SocketAddr, str::FromStr, sync::Arc};

use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Router,
};
use sqlx::SqlitePool;
use tera::{Context, Tera};
use tower_http::trace::TraceLayer;

use crate::config::{Config, ValidPath};
use crate::{templates, Error};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub templates: Arc<Tera>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        config: Arc<Config>,
        theme_dir: Option<&ValidPath>,
    ) -> Result<Self, Error> {
        Ok(Self {
            pool,
            config,
            templates: Arc::new(templates::load(theme_dir)?),
        })
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<Html<String>, Error> {
        Ok(Html(self.templates.render(name, context)?))
    }
}

/// Reads a path capture. Anything missing or malformed means the route does
/// not name an existing resource.
pub fn param<T: FromStr>(params: &HashMap<String, String>, name: &str) -> Result<T, Error> {
    params
        .get(name)
        .and_then(|value| value.parse().ok())
        .ok_or(Error::NotFound)
}

/// Like [`param`], defaulting to the first page for index routes.
pub fn page_param(params: &HashMap<String, String>) -> Result<u32, Error> {
    match params.get("page") {
        Some(_) => param(params, "page"),
        None => Ok(1),
    }
}

/// The HTML applications answer a missing resource with a page rather than
/// the JSON body the API uses. Use with `axum::middleware::map_response`.
pub async fn html_not_found(response: Response) -> Response {
    if response.status() != StatusCode::NOT_FOUND {
        return response;
    }
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"));
    if is_html {
        return response;
    }

    (StatusCode::NOT_FOUND, Html("<h1>Not found</h1>")).into_response()
}

pub async fn serve(name: &str, router: Router, bind: SocketAddr) -> Result<(), Error> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("{} listening on http://{}", name, bind);
    axum::serve(listener, router.layer(TraceLayer::new_for_http())).await?;
    Ok(())
}
