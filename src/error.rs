use crate::markup::MarkupError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not found")]
    NotFound,

    #[error("invalid request: {0}")]
    InvalidJson(String),

    #[error(transparent)]
    Markup(#[from] MarkupError),

    #[error("database: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("template: {0}")]
    Template(#[from] tera::Error),

    #[error("session: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("feed: {0}")]
    Feed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
