//! Imposter, a small weblog split into three applications that share one
//! SQLite schema: an authenticated admin editor, a public HTML frontend and
//! a public JSON API.

pub mod admin;
pub mod api;
pub mod app;
pub mod compat;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod frontend;
pub mod markup;
pub mod model;
pub mod paginate;
pub mod routes;
pub mod slug;
pub mod tags;
pub mod templates;

pub use error::Error;
