use indexmap::IndexMap;
use serde::{de::Visitor, Deserialize};
use std::{
    net::SocketAddr,
    ops::Deref,
    path::{Path, PathBuf},
};
use time::{format_description::OwnedFormatItem, macros::format_description};
use url::Url;

use crate::routes::{AdminRoutes, ApiRoutes, FrontendRoutes};

/// Names the config file when `--config` is not given.
pub const CONFIG_ENV: &str = "IMPOSTER_CONFIG";

/// Overrides `db.url` from the config file.
pub const DATABASE_ENV: &str = "IMPOSTER_DATABASE_URL";

#[derive(Deserialize, Debug, Clone)]
pub struct SiteConfig {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub base_url: Url,
    /// Seed for password hashes.
    pub secret_key: String,
    #[serde(default)]
    pub post_datetime_format: DateTimeFormat,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DbConfig {
    pub url: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AdminConfig {
    pub bind: SocketAddr,
    pub prefix: String,
    pub routes: AdminRoutes,
    pub theme_dir: Option<ValidPath>,
    pub entries_per_page: u32,
    /// Placeholders replaced in summary and content before compiling.
    pub repl_tags: IndexMap<String, String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5001)),
            prefix: String::new(),
            routes: AdminRoutes::default(),
            theme_dir: None,
            entries_per_page: 10,
            repl_tags: IndexMap::new(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct TagCloudConfig {
    pub count: u32,
    pub min_fontsize: u32,
    pub max_fontsize: u32,
}

impl Default for TagCloudConfig {
    fn default() -> Self {
        Self {
            count: 100,
            min_fontsize: 85,
            max_fontsize: 200,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FrontendConfig {
    pub bind: SocketAddr,
    pub prefix: String,
    pub routes: FrontendRoutes,
    /// Directory of the active theme, holding `templates/` and `static/`.
    pub theme_dir: Option<ValidPath>,
    pub upload_dir: Option<ValidPath>,
    pub entries_per_page: u32,
    pub feed_items: u32,
    /// Show summaries instead of full posts in lists and feeds.
    pub summaries: bool,
    pub tagcloud: TagCloudConfig,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            prefix: String::new(),
            routes: FrontendRoutes::default(),
            theme_dir: None,
            upload_dir: None,
            entries_per_page: 10,
            feed_items: 10,
            summaries: true,
            tagcloud: TagCloudConfig::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub bind: SocketAddr,
    pub prefix: String,
    pub routes: ApiRoutes,
    pub feed_items: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5002)),
            prefix: String::new(),
            routes: ApiRoutes::default(),
            feed_items: 10,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub site: SiteConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, crate::Error> {
        let config: Config = toml::from_str(&std::fs::read_to_string(path)?)?;
        Ok(config.with_database_url(std::env::var(DATABASE_ENV).ok()))
    }

    pub fn with_database_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.db.url = url;
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct ValidPath(PathBuf);

impl<'de> Deserialize<'de> for ValidPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ValidPathVisitor;
        impl Visitor<'_> for ValidPathVisitor {
            type Value = ValidPath;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "a valid path")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ValidPath(
                    PathBuf::from(v).canonicalize().map_err(E::custom)?,
                ))
            }
        }

        deserializer.deserialize_str(ValidPathVisitor)
    }
}

impl Deref for ValidPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.0.as_path()
    }
}

/// A `time` format description, parsed once when the config is read.
#[derive(Debug, Clone)]
pub struct DateTimeFormat {
    pub source: String,
    pub items: OwnedFormatItem,
}

impl DateTimeFormat {
    pub const DEFAULT: &'static str = "[year]-[month]-[day] [hour]:[minute]";

    pub fn parse(source: &str) -> Result<Self, time::error::InvalidFormatDescription> {
        Ok(Self {
            source: source.to_string(),
            items: time::format_description::parse_owned::<2>(source)?,
        })
    }

    pub fn format(&self, value: time::OffsetDateTime) -> String {
        value.format(&self.items).unwrap_or_else(|err| {
            tracing::warn!("could not format {} with {:?}: {}", value, self.source, err);
            value.to_string()
        })
    }
}

impl Default for DateTimeFormat {
    fn default() -> Self {
        Self {
            source: Self::DEFAULT.to_string(),
            items: OwnedFormatItem::from(format_description!(
                "[year]-[month]-[day] [hour]:[minute]"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for DateTimeFormat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DateTimeFormatVisitor;
        impl Visitor<'_> for DateTimeFormatVisitor {
            type Value = DateTimeFormat;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "a time format description")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                DateTimeFormat::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(DateTimeFormatVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const MINIMAL: &str = r#"
        [site]
        title = "Imposter"
        base_url = "http://example.org/blog"
        secret_key = "s3cret"

        [db]
        url = "sqlite://imposter.db"
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.frontend.entries_per_page, 10);
        assert_eq!(config.frontend.feed_items, 10);
        assert_eq!(config.frontend.tagcloud.min_fontsize, 85);
        assert_eq!(config.frontend.tagcloud.max_fontsize, 200);
        assert_eq!(config.api.bind.port(), 5002);
        assert!(config.admin.repl_tags.is_empty());
        assert_eq!(config.frontend.routes.index, "/");
    }

    #[test]
    fn placeholder_table_keeps_order() {
        let text = format!(
            "{MINIMAL}\n[admin.repl_tags]\n\"##UPLOADS##\" = \"https://example.org/uploads\"\n\"##ME##\" = \"me\"\n"
        );
        let config: Config = toml::from_str(&text).unwrap();
        let keys: Vec<_> = config.admin.repl_tags.keys().cloned().collect();
        assert_eq!(keys, vec!["##UPLOADS##", "##ME##"]);
    }

    #[test]
    fn database_override_wins() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        let config = config.with_database_url(Some("sqlite::memory:".into()));
        assert_eq!(config.db.url, "sqlite::memory:");
    }

    #[test]
    fn missing_theme_dir_is_rejected() {
        let text = format!("{MINIMAL}\n[frontend]\ntheme_dir = \"/does/not/exist/anywhere\"\n");
        assert!(toml::from_str::<Config>(&text).is_err());
    }

    #[test]
    fn datetime_format_is_applied() {
        let format = DateTimeFormat::default();
        assert_eq!(format.format(datetime!(2010-05-04 13:07 UTC)), "2010-05-04 13:07");

        let custom = DateTimeFormat::parse("[day]/[month]/[year]").unwrap();
        assert_eq!(custom.format(datetime!(2010-05-04 13:07 UTC)), "04/05/2010");
    }
}
