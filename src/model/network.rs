use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime, PrimitiveDateTime};

use crate::config::DateTimeFormat;
use crate::model::{Format, Page, Post, PublicPost, Status, Tag};

/// Field name to message, in the order the form shows them.
pub type FieldErrors = IndexMap<&'static str, String>;

#[derive(Deserialize, Debug)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Post or page editor form. Every field is text so a half-filled form
/// can be shown back to the user unchanged.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct EntryForm {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub tags: String,
    pub pubdate: String,
    pub format: String,
    pub status: String,
}

/// An [`EntryForm`] that passed validation.
#[derive(Debug, Clone)]
pub struct ValidEntry {
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub tags: Vec<String>,
    pub pubdate: Option<OffsetDateTime>,
    pub format: Format,
    pub status: Status,
}

fn format_pubdate(pubdate: Option<OffsetDateTime>) -> String {
    pubdate
        .and_then(|pubdate| {
            pubdate
                .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
                .ok()
        })
        .unwrap_or_default()
}

/// `YYYY-MM-DD HH:MM`, taken as UTC.
pub fn parse_pubdate(value: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day] [hour]:[minute]"),
    )
    .ok()
    .map(PrimitiveDateTime::assume_utc)
}

impl EntryForm {
    pub fn from_post(post: &Post, tags: &[Tag]) -> Self {
        Self {
            title: post.title.clone(),
            summary: post.summary.clone().unwrap_or_default(),
            content: post.content.clone(),
            tags: tags
                .iter()
                .map(|tag| tag.value.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            pubdate: format_pubdate(post.pubdate),
            format: post.format_id.to_string(),
            status: post.status_id.to_string(),
        }
    }

    pub fn from_page(page: &Page) -> Self {
        Self {
            title: page.title.clone(),
            content: page.content.clone(),
            pubdate: format_pubdate(page.pubdate),
            format: page.format_id.to_string(),
            status: page.status_id.to_string(),
            ..Self::default()
        }
    }

    pub fn validate(&self, formats: &[Format], statuses: &[Status]) -> Result<ValidEntry, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.insert("title", "This field is required.".into());
        }
        if self.content.trim().is_empty() {
            errors.insert("content", "This field is required.".into());
        }

        let format = self
            .format
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|id| formats.iter().find(|format| format.id == id));
        if format.is_none() {
            errors.insert("format", "Not a valid choice.".into());
        }

        let status = self
            .status
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|id| statuses.iter().find(|status| status.id == id));
        if status.is_none() {
            errors.insert("status", "Not a valid choice.".into());
        }

        let pubdate = match self.pubdate.trim() {
            "" => None,
            value => {
                let parsed = parse_pubdate(value);
                if parsed.is_none() {
                    errors.insert("pubdate", "Expected a date as YYYY-MM-DD HH:MM.".into());
                }
                parsed
            }
        };

        match (format, status) {
            (Some(format), Some(status)) if errors.is_empty() => Ok(ValidEntry {
                title: title.to_string(),
                summary: Some(self.summary.trim())
                    .filter(|summary| !summary.is_empty())
                    .map(str::to_string),
                content: self.content.clone(),
                tags: crate::tags::parse_tag_list(&self.tags),
                pubdate,
                format: format.clone(),
                status: status.clone(),
            }),
            _ => Err(errors),
        }
    }
}

/// The only post fields the API exposes.
#[derive(Serialize, Debug)]
pub struct PublicPostJson {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub summary_html: Option<String>,
    pub content_html: Option<String>,
    pub pubdate: String,
    pub lastmoddate: String,
    pub username: String,
}

impl PublicPostJson {
    pub fn new(public: PublicPost, datetime_format: &DateTimeFormat) -> Self {
        let PublicPost { post, username } = public;
        Self {
            pubdate: post
                .pubdate
                .map(|pubdate| datetime_format.format(pubdate))
                .unwrap_or_default(),
            lastmoddate: datetime_format.format(post.lastmoddate),
            title: post.title,
            slug: post.slug,
            content: post.content,
            summary_html: post.summary_html,
            content_html: post.content_html,
            username,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ValueJson {
    pub value: String,
}

#[derive(Serialize, Debug)]
pub struct UsernameJson {
    pub username: String,
}

#[derive(Serialize, Debug)]
pub struct PostsJson<T> {
    pub posts: Vec<T>,
}

#[derive(Serialize, Debug)]
pub struct StatusesJson {
    pub statuses: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct TagsJson {
    pub tags: Vec<String>,
}
