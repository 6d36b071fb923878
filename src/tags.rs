//! Tag usage counting, tag-list parsing and tag cloud sizing.

use serde::Serialize;
use sqlx::SqliteConnection;
use time::OffsetDateTime;

use crate::config::TagCloudConfig;
use crate::model::{database, Tag};

/// Recounts the public posts carrying `tag_id` and stores the result.
///
/// Always a full recount, never an increment, so a stale count is fixed by
/// the next call.
pub async fn recount(
    conn: &mut SqliteConnection,
    tag_id: i64,
    now: OffsetDateTime,
) -> Result<i64, sqlx::Error> {
    let count = database::count_public_posts_with_tag(&mut *conn, tag_id, now).await?;
    database::set_tag_count(conn, tag_id, count).await?;
    tracing::debug!("tag {} now used by {} public posts", tag_id, count);
    Ok(count)
}

pub async fn recount_all(
    conn: &mut SqliteConnection,
    now: OffsetDateTime,
) -> Result<usize, sqlx::Error> {
    let tags = database::tags(&mut *conn).await?;
    for tag in &tags {
        recount(&mut *conn, tag.id, now).await?;
    }
    tracing::info!("recounted {} tags", tags.len());
    Ok(tags.len())
}

/// Gives a post exactly the tags named in `values`, creating missing ones,
/// then recounts every tag the post held before or holds now.
pub async fn replace_post_tags(
    conn: &mut SqliteConnection,
    post_id: i64,
    values: &[String],
    now: OffsetDateTime,
) -> Result<(), sqlx::Error> {
    let mut affected: Vec<i64> = database::tags_for_post(&mut *conn, post_id)
        .await?
        .into_iter()
        .map(|tag| tag.id)
        .collect();

    let mut tag_ids = Vec::with_capacity(values.len());
    for value in values {
        tag_ids.push(database::get_or_create_tag(&mut *conn, value).await?.id);
    }
    database::set_post_tags(&mut *conn, post_id, &tag_ids).await?;

    for tag_id in tag_ids {
        if !affected.contains(&tag_id) {
            affected.push(tag_id);
        }
    }
    for tag_id in affected {
        recount(&mut *conn, tag_id, now).await?;
    }
    Ok(())
}

/// Splits a comma separated tag field into lower-case values, dropping
/// blanks and repeats.
pub fn parse_tag_list(input: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for value in input.split(',').map(|value| value.trim().to_lowercase()) {
        if !value.is_empty() && !values.contains(&value) {
            values.push(value);
        }
    }
    values
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CloudTag {
    pub value: String,
    pub count: i64,
    /// Font size in percent.
    pub size: u32,
}

/// Sizes `tags` linearly between the configured font-size bounds by where
/// each count sits between the smallest and largest count in the set.
/// When every count is equal all tags get the minimum size.
pub fn cloud(tags: &[Tag], config: &TagCloudConfig) -> Vec<CloudTag> {
    let (Some(min_count), Some(max_count)) = (
        tags.iter().map(|tag| tag.count).min(),
        tags.iter().map(|tag| tag.count).max(),
    ) else {
        return Vec::new();
    };

    let min_size = f64::from(config.min_fontsize.min(config.max_fontsize));
    let max_size = f64::from(config.max_fontsize.max(config.min_fontsize));
    let spread = (max_count - min_count) as f64;

    let mut cloud: Vec<CloudTag> = tags
        .iter()
        .map(|tag| {
            let size = if spread > 0.0 {
                min_size + (max_size - min_size) * (tag.count - min_count) as f64 / spread
            } else {
                min_size
            };

            CloudTag {
                value: tag.value.clone(),
                count: tag.count,
                size: size.round() as u32,
            }
        })
        .collect();

    cloud.sort_by(|a, b| a.value.cmp(&b.value));
    cloud
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(value: &str, count: i64) -> Tag {
        Tag {
            id: 0,
            value: value.to_string(),
            count,
        }
    }

    #[test]
    fn tag_list_is_normalised() {
        assert_eq!(
            parse_tag_list("Rust,  weblog , ,rust,Imposter"),
            vec!["rust", "weblog", "imposter"]
        );
        assert!(parse_tag_list("  ").is_empty());
    }

    #[test]
    fn cloud_interpolates_between_bounds() {
        let config = TagCloudConfig {
            count: 100,
            min_fontsize: 100,
            max_fontsize: 200,
        };
        let cloud = cloud(&[tag("c", 5), tag("a", 1), tag("b", 3)], &config);

        assert_eq!(
            cloud.iter().map(|t| (t.value.as_str(), t.size)).collect::<Vec<_>>(),
            vec![("a", 100), ("b", 150), ("c", 200)]
        );
    }

    #[test]
    fn equal_counts_use_minimum_size() {
        let config = TagCloudConfig::default();
        let cloud = cloud(&[tag("a", 4), tag("b", 4)], &config);
        assert!(cloud.iter().all(|t| t.size == config.min_fontsize));
    }

    #[test]
    fn empty_cloud() {
        assert!(cloud(&[], &TagCloudConfig::default()).is_empty());
    }
}
