//! RSS 2.0 and Atom documents for the latest public posts.

use atom_syndication::{Content, Entry, FixedDateTime, Link, Person, Text};
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder};
use time::{
    format_description::well_known::{Rfc2822, Rfc3339},
    OffsetDateTime,
};

use crate::Error;

/// Channel level data shared by both feed flavours.
#[derive(Debug, Clone)]
pub struct FeedMeta {
    pub title: String,
    pub description: String,
    /// Absolute URL of the site front page.
    pub site_url: String,
    /// Absolute URL of the feed itself.
    pub feed_url: String,
}

#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    /// Absolute URL of the post.
    pub url: String,
    pub author: String,
    pub pubdate: OffsetDateTime,
    pub lastmoddate: OffsetDateTime,
    pub summary_html: Option<String>,
    pub content_html: String,
}

fn format(
    value: OffsetDateTime,
    description: &impl time::formatting::Formattable,
) -> Result<String, Error> {
    value
        .format(description)
        .map_err(|err| Error::Feed(err.to_string()))
}

pub fn rss(meta: &FeedMeta, entries: &[FeedEntry]) -> Result<String, Error> {
    let items = entries
        .iter()
        .map(|entry| {
            Ok(ItemBuilder::default()
                .title(entry.title.clone())
                .link(entry.url.clone())
                .guid(
                    GuidBuilder::default()
                        .permalink(true)
                        .value(entry.url.clone())
                        .build(),
                )
                .description(entry.summary_html.clone())
                .content(entry.content_html.clone())
                .author(entry.author.clone())
                .pub_date(format(entry.pubdate, &Rfc2822)?)
                .build())
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let channel = ChannelBuilder::default()
        .title(meta.title.clone())
        .link(meta.site_url.clone())
        .description(meta.description.clone())
        .generator("imposter".to_string())
        .items(items)
        .build();

    Ok(channel.to_string())
}

fn atom_datetime(value: OffsetDateTime) -> Result<FixedDateTime, Error> {
    FixedDateTime::parse_from_rfc3339(&format(value, &Rfc3339)?)
        .map_err(|err| Error::Feed(err.to_string()))
}

fn alternate(href: &str) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel("alternate");
    link
}

pub fn atom(meta: &FeedMeta, entries: &[FeedEntry]) -> Result<String, Error> {
    let mut atom_entries = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut author = Person::default();
        author.set_name(entry.author.clone());

        let mut content = Content::default();
        content.set_content_type("html".to_string());
        content.set_value(entry.content_html.clone());

        let mut atom_entry = Entry::default();
        atom_entry.set_id(entry.url.clone());
        atom_entry.set_title(entry.title.clone());
        atom_entry.set_links(vec![alternate(&entry.url)]);
        atom_entry.set_authors(vec![author]);
        atom_entry.set_published(Some(atom_datetime(entry.pubdate)?));
        atom_entry.set_updated(atom_datetime(entry.lastmoddate)?);
        atom_entry.set_summary(entry.summary_html.clone().map(Text::html));
        atom_entry.set_content(Some(content));
        atom_entries.push(atom_entry);
    }

    let updated = match entries.iter().map(|entry| entry.lastmoddate).max() {
        Some(updated) => updated,
        None => crate::model::now(),
    };

    let mut self_link = Link::default();
    self_link.set_href(meta.feed_url.clone());
    self_link.set_rel("self");

    let mut feed = atom_syndication::Feed::default();
    feed.set_id(meta.site_url.clone());
    feed.set_title(meta.title.clone());
    if !meta.description.is_empty() {
        feed.set_subtitle(Text::plain(meta.description.clone()));
    }
    feed.set_updated(atom_datetime(updated)?);
    feed.set_links(vec![alternate(&meta.site_url), self_link]);
    feed.set_entries(atom_entries);

    let xml = feed
        .write_to(Vec::new())
        .map_err(|err| Error::Feed(err.to_string()))?;
    String::from_utf8(xml).map_err(|err| Error::Feed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn meta() -> FeedMeta {
        FeedMeta {
            title: "Imposter".into(),
            description: "Another weblog".into(),
            site_url: "http://example.com/".into(),
            feed_url: "http://example.com/feed/atom".into(),
        }
    }

    fn entries() -> Vec<FeedEntry> {
        vec![FeedEntry {
            title: "Hello & welcome".into(),
            url: "http://example.com/2010/05/04/hello".into(),
            author: "admin".into(),
            pubdate: datetime!(2010-05-04 13:37 UTC),
            lastmoddate: datetime!(2010-05-05 08:00 UTC),
            summary_html: None,
            content_html: "<p>Body</p>".into(),
        }]
    }

    #[test]
    fn rss_lists_posts() {
        let xml = rss(&meta(), &entries()).unwrap();
        assert!(xml.contains("<rss"), "{}", xml);
        assert!(xml.contains("<link>http://example.com/2010/05/04/hello</link>"));
        assert!(xml.contains("Tue, 04 May 2010 13:37:00 +0000"), "{}", xml);
        assert!(xml.contains("Hello &amp; welcome"));
    }

    #[test]
    fn atom_lists_posts() {
        let xml = atom(&meta(), &entries()).unwrap();
        assert!(xml.contains("<feed"), "{}", xml);
        assert!(xml.contains("<id>http://example.com/2010/05/04/hello</id>"));
        assert!(xml.contains("2010-05-05T08:00:00+00:00"), "{}", xml);
        assert!(xml.contains("rel=\"self\""));
    }

    #[test]
    fn empty_feeds_are_valid_documents() {
        assert!(rss(&meta(), &[]).unwrap().contains("<channel>"));
        assert!(atom(&meta(), &[]).unwrap().contains("<feed"));
    }
}
