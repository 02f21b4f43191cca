//! RSS 2.0 output with podcast namespaces.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::with_date_suffix;
use crate::config::FeedConfig;
use crate::feed::Item;
use crate::{FeedhubError, Result};

const NS_ITUNES: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";
const NS_MEDIA: &str = "http://search.yahoo.com/mrss/";
const NS_CONTENT: &str = "http://purl.org/rss/1.0/modules/content/";

/// Name published in `itunes:owner`.
pub const OWNER_NAME: &str = "Feed Hub";

fn xml_err(e: impl Display) -> FeedhubError {
    FeedhubError::Render(format!("failed to write rss: {e}"))
}

/// Render the RSS document of feed `name` from its stored items, newest first.
pub fn render_rss(
    name: &str,
    feed: &FeedConfig,
    base_url: &str,
    items: &[Item],
    now: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let newest = items
        .first()
        .ok_or_else(|| FeedhubError::Render(format!("no items in feed {name}")))?;

    let base_url = base_url.trim_end_matches('/');
    let (link, image) = if base_url.is_empty() {
        (feed.link.clone(), None)
    } else {
        (
            format!("{base_url}/feed/{name}"),
            Some(format!("{base_url}/images/{name}")),
        )
    };

    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let rss = BytesStart::new("rss").with_attributes([
        ("version", "2.0"),
        ("xmlns:itunes", NS_ITUNES),
        ("xmlns:media", NS_MEDIA),
        ("xmlns:content", NS_CONTENT),
    ]);
    w.write_event(Event::Start(rss)).map_err(xml_err)?;
    w.write_event(Event::Start(BytesStart::new("channel")))
        .map_err(xml_err)?;

    text_element(&mut w, "title", &feed.title)?;
    text_element(&mut w, "description", &feed.description)?;
    text_element(&mut w, "link", &link)?;
    if !feed.language.is_empty() {
        text_element(&mut w, "language", &feed.language)?;
    }
    text_element(&mut w, "pubDate", &newest.pub_date)?;
    text_element(&mut w, "lastBuildDate", &now.to_rfc2822())?;
    if !feed.author.is_empty() {
        text_element(&mut w, "itunes:author", &feed.author)?;
    }
    text_element(&mut w, "itunes:explicit", "no")?;

    w.write_event(Event::Start(BytesStart::new("itunes:owner")))
        .map_err(xml_err)?;
    text_element(&mut w, "itunes:name", OWNER_NAME)?;
    text_element(&mut w, "itunes:email", &feed.owner_email)?;
    w.write_event(Event::End(BytesEnd::new("itunes:owner")))
        .map_err(xml_err)?;

    if let Some(image) = &image {
        empty_element(&mut w, "itunes:image", &[("href", image)])?;
        empty_element(&mut w, "media:thumbnail", &[("url", image)])?;
    }

    for item in items {
        write_item(&mut w, feed, item)?;
    }

    w.write_event(Event::End(BytesEnd::new("channel")))
        .map_err(xml_err)?;
    w.write_event(Event::End(BytesEnd::new("rss")))
        .map_err(xml_err)?;

    Ok(w.into_inner())
}

fn write_item(w: &mut Writer<Vec<u8>>, feed: &FeedConfig, item: &Item) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new("item")))
        .map_err(xml_err)?;

    let title = with_date_suffix(&item.title, item.published_at, feed.ext_date);
    text_element(w, "title", &title)?;
    text_element(w, "link", &item.link)?;
    cdata_element(w, "description", &item.description)?;
    text_element(w, "guid", &item.guid)?;
    if let Some(content) = item.content.as_deref().filter(|c| !c.is_empty()) {
        cdata_element(w, "content:encoded", content)?;
    }
    text_element(w, "pubDate", &item.pub_date)?;
    if let Some(author) = item.author.as_deref().filter(|a| !a.is_empty()) {
        text_element(w, "author", author)?;
    }
    if let Some(duration) = item.duration.as_deref().filter(|d| !d.is_empty()) {
        text_element(w, "itunes:duration", duration)?;
    }
    if let Some(enclosure) = &item.enclosure {
        let length = enclosure.length.to_string();
        empty_element(
            w,
            "enclosure",
            &[
                ("url", &enclosure.url),
                ("length", &length),
                ("type", &enclosure.content_type),
            ],
        )?;
    }

    w.write_event(Event::End(BytesEnd::new("item")))
        .map_err(xml_err)?;
    Ok(())
}

fn text_element(w: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    w.write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

/// HTML payloads go into CDATA; a literal `]]>` is split across sections.
fn cdata_element(w: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    for part in BytesCData::escaped(text) {
        w.write_event(Event::CData(part)).map_err(xml_err)?;
    }
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

fn empty_element(w: &mut Writer<Vec<u8>>, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let elem = BytesStart::new(name).with_attributes(attrs.iter().copied());
    w.write_event(Event::Empty(elem)).map_err(xml_err)?;
    Ok(())
}
