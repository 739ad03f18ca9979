use crate::fetcher::Fetcher;
use crate::types::{FetchConfig, Result, ShowTransmissionError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fmt;
use tracing::{debug, info};

/// One `<item>` of a show feed, as found in the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeedEntry {
    pub published_parsed: Option<String>,
    pub link: Option<String>,
    pub showrss_episode: Option<String>,
    pub showrss_info_hash: Option<String>,
    pub showrss_showname: Option<String>,
    pub showrss_showid: Option<String>,
    pub title: Option<String>,
}

/// A released episode ready to hand to the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub info_hash: String,
    pub title: String,
    pub link: String,
    pub show_name: String,
    pub show_id: Option<String>,
    pub episode: Option<String>,
    pub published: DateTime<Utc>,
}

impl FeedItem {
    /// Show name reduced to characters that are safe in a single path component.
    pub fn directory_name(&self) -> String {
        directory_name(&self.show_name)
    }
}

impl fmt::Display for FeedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

impl TryFrom<RawFeedEntry> for FeedItem {
    type Error = ShowTransmissionError;

    fn try_from(raw: RawFeedEntry) -> Result<Self> {
        let published = required(raw.published_parsed, "published_parsed")?;
        let published = DateTime::parse_from_rfc2822(published.trim())
            .map_err(|e| {
                ShowTransmissionError::Parse(format!("Invalid publication date '{}': {}", published, e))
            })?
            .with_timezone(&Utc);

        Ok(Self {
            info_hash: required(raw.showrss_info_hash, "showrss_info_hash")?,
            title: required(raw.title, "title")?,
            link: required(raw.link, "link")?,
            show_name: required(raw.showrss_showname, "showrss_showname")?,
            show_id: raw.showrss_showid,
            episode: raw.showrss_episode,
            published,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ShowTransmissionError::Parse(format!(
            "Feed entry is missing required field '{}'",
            field
        ))),
    }
}

fn is_valid_file_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '(' | ')')
}

/// Safe single path component for a show; empty when nothing usable remains.
pub fn directory_name(show_name: &str) -> String {
    let name: String = show_name
        .replace(' ', "_")
        .chars()
        .filter(|c| is_valid_file_char(*c))
        .collect();
    // "." and ".." would resolve outside the show folder
    if name.chars().all(|c| c == '.') {
        return String::new();
    }
    name
}

/// Parses a show RSS document into raw entries, in document order.
///
/// Show fields are read from either the `showrss:` or the `tv:` namespace prefix.
pub fn parse_show_feed(xml: &str) -> Result<Vec<RawFeedEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current_item: Option<RawFeedEntry> = None;
    let mut current_element = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = element_name(&e);
                if name == "item" {
                    current_item = Some(RawFeedEntry::default());
                }
                current_element = name;
            }
            Ok(Event::Empty(e)) => {
                if let Some(ref mut item) = current_item {
                    if element_name(&e) == "enclosure" && item.link.is_none() {
                        item.link = attribute(&e, b"url");
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"item" {
                    if let Some(item) = current_item.take() {
                        entries.push(item);
                    }
                }
                current_element.clear();
            }
            Ok(Event::Text(e)) => {
                if let Some(ref mut item) = current_item {
                    let text = e
                        .unescape()
                        .map_err(|e| ShowTransmissionError::Parse(format!("XML parse error: {}", e)))?;
                    assign_field(item, &current_element, text.into_owned());
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(ref mut item) = current_item {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    assign_field(item, &current_element, text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ShowTransmissionError::Parse(format!("XML parse error: {}", e))),
            _ => {}
        }
    }

    debug!("Parsed {} feed entries", entries.len());
    Ok(entries)
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn assign_field(item: &mut RawFeedEntry, element: &str, text: String) {
    if text.is_empty() {
        return;
    }
    let slot = match element {
        "title" => &mut item.title,
        "link" => &mut item.link,
        "pubDate" => &mut item.published_parsed,
        "showrss:info_hash" | "tv:info_hash" => &mut item.showrss_info_hash,
        "showrss:showname" | "tv:show_name" => &mut item.showrss_showname,
        "showrss:showid" | "tv:show_id" => &mut item.showrss_showid,
        "showrss:episode" | "tv:episode_id" => &mut item.showrss_episode,
        _ => return,
    };
    *slot = Some(text);
}

/// Produces the current items of the monitored feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    fn location(&self) -> &str;

    async fn fetch_items(&self) -> Result<Vec<FeedItem>>;
}

pub struct ShowRssFeed {
    location: String,
    fetcher: Fetcher,
}

impl ShowRssFeed {
    pub fn new(location: impl Into<String>, config: FetchConfig) -> Result<Self> {
        Ok(Self {
            location: location.into(),
            fetcher: Fetcher::new(config)?,
        })
    }
}

#[async_trait]
impl FeedSource for ShowRssFeed {
    fn location(&self) -> &str {
        &self.location
    }

    async fn fetch_items(&self) -> Result<Vec<FeedItem>> {
        info!("Parsing feed '{}'", self.location);
        let content = self.fetcher.fetch(&self.location).await?;
        let items = parse_show_feed(&content)?
            .into_iter()
            .map(FeedItem::try_from)
            .collect::<Result<Vec<_>>>()?;
        info!("Feed '{}' lists {} episodes", self.location, items.len());
        Ok(items)
    }
}
