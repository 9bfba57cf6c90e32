use super::models::{FeedChannel, FeedItem};
use super::xml::{parse_xml, XmlElement};
use crate::{Error, Result};

/// Channel title used when an RDF channel carries none
pub const UNTITLED: &str = "Untitled";

/// Number of raw characters quoted in an unrecognized-root error
const RAW_PREVIEW_CHARS: usize = 200;

/// A feed document classified by dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedDocument {
    /// RSS 2.0: items are nested under the channel
    Rss2 { channel: XmlElement },
    /// RSS 1.0/RDF: items are siblings of the channel under the RDF root
    Rdf {
        channel: XmlElement,
        items: Vec<XmlElement>,
    },
}

impl FeedDocument {
    /// Decide the dialect from the root element's shape
    pub fn classify(root: XmlElement, raw: &str) -> Result<Self> {
        match root.name.as_str() {
            "rss" => {
                if let Some(channel) = root.children.into_iter().find(|c| c.name == "channel") {
                    return Ok(FeedDocument::Rss2 { channel });
                }
            }
            "rdf:RDF" => {
                let mut channel = None;
                let mut items = Vec::new();
                for child in root.children {
                    match child.name.as_str() {
                        "channel" if channel.is_none() => channel = Some(child),
                        "item" => items.push(child),
                        _ => {}
                    }
                }
                if let Some(channel) = channel {
                    return Ok(FeedDocument::Rdf { channel, items });
                }
            }
            _ => {}
        }

        let preview: String = raw.chars().take(RAW_PREVIEW_CHARS).collect();
        Err(Error::Parse(format!(
            "neither RSS nor RDF root recognized; content starts with: {}",
            preview
        )))
    }

    /// Map either dialect onto the unified channel shape
    pub fn normalize(self) -> FeedChannel {
        match self {
            FeedDocument::Rss2 { channel } => FeedChannel {
                title: extract_text(channel.child("title"), false).unwrap_or_default(),
                description: extract_text(channel.child("description"), false),
                items: channel.children_named("item").map(normalize_item).collect(),
            },
            FeedDocument::Rdf { channel, items } => FeedChannel {
                title: extract_text(channel.child("title"), false)
                    .unwrap_or_else(|| UNTITLED.to_string()),
                description: extract_text(channel.child("description"), false),
                items: items.iter().map(normalize_item).collect(),
            },
        }
    }
}

fn normalize_item(item: &XmlElement) -> FeedItem {
    FeedItem {
        title: extract_text(item.child("title"), false).unwrap_or_default(),
        link: extract_text(item.child("link"), true).unwrap_or_default(),
        description: extract_text(item.child("description"), false),
    }
}

/// Resolve an element value to plain text.
///
/// The value is the element's character data; with `href_fallback`, an element
/// that has no character data but an `href` attribute (attribute-style links)
/// resolves to that attribute. Absent or blank values resolve to `None`.
pub fn extract_text(element: Option<&XmlElement>, href_fallback: bool) -> Option<String> {
    let element = element?;

    if !element.text.trim().is_empty() {
        return Some(element.text.clone());
    }

    if href_fallback {
        if let Some(href) = element.attribute("href") {
            let href = href.trim();
            if !href.is_empty() {
                return Some(href.to_string());
            }
        }
    }

    None
}

/// Parse raw feed text into a validated channel
pub fn parse_feed(raw: &str) -> Result<FeedChannel> {
    let root = parse_xml(raw)?;
    let document = FeedDocument::classify(root, raw)?;

    let dialect = match document {
        FeedDocument::Rss2 { .. } => "RSS 2.0",
        FeedDocument::Rdf { .. } => "RSS 1.0/RDF",
    };

    let channel = document.normalize();
    channel.validate()?;

    tracing::debug!(
        "Parsed {} feed \"{}\" with {} items",
        dialect,
        channel.title,
        channel.items.len()
    );

    Ok(channel)
}
