use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Unified channel built from either an RSS 2.0 or an RSS 1.0/RDF document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedChannel {
    pub title: String,
    pub description: Option<String>,
    /// Items in document order
    pub items: Vec<FeedItem>,
}

/// A single feed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
}

impl FeedChannel {
    /// Check required fields. A single invalid item rejects the whole channel.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation(
                "channel is missing required field `title`".to_string(),
            ));
        }

        for (index, item) in self.items.iter().enumerate() {
            item.validate().map_err(|field| {
                Error::Validation(format!(
                    "item {} is missing required field `{}`",
                    index + 1,
                    field
                ))
            })?;
        }

        Ok(())
    }
}

impl FeedItem {
    /// Returns the name of the first missing required field
    fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.title.trim().is_empty() {
            return Err("title");
        }
        if self.link.trim().is_empty() {
            return Err("link");
        }
        Ok(())
    }
}
