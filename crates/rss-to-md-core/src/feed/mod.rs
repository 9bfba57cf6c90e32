mod fetcher;
mod models;
mod parser;
mod render;
pub mod xml;

pub use fetcher::{validate_feed_url, FeedFetcher, FeedSource};
pub use models::{FeedChannel, FeedItem};
pub use parser::{extract_text, parse_feed, FeedDocument, UNTITLED};
pub use render::render_markdown;
