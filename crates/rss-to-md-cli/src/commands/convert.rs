use anyhow::Result;

use rss_to_md_core::{AppConfig, Converter};

/// Fetch one feed and write its Markdown to stdout
pub async fn run(config: &AppConfig, url: &str) -> Result<()> {
    let converter = Converter::from_config(config)?;
    let markdown = converter.convert_feed(url).await?;

    print!("{}", markdown);

    Ok(())
}
