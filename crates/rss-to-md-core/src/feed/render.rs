use super::models::FeedChannel;

/// Render a validated channel as Markdown
pub fn render_markdown(channel: &FeedChannel) -> String {
    let mut markdown = format!("# {}\n\n", channel.title);

    if let Some(description) = &channel.description {
        markdown.push_str(&format!("{}\n\n", description));
    }

    if !channel.items.is_empty() {
        markdown.push_str("## Items\n\n");
        for item in &channel.items {
            markdown.push_str(&format!("- [{}]({})\n", item.title, item.link));
            if let Some(description) = &item.description {
                markdown.push_str(&format!("  {}\n", description));
            }
        }
    }

    markdown
}
