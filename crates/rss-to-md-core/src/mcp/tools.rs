use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::{CallToolResult, Content, ErrorCode, Tool};
use rmcp::ErrorData;
use serde_json::Value;

use crate::convert::Converter;
use crate::feed::FeedSource;
use crate::{Error, ErrorKind, Result};

pub const RSS_TO_MD: &str = "rss_to_md";

/// Descriptors for every tool the server exposes
pub fn list_tools() -> Vec<Tool> {
    let input_schema = serde_json::json!({
        "type": "object",
        "properties": {
            "url": {
                "type": "string",
                "description": "RSS feed URL",
                "format": "uri"
            }
        },
        "required": ["url"]
    });

    vec![Tool {
        name: Cow::Borrowed(RSS_TO_MD),
        title: None,
        description: Some(Cow::Borrowed("Convert RSS feed to Markdown format")),
        input_schema: Arc::new(input_schema.as_object().cloned().unwrap_or_default()),
        output_schema: None,
        annotations: None,
        icons: None,
    }]
}

/// Pull a non-empty string `url` out of the tool arguments
fn url_argument(arguments: &Value) -> Result<&str> {
    match arguments.get("url").and_then(Value::as_str) {
        Some(url) if !url.is_empty() => Ok(url),
        _ => Err(Error::InvalidParams("Invalid URL parameter".to_string())),
    }
}

/// Dispatch a tool call by name
pub async fn call_tool<S: FeedSource>(
    converter: &Converter<S>,
    name: &str,
    arguments: &Value,
) -> Result<CallToolResult> {
    if name != RSS_TO_MD {
        return Err(Error::MethodNotFound(name.to_string()));
    }

    let url = url_argument(arguments)?;
    let markdown = converter.convert_feed(url).await?;

    Ok(CallToolResult::success(vec![Content::text(markdown)]))
}

/// Protocol error for a failed call, carrying the error's kind as `data.kind`
pub fn error_data(err: &Error) -> ErrorData {
    let kind = err.kind();
    let code = match kind {
        ErrorKind::InvalidParams => ErrorCode::INVALID_PARAMS,
        ErrorKind::MethodNotFound => ErrorCode::METHOD_NOT_FOUND,
        _ => ErrorCode::INTERNAL_ERROR,
    };
    ErrorData::new(code, err.to_string(), Some(serde_json::json!({ "kind": kind })))
}
