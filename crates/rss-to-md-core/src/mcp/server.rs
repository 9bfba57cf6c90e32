//! MCP server for the `rss_to_md` tool
//!
//! Protocol handling is done by the rmcp SDK. `run` wires the SDK to any
//! async reader/writer pair through the line guard and stops the session as
//! soon as shutdown is signalled, even while a tool call is in flight.

use rmcp::model::{
    CallToolRequestParam, CallToolResult, Implementation, InitializeRequestParam,
    InitializeResult, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData, ServerHandler, ServiceExt};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::guard::LineGuard;
use super::tools;
use crate::config::ServerConfig;
use crate::convert::Converter;
use crate::feed::{FeedFetcher, FeedSource};
use crate::{Error, Result};

/// Protocol revisions a client may negotiate
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

/// MCP server handler exposing the `rss_to_md` tool
pub struct McpServer<S = FeedFetcher> {
    converter: Converter<S>,
    config: ServerConfig,
}

impl<S: FeedSource + 'static> McpServer<S> {
    pub fn new(converter: Converter<S>, config: ServerConfig) -> Self {
        Self { converter, config }
    }

    /// Serve one MCP session until the client disconnects or shutdown is signalled
    pub async fn run<R, W>(
        self,
        reader: R,
        writer: W,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (transport, guard) = LineGuard::spawn(reader, writer);

        let service = tokio::select! {
            service = self.serve(transport) => match service {
                Ok(service) => service,
                Err(e) => {
                    guard.abort();
                    return Err(Error::Protocol(format!("MCP handshake failed: {}", e)));
                }
            },
            _ = shutdown_signalled(&mut shutdown_rx) => {
                info!("Server shutting down before initialization");
                guard.abort();
                return Ok(());
            }
        };
        info!("MCP session initialized");

        tokio::select! {
            quit = service.waiting() => {
                if let Err(e) = quit {
                    guard.abort();
                    return Err(Error::Protocol(format!("MCP service failed: {}", e)));
                }
                info!("Client disconnected");
                guard.finish().await;
            }
            _ = shutdown_signalled(&mut shutdown_rx) => {
                // Dropping the running service cancels it along with in-flight calls
                info!("Server shutting down");
                guard.abort();
            }
        }

        Ok(())
    }
}

/// Resolves once shutdown is requested; never resolves if every sender is gone
async fn shutdown_signalled(shutdown_rx: &mut watch::Receiver<bool>) {
    if shutdown_rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn protocol_version(version: &str) -> ProtocolVersion {
    serde_json::from_value(Value::from(version)).unwrap_or_default()
}

impl<S: FeedSource + 'static> ServerHandler for McpServer<S> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: protocol_version(&self.config.protocol_version),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.config.name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: None,
        }
    }

    async fn initialize(
        &self,
        request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<InitializeResult, ErrorData> {
        let mut info = self.get_info();

        let supported = SUPPORTED_PROTOCOL_VERSIONS
            .iter()
            .any(|version| protocol_version(version) == request.protocol_version);
        if supported {
            info.protocol_version = request.protocol_version;
        } else {
            warn!(
                "Client requested unsupported protocol version {:?}, offering {}",
                request.protocol_version, self.config.protocol_version
            );
        }

        info!(
            "Client {} {} connected",
            request.client_info.name, request.client_info.version
        );
        Ok(info)
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(tools::list_tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, ErrorData> {
        let arguments = request.arguments.map(Value::Object).unwrap_or(Value::Null);
        debug!("Calling tool {}", request.name);

        tools::call_tool(&self.converter, &request.name, &arguments)
            .await
            .map_err(|e| {
                warn!("Tool call {} failed: {}", request.name, e);
                tools::error_data(&e)
            })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{
        McpClient, PendingFeedSource, StaticFeedSource, TEST_FEED, TEST_FEED_MARKDOWN,
    };

    fn server<S: FeedSource + 'static>(source: S) -> McpServer<S> {
        McpServer::new(Converter::new(source), ServerConfig::default())
    }

    fn tool_call(id: u32, name: &str, arguments: Value) -> Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        })
    }

    #[test]
    fn test_get_info() {
        let info = server(StaticFeedSource::ok(TEST_FEED)).get_info();
        assert_eq!(info.server_info.name, "rss-to-md-server");
        assert_eq!(info.server_info.version, env!("CARGO_PKG_VERSION"));
        assert!(info.capabilities.tools.is_some());

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["protocolVersion"], "2024-11-05");
    }

    #[tokio::test]
    async fn test_initialize_echoes_supported_protocol_version() {
        let mut client = McpClient::start(server(StaticFeedSource::ok(TEST_FEED)));
        let resp = client.initialize("2025-03-26").await;

        assert_eq!(resp["id"], 0);
        assert_eq!(resp["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(resp["result"]["serverInfo"]["name"], "rss-to-md-server");
        assert!(resp["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_initialize_answers_own_version_when_unsupported() {
        let mut client = McpClient::start(server(StaticFeedSource::ok(TEST_FEED)));
        let resp = client.initialize("1999-01-01").await;

        assert_eq!(resp["result"]["protocolVersion"], "2024-11-05");
    }

    #[tokio::test]
    async fn test_ping_and_tools_list() {
        let mut client = McpClient::start(server(StaticFeedSource::ok(TEST_FEED)));
        client.handshake().await;

        client
            .send(&serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"], serde_json::json!({}));

        client
            .send(&serde_json::json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }))
            .await;
        let resp = client.recv().await;
        let tool = &resp["result"]["tools"][0];
        assert_eq!(tool["name"], "rss_to_md");
        assert_eq!(tool["description"], "Convert RSS feed to Markdown format");
        assert_eq!(tool["inputSchema"]["properties"]["url"]["type"], "string");
        assert_eq!(tool["inputSchema"]["required"], serde_json::json!(["url"]));
    }

    #[tokio::test]
    async fn test_tools_call_success() {
        let mut client = McpClient::start(server(StaticFeedSource::ok(TEST_FEED)));
        client.handshake().await;

        client
            .send(&tool_call(3, "rss_to_md", serde_json::json!({ "url": "https://example.com/feed" })))
            .await;
        let resp = client.recv().await;

        assert_eq!(resp["id"], 3);
        assert!(resp.get("error").is_none());
        assert_eq!(resp["result"]["content"][0]["type"], "text");
        assert_eq!(resp["result"]["content"][0]["text"], TEST_FEED_MARKDOWN);
    }

    #[tokio::test]
    async fn test_tools_call_unknown_tool() {
        let mut client = McpClient::start(server(StaticFeedSource::ok(TEST_FEED)));
        client.handshake().await;

        client.send(&tool_call(4, "other", serde_json::json!({}))).await;
        let resp = client.recv().await;

        assert_eq!(resp["error"]["code"], -32601);
        assert_eq!(resp["error"]["data"]["kind"], "MethodNotFoundError");
    }

    #[tokio::test]
    async fn test_tools_call_invalid_url() {
        let mut client = McpClient::start(server(StaticFeedSource::ok(TEST_FEED)));
        client.handshake().await;

        client
            .send(&tool_call(5, "rss_to_md", serde_json::json!({ "url": "invalid-url" })))
            .await;
        let resp = client.recv().await;

        assert_eq!(resp["error"]["code"], -32602);
        assert_eq!(resp["error"]["data"]["kind"], "InvalidParamsError");
    }

    #[tokio::test]
    async fn test_tools_call_processing_error() {
        let mut client = McpClient::start(server(StaticFeedSource::ok(
            "<rss><channel><title>T</title><item/></channel></rss>",
        )));
        client.handshake().await;

        client
            .send(&tool_call(6, "rss_to_md", serde_json::json!({ "url": "https://example.com/feed" })))
            .await;
        let resp = client.recv().await;

        assert!(resp.get("result").is_none());
        assert_eq!(resp["error"]["code"], -32603);
        assert_eq!(resp["error"]["data"]["kind"], "ProcessingError");
        let message = resp["error"]["message"].as_str().unwrap();
        assert!(message.starts_with("Failed to process RSS feed: "));
        assert!(message.contains("`title`"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let mut client = McpClient::start(server(StaticFeedSource::ok(TEST_FEED)));
        client.handshake().await;

        client
            .send(&serde_json::json!({ "jsonrpc": "2.0", "id": 7, "method": "feeds/subscribe" }))
            .await;
        let resp = client.recv().await;
        assert_eq!(resp["id"], 7);
        assert_eq!(resp["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_bad_lines_do_not_end_the_session() {
        let mut client = McpClient::start(server(StaticFeedSource::ok(TEST_FEED)));
        client.handshake().await;

        client.send_raw(b"\xff\xfe not utf-8\n").await;
        client.send_raw(b"{not json\n").await;
        client
            .send(&serde_json::json!({ "jsonrpc": "2.0", "id": 2, "method": "ping" }))
            .await;

        let mut responses = Vec::new();
        for _ in 0..3 {
            responses.push(client.recv().await);
        }

        let parse_errors = responses
            .iter()
            .filter(|r| r["id"].is_null() && r["error"]["code"] == -32700)
            .count();
        assert_eq!(parse_errors, 2);
        assert!(responses
            .iter()
            .any(|r| r["id"] == 2 && r["result"] == serde_json::json!({})));
    }

    #[tokio::test]
    async fn test_run_ends_when_input_closes() {
        let mut client = McpClient::start(server(StaticFeedSource::ok(TEST_FEED)));
        client.handshake().await;

        assert!(client.close_input().await.is_ok());
    }

    #[tokio::test]
    async fn test_input_closed_before_initialization_is_error() {
        let client = McpClient::start(server(StaticFeedSource::ok(TEST_FEED)));
        assert!(matches!(client.close_input().await, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_shutdown_before_initialization() {
        let client = McpClient::start(server(StaticFeedSource::ok(TEST_FEED)));
        assert!(client.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_in_flight_call() {
        let mut client = McpClient::start(server(PendingFeedSource));
        client.handshake().await;

        client
            .send(&tool_call(1, "rss_to_md", serde_json::json!({ "url": "https://example.com/slow" })))
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(client.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_signalled() {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), shutdown_signalled(&mut shutdown_rx))
            .await
            .expect("shutdown should be observed");
    }

    #[tokio::test]
    async fn test_dropped_sender_never_signals_shutdown() {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);
        let waited =
            tokio::time::timeout(Duration::from_millis(50), shutdown_signalled(&mut shutdown_rx))
                .await;
        assert!(waited.is_err());
    }
}
