use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

use crate::feed::FeedSource;
use crate::mcp::McpServer;
use crate::{Error, Result};

/// In-memory feed source that counts how often it is asked for content
pub(crate) struct StaticFeedSource {
    body: std::result::Result<String, String>,
    calls: AtomicUsize,
}

impl StaticFeedSource {
    pub(crate) fn ok(body: &str) -> Self {
        Self {
            body: Ok(body.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn network_error(message: &str) -> Self {
        Self {
            body: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl FeedSource for StaticFeedSource {
    async fn fetch(&self, _url: &Url) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.body.clone().map_err(Error::Network)
    }
}

/// Feed source whose fetch never completes
pub(crate) struct PendingFeedSource;

#[async_trait::async_trait]
impl FeedSource for PendingFeedSource {
    async fn fetch(&self, _url: &Url) -> Result<String> {
        std::future::pending().await
    }
}

const PIPE_BYTES: usize = 64 * 1024;
const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Line-delimited JSON-RPC client talking to a running `McpServer` over in-memory pipes
pub(crate) struct McpClient {
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
    task: JoinHandle<Result<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl McpClient {
    pub(crate) fn start<S: FeedSource + 'static>(server: McpServer<S>) -> Self {
        let (input, server_in) = tokio::io::duplex(PIPE_BYTES);
        let (server_out, output) = tokio::io::duplex(PIPE_BYTES);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(server.run(BufReader::new(server_in), server_out, shutdown_rx));

        Self {
            input,
            output: BufReader::new(output).lines(),
            task,
            shutdown_tx,
        }
    }

    pub(crate) async fn send(&mut self, message: &Value) {
        let mut line = message.to_string();
        line.push('\n');
        self.send_raw(line.as_bytes()).await;
    }

    pub(crate) async fn send_raw(&mut self, bytes: &[u8]) {
        self.input.write_all(bytes).await.unwrap();
        self.input.flush().await.unwrap();
    }

    pub(crate) async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(RECV_TIMEOUT, self.output.next_line())
            .await
            .expect("timed out waiting for a response")
            .unwrap()
            .expect("server closed its output");
        serde_json::from_str(&line).unwrap()
    }

    /// Send `initialize` with id 0 and return the response
    pub(crate) async fn initialize(&mut self, protocol_version: &str) -> Value {
        self.send(&serde_json::json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": protocol_version,
                "capabilities": {},
                "clientInfo": { "name": "test-client", "version": "0.0.0" }
            }
        }))
        .await;
        self.recv().await
    }

    /// Complete the initialize exchange so requests are served
    pub(crate) async fn handshake(&mut self) {
        let resp = self.initialize("2024-11-05").await;
        assert!(resp.get("result").is_some(), "initialize failed: {}", resp);
        self.send(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .await;
    }

    /// Close the client's input and wait for the server to finish
    pub(crate) async fn close_input(self) -> Result<()> {
        let Self {
            input,
            output,
            task,
            shutdown_tx,
        } = self;
        drop(input);
        let result = tokio::time::timeout(RECV_TIMEOUT, task)
            .await
            .expect("server did not stop after input closed")
            .unwrap();
        drop((output, shutdown_tx));
        result
    }

    /// Signal shutdown with the pipes still open; the server must stop promptly
    pub(crate) async fn shutdown(self) -> Result<()> {
        let Self {
            input,
            output,
            task,
            shutdown_tx,
        } = self;
        shutdown_tx.send(true).unwrap();
        let result = tokio::time::timeout(SHUTDOWN_TIMEOUT, task)
            .await
            .expect("server did not stop on shutdown")
            .unwrap();
        drop((input, output));
        result
    }
}

pub(crate) const TEST_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <description>Test Description</description>
    <item>
      <title>Item 1</title>
      <link>https://example.com/item1</link>
      <description>Item 1 Description</description>
    </item>
  </channel>
</rss>"#;

pub(crate) const TEST_FEED_MARKDOWN: &str = "# Test Feed\n\nTest Description\n\n## Items\n\n- [Item 1](https://example.com/item1)\n  Item 1 Description\n";
