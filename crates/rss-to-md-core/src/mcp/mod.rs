//! MCP adapter exposing the `rss_to_md` tool
//!
//! The rmcp SDK speaks JSON-RPC 2.0 over newline-delimited streams. The
//! server is transport agnostic; process lifecycle and stdio wiring live in
//! the binary.

mod guard;
mod server;
mod tools;

pub use server::{McpServer, SUPPORTED_PROTOCOL_VERSIONS};
pub use tools::{call_tool, error_data, list_tools, RSS_TO_MD};
