pub mod config;
pub mod convert;
pub mod error;
pub mod feed;
pub mod mcp;

#[cfg(test)]
mod testing;

pub use config::{AppConfig, FetchConfig, GeneralConfig, ServerConfig};
pub use convert::{convert_content, Converter};
pub use error::{Error, ErrorKind, Result};
pub use mcp::McpServer;
