//! Transports carrying MCP messages to and from clients

mod http;
mod stdio;

pub use self::http::{router, serve_http};
pub use self::stdio::{serve_lines, serve_stdio};

use crate::Result;
use crate::config::{ServerConfig, TransportKind};
use crate::gateway::McpHandler;

/// Serve on the configured transport until it closes
pub async fn serve(handler: McpHandler, config: &ServerConfig) -> Result<()> {
    match config.transport {
        TransportKind::Stdio => serve_stdio(handler).await,
        TransportKind::Http => serve_http(handler, config).await,
    }
}
