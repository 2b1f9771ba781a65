//! MCP surface over the dispatcher

mod handler;
mod helpers;

pub use handler::McpHandler;
