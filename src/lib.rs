//! LimeSurvey MCP server library
//!
//! Exposes the LimeSurvey RemoteControl 2 API to MCP clients. Reads are
//! published as resources (`survey://`, `questions://{sid}`, ...), changes
//! as tools (`add_response`, `delete_survey`, ...).
//!
//! # Sessions
//!
//! Every call opens a fresh remote session, runs exactly one operation and
//! releases the session before answering, on success, failure or
//! cancellation alike.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fault;
pub mod gateway;
pub mod protocol;
pub mod registry;
pub mod remote;
pub mod session;
pub mod transport;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging.
///
/// Logs go to stderr; stdout belongs to the stdio transport.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| Error::Internal(e.to_string()))?;
        }
        _ => {
            subscriber
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| Error::Internal(e.to_string()))?;
        }
    }

    Ok(())
}
