//! LimeSurvey MCP server
//!
//! Session-scoped access to the LimeSurvey RemoteControl API over MCP.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use tracing::{error, info, warn};

use limesurvey_mcp::{
    cli::{Cli, Command},
    config::Config,
    dispatch::Dispatcher,
    gateway::McpHandler,
    registry::{Kind, Registry},
    setup_tracing, transport,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Some(Command::List) => run_list(),
        Some(Command::Call { ref name, ref args }) => {
            run_call(cli.config.as_deref(), name, args).await
        }
        Some(Command::Serve {
            transport,
            ref host,
            port,
        }) => {
            let config = match load_config(cli.config.as_deref()) {
                Some(mut config) => {
                    if let Some(transport) = transport {
                        config.server.transport = transport;
                    }
                    if let Some(host) = host {
                        config.server.host.clone_from(host);
                    }
                    if let Some(port) = port {
                        config.server.port = port;
                    }
                    config
                }
                None => return ExitCode::FAILURE,
            };
            run_server(config).await
        }
        None => match load_config(cli.config.as_deref()) {
            Some(config) => run_server(config).await,
            None => ExitCode::FAILURE,
        },
    }
}

fn load_config(path: Option<&Path>) -> Option<Config> {
    match Config::load(path) {
        Ok(config) => {
            let missing = config.limesurvey.credentials().missing();
            if !missing.is_empty() {
                warn!(
                    missing = %missing.join(", "),
                    "LimeSurvey credentials incomplete; every call will fail to open a session"
                );
            }
            Some(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            None
        }
    }
}

/// Print every registered resource and tool
fn run_list() -> ExitCode {
    let registry = Registry::builtin();

    println!("Resources:");
    for op in registry.resources().chain(registry.resource_templates()) {
        println!("  {:<40} {}", op.name, op.description);
    }

    println!("\nTools:");
    for op in registry.tools() {
        let marker = match (op.kind, op.destructive) {
            (_, true) => " [destructive]",
            (Kind::Read, false) => " [read-only]",
            (Kind::Mutate, false) => "",
        };
        println!("  {:<40} {}{marker}", op.name, op.description);
    }

    ExitCode::SUCCESS
}

/// Dispatch one call and print its result
async fn run_call(config_path: Option<&Path>, name: &str, args: &str) -> ExitCode {
    let Some(config) = load_config(config_path) else {
        return ExitCode::FAILURE;
    };

    match call_once(&config, name, args).await {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn call_once(config: &Config, name: &str, args: &str) -> anyhow::Result<String> {
    let args: Value = serde_json::from_str(args).context("arguments are not valid JSON")?;
    let dispatcher = Dispatcher::from_config(config)?;
    let value = dispatcher
        .dispatch(name, args)
        .await
        .with_context(|| format!("{name} failed"))?;
    Ok(match value {
        Value::String(text) => text,
        other => serde_json::to_string_pretty(&other)?,
    })
}

async fn run_server(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?config.server.transport,
        endpoint = %config.limesurvey.url,
        "Starting LimeSurvey MCP server"
    );

    let dispatcher = match Dispatcher::from_config(&config) {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to create dispatcher: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        operations = dispatcher.registry().len(),
        "Operations registered"
    );

    let handler = McpHandler::new(dispatcher, config.server.request_timeout);
    if let Err(e) = transport::serve(handler, &config.server).await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}
