//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::TransportKind;

/// MCP server for the LimeSurvey RemoteControl API
#[derive(Parser, Debug)]
#[command(name = "limesurvey-mcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "LIMESURVEY_MCP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "LIMESURVEY_MCP_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "LIMESURVEY_MCP_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to serving over the configured transport)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve MCP (default)
    Serve {
        /// Transport to serve on
        #[arg(short, long, value_enum)]
        transport: Option<TransportKind>,

        /// Host to bind to (http transport)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (http transport)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List registered resources and tools
    List,

    /// Dispatch one resource address or tool name and print the result
    Call {
        /// Resource address (e.g. `survey://7`) or tool name
        name: String,

        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["limesurvey-mcp"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn serve_overrides_parse() {
        let cli = Cli::try_parse_from([
            "limesurvey-mcp",
            "serve",
            "--transport",
            "http",
            "--port",
            "8080",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Serve {
                transport, port, ..
            }) => {
                assert_eq!(transport, Some(TransportKind::Http));
                assert_eq!(port, Some(8080));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn call_defaults_to_empty_arguments() {
        let cli = Cli::try_parse_from(["limesurvey-mcp", "call", "survey://7"]).unwrap();
        match cli.command {
            Some(Command::Call { name, args }) => {
                assert_eq!(name, "survey://7");
                assert_eq!(args, "{}");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn call_takes_arguments_flag() {
        let cli = Cli::try_parse_from([
            "limesurvey-mcp",
            "call",
            "add_group",
            "--args",
            r#"{"sid": 7, "title": "Intro"}"#,
        ])
        .unwrap();
        let Some(Command::Call { args, .. }) = cli.command else {
            panic!("expected call");
        };
        assert!(args.contains("Intro"));
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli =
            Cli::try_parse_from(["limesurvey-mcp", "list", "--config", "ls.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("ls.yaml")));
    }
}
