//! Configuration management

use std::{env, fmt, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::session::Credentials;
use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before resolving credentials.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// LimeSurvey connection
    pub limesurvey: LimeSurveyConfig,
    /// MCP server
    pub server: ServerConfig,
}

/// LimeSurvey RemoteControl connection
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimeSurveyConfig {
    /// RemoteControl endpoint, e.g. `https://survey.example.org/index.php/admin/remotecontrol`
    pub url: String,
    /// Account name
    pub username: String,
    /// Account password
    #[serde(skip_serializing)]
    pub password: String,
    /// Timeout for each remote round trip
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for LimeSurveyConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl fmt::Debug for LimeSurveyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimeSurveyConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl LimeSurveyConfig {
    /// Credentials for opening sessions
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// Inbound MCP transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Newline-delimited JSON-RPC on stdin/stdout
    #[default]
    Stdio,
    /// JSON-RPC over HTTP POST
    Http,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Inbound transport
    pub transport: TransportKind,
    /// Host to bind to (http transport)
    pub host: String,
    /// Port to listen on (http transport)
    pub port: u16,
    /// Upper bound for handling one request, session open and close included
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Maximum request body size (bytes, http transport)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stdio,
            host: "127.0.0.1".to_string(),
            port: 39410,
            request_timeout: Duration::from_secs(120),
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or names an invalid LimeSurvey URL.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
        }

        let mut config = Self::extract(path)?;

        // Env files may define LIMESURVEY_* variables, so re-read after loading them
        if !config.env_files.is_empty() {
            config.load_env_files();
            config = Self::extract(path)?;
        }

        config.expand_env_vars();
        config.validate()?;

        Ok(config)
    }

    fn extract(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            figment = figment.merge(Yaml::file(p));
        }

        // LIMESURVEY_MCP_SERVER__PORT=8080 style overrides
        figment = figment.merge(Env::prefixed("LIMESURVEY_MCP_").split("__"));

        // Plain LIMESURVEY_URL / _USERNAME / _PASSWORD
        figment = figment.merge(
            Env::prefixed("LIMESURVEY_")
                .only(&["url", "username", "password"])
                .map(|key| format!("limesurvey.{key}").into()),
        );

        figment.extract().map_err(|e| Error::Config(e.to_string()))
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = match (path_str.strip_prefix('~'), dirs::home_dir()) {
                (Some(rest), Some(home)) => format!("{}{rest}", home.display()),
                _ => path_str.clone(),
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!("Loaded env file: {expanded}"),
                    Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in connection settings
    fn expand_env_vars(&mut self) {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var pattern is valid");

        let limesurvey = &mut self.limesurvey;
        for value in [
            &mut limesurvey.url,
            &mut limesurvey.username,
            &mut limesurvey.password,
        ] {
            *value = Self::expand_string(&re, value);
        }
    }

    /// Expand environment variables in a string
    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
    }

    fn validate(&self) -> Result<()> {
        let url = &self.limesurvey.url;
        if !url.is_empty() {
            let parsed = Url::parse(url)
                .map_err(|e| Error::Config(format!("Invalid limesurvey.url '{url}': {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "limesurvey.url must be http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }
        if self.server.max_body_size == 0 {
            return Err(Error::Config(
                "server.max_body_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to human-readable string (e.g., "30s", "250ms")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom)
        } else {
            // Assume seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
