use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ApiError;
use crate::storage::SqliteCredentialStore;

/// FieldOps session client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Backend base URL, e.g. https://api.example.com
    #[arg(short = 'u', long, env = "FIELDOPS_BASE_URL")]
    pub base_url: Option<String>,

    /// Path to the credential store (SQLite)
    #[arg(short = 's', long, env = "FIELDOPS_STORE_FILE")]
    pub store_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Seconds before the token's expiry at which it is treated as expired
    #[arg(long, env = "TOKEN_EXPIRY_SKEW", default_value = "60")]
    pub expiry_skew: i64,

    /// Milliseconds before another session-expiry redirect may happen
    #[arg(long, env = "REDIRECT_COOLDOWN_MS", default_value = "1000")]
    pub redirect_cooldown: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in and store the session
    Login {
        /// Account username
        #[arg(long)]
        username: String,

        /// Password; prompted for when omitted
        #[arg(long, env = "FIELDOPS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Clear the stored session
    Logout,

    /// Show the stored session
    Status,

    /// Send an authenticated request
    Request {
        /// HTTP method (GET, POST, PUT, DELETE)
        method: String,

        /// Path relative to the base URL, e.g. /api/profile
        path: String,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,

        /// Print the response body as received instead of as JSON
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    // Backend
    pub base_url: String,

    // Credential store
    pub store_file: PathBuf,

    // Session
    pub expiry_skew_secs: i64,
    pub redirect_cooldown: Duration,
    pub login_route: String,
    pub home_route: String,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: String::new(),
            store_file: default_store_file(),
            expiry_skew_secs: 60,
            redirect_cooldown: Duration::from_millis(1000),
            login_route: "/login".to_string(),
            home_route: "/layout/dashboard".to_string(),
            http_max_connections: 20,
            http_connect_timeout: 10,
            http_request_timeout: 30,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let command = args.command.clone();
        Ok((Self::from_args(args)?, command))
    }

    /// Build configuration from parsed arguments; settings without a flag come from ENV
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let defaults = Config::default();

        let config = Config {
            base_url: args
                .base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .context("FIELDOPS_BASE_URL is required (use -u or set FIELDOPS_BASE_URL env var)")?,

            store_file: args
                .store_file
                .map(|s| expand_tilde(&s))
                .unwrap_or(defaults.store_file),

            expiry_skew_secs: args.expiry_skew,

            redirect_cooldown: Duration::from_millis(args.redirect_cooldown),

            login_route: std::env::var("LOGIN_ROUTE").unwrap_or(defaults.login_route),

            home_route: std::env::var("HOME_ROUTE").unwrap_or(defaults.home_route),

            http_max_connections: env_or("HTTP_MAX_CONNECTIONS", defaults.http_max_connections),

            http_connect_timeout: env_or("HTTP_CONNECT_TIMEOUT", defaults.http_connect_timeout),

            http_request_timeout: args.http_timeout,

            log_level: args.log_level,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ApiError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ApiError::Config(format!(
                "FIELDOPS_BASE_URL must start with http:// or https://: {}",
                self.base_url
            )));
        }

        if self.expiry_skew_secs < 0 {
            return Err(ApiError::Config(
                "TOKEN_EXPIRY_SKEW cannot be negative".to_string(),
            ));
        }

        if !self.login_route.starts_with('/') || !self.home_route.starts_with('/') {
            return Err(ApiError::Config(
                "LOGIN_ROUTE and HOME_ROUTE must be absolute routes".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn default_store_file() -> PathBuf {
    SqliteCredentialStore::default_path().unwrap_or_else(|| PathBuf::from("session.sqlite3"))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
