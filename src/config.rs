//! Configuration management for Tilesmith.
//!
//! This module provides the command-line interface:
//! - `serve`: run the HTTP service
//! - `split`: split a local image file into a zip of tiles, optionally
//!   enhancing every tile first
//!
//! # Environment Variables
//!
//! Options can be set via environment variables with the `TILESMITH_` prefix:
//!
//! - `TILESMITH_HOST` - Server bind address (default: 0.0.0.0)
//! - `TILESMITH_PORT` - Server port (default: 3000)
//! - `TILESMITH_API_KEY` - Enhancement service credential
//! - `TILESMITH_ENHANCE_ENDPOINT` - Enhancement service URL
//! - `TILESMITH_ENHANCE_TIMEOUT` - Enhancement request timeout in seconds (default: 120)
//! - `TILESMITH_MAX_GRID` - Largest accepted rows/cols (default: 10)
//! - `TILESMITH_ACCESS_TOKEN` - Bearer token required by the API
//! - `TILESMITH_CORS_ORIGINS` - Allowed CORS origins (comma-separated)
//! - `TILESMITH_MAX_UPLOAD` - Largest accepted upload in bytes (default: 50 MiB)

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::enhance::{QualityLevel, DEFAULT_ENHANCE_TIMEOUT};
use crate::server::DEFAULT_MAX_UPLOAD_BYTES;
use crate::tile::MAX_GRID_DIMENSION;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default grid dimension for the `split` command.
pub const DEFAULT_GRID: u32 = 3;

/// Environment variable holding the enhancement credential.
pub const API_KEY_ENV: &str = "TILESMITH_API_KEY";

/// Hard upper bound for `--max-grid`.
const MAX_GRID_LIMIT: u32 = 100;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tilesmith - split images into tiles and enhance them one by one.
#[derive(Parser, Debug, Clone)]
#[command(name = "tilesmith")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(ServeConfig),

    /// Split a local image into a zip archive of tiles.
    Split(SplitConfig),
}

/// Settings shared by every command that talks to the enhancement service.
#[derive(Args, Debug, Clone)]
pub struct EnhanceArgs {
    /// URL of the enhancement service.
    #[arg(long, env = "TILESMITH_ENHANCE_ENDPOINT")]
    pub enhance_endpoint: Option<String>,

    /// Enhancement request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_ENHANCE_TIMEOUT.as_secs(), env = "TILESMITH_ENHANCE_TIMEOUT")]
    pub enhance_timeout: u64,
}

impl EnhanceArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.enhance_timeout)
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(endpoint) = &self.enhance_endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(format!(
                    "enhance_endpoint must be an http(s) URL, got '{}'",
                    endpoint
                ));
            }
        }
        if self.enhance_timeout == 0 {
            return Err("enhance_timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Options for `tilesmith serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TILESMITH_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TILESMITH_PORT")]
    pub port: u16,

    /// Largest accepted upload in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "TILESMITH_MAX_UPLOAD")]
    pub max_upload: usize,

    /// Largest accepted number of rows or columns.
    #[arg(long, default_value_t = MAX_GRID_DIMENSION, env = "TILESMITH_MAX_GRID")]
    pub max_grid: u32,

    /// Folder archive entries are nested in (empty = archive root).
    #[arg(long)]
    pub archive_folder: Option<String>,

    // =========================================================================
    // Enhancement Configuration
    // =========================================================================
    /// Initial enhancement credential. Can be replaced at runtime via
    /// `PUT /credential`.
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(flatten)]
    pub enhance: EnhanceArgs,

    // =========================================================================
    // Access Control
    // =========================================================================
    /// Bearer token required on every route except /health.
    #[arg(long, env = "TILESMITH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "TILESMITH_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must be greater than 0".to_string());
        }
        validate_max_grid(self.max_grid)?;
        if self.max_upload == 0 {
            return Err("max_upload must be greater than 0".to_string());
        }
        if self.enhance.enhance_endpoint.is_none() {
            return Err(
                "Enhancement endpoint is required. Set --enhance-endpoint or \
                 TILESMITH_ENHANCE_ENDPOINT"
                    .to_string(),
            );
        }
        if let Some(token) = &self.access_token {
            if token.trim().is_empty() {
                return Err(
                    "access_token is set but empty. Unset TILESMITH_ACCESS_TOKEN to disable \
                     access control"
                        .to_string(),
                );
            }
        }
        self.enhance.validate()
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Options for `tilesmith split`.
#[derive(Args, Debug, Clone)]
pub struct SplitConfig {
    /// Image file to split.
    pub input: PathBuf,

    /// Number of rows.
    #[arg(short, long, default_value_t = DEFAULT_GRID)]
    pub rows: u32,

    /// Number of columns.
    #[arg(short, long, default_value_t = DEFAULT_GRID)]
    pub cols: u32,

    /// Where to write the zip archive (default: a timestamped name in the
    /// current directory).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Folder archive entries are nested in.
    #[arg(long)]
    pub folder: Option<String>,

    /// Enhance every tile at this quality (1K, 2K or 4K) before archiving.
    #[arg(long)]
    pub enhance: Option<QualityLevel>,

    /// Environment variable read for the enhancement credential.
    #[arg(long, default_value = API_KEY_ENV)]
    pub api_key_env: String,

    #[command(flatten)]
    pub service: EnhanceArgs,

    /// Largest accepted number of rows or columns.
    #[arg(long, default_value_t = MAX_GRID_DIMENSION, env = "TILESMITH_MAX_GRID")]
    pub max_grid: u32,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl SplitConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        validate_max_grid(self.max_grid)?;
        if self.enhance.is_some() && self.service.enhance_endpoint.is_none() {
            return Err(
                "--enhance requires an enhancement service. Set --enhance-endpoint or \
                 TILESMITH_ENHANCE_ENDPOINT"
                    .to_string(),
            );
        }
        if self.api_key_env.trim().is_empty() {
            return Err("api_key_env must name an environment variable".to_string());
        }
        self.service.validate()
    }
}

fn validate_max_grid(max_grid: u32) -> Result<(), String> {
    if max_grid == 0 || max_grid > MAX_GRID_LIMIT {
        return Err(format!(
            "max_grid must be between 1 and {}",
            MAX_GRID_LIMIT
        ));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
