//! Server configuration, read from the command line with environment
//! fallbacks.

use crate::storage::ExpiryConfig;
use clap::Parser;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tallykv",
    version,
    about = "An in-memory key-value store speaking a plain-text line protocol"
)]
pub struct Config {
    /// Host to bind to
    #[arg(long, env = "TALLYKV_HOST", default_value = crate::DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "TALLYKV_PORT", default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Expiry in seconds given to SET without EX. 0 disables default expiry.
    #[arg(long, env = "TALLYKV_DEFAULT_TTL", default_value_t = DEFAULT_TTL_SECONDS)]
    pub default_ttl: u64,

    /// Starting interval of the background expiry sweeper, in milliseconds
    #[arg(long, env = "TALLYKV_SWEEP_INTERVAL_MS", default_value_t = 100)]
    pub sweep_interval_ms: u64,

    /// Rely on lazy expiry only
    #[arg(long)]
    pub no_sweeper: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "TALLYKV_LOG", default_value = "info")]
    pub log_level: String,
}

/// Default expiry for SET without EX (10 minutes)
pub const DEFAULT_TTL_SECONDS: u64 = 600;

impl Default for Config {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            default_ttl: DEFAULT_TTL_SECONDS,
            sweep_interval_ms: 100,
            no_sweeper: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be > 0");
        }

        if self.host.trim().is_empty() {
            anyhow::bail!("host must not be empty");
        }

        if !self.no_sweeper && self.sweep_interval_ms == 0 {
            anyhow::bail!("sweep-interval-ms must be > 0");
        }

        Ok(())
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Expiry policy for SET without an explicit TTL.
    pub fn default_ttl(&self) -> Option<Duration> {
        match self.default_ttl {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Sweeper settings, or `None` when the sweeper is disabled.
    pub fn expiry(&self) -> Option<ExpiryConfig> {
        if self.no_sweeper {
            return None;
        }
        Some(ExpiryConfig::with_interval(Duration::from_millis(
            self.sweep_interval_ms,
        )))
    }
}
