use clap::{Parser, builder::BoolishValueParser};
use std::net::SocketAddr;
use std::time::Duration;

use tableau_core::client::{HttpSettings, RetryPolicy};
use tableau_core::credentials::{
    DEFAULT_TOKEN_TTL_MINUTES, MAX_TOKEN_TTL_MINUTES, SKEW_MARGIN_MINUTES,
};
use tableau_core::error::ConfigError;
use tableau_gateway::GatewayConfig;
use tableau_mcp::server::McpHttpServerConfig;

const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";
const DEFAULT_GATEWAY_ADDR: &str = "127.0.0.1:4010";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GATEWAY_MAX_BODY_BYTES: usize = 1024 * 1024;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

#[derive(Parser, Debug)]
#[command(name = "tableau-mcpd", version, about = "Tableau MCP daemon.")]
struct CliArgs {
    #[arg(
        long = "stdio",
        env = "TABLEAU_MCP_STDIO",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "TABLEAU_MCP_SERVE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(long, env = "TABLEAU_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,

    #[arg(
        long,
        env = "TABLEAU_GATEWAY_SERVE",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    gateway_serve: bool,

    #[arg(long, env = "TABLEAU_GATEWAY_ADDR", default_value = DEFAULT_GATEWAY_ADDR)]
    gateway_addr: SocketAddr,

    #[arg(
        long,
        env = "TABLEAU_GATEWAY_TIMEOUT_SECS",
        default_value_t = DEFAULT_GATEWAY_TIMEOUT_SECS
    )]
    gateway_timeout_secs: u64,

    #[arg(
        long,
        env = "TABLEAU_GATEWAY_MAX_BODY_BYTES",
        default_value_t = DEFAULT_GATEWAY_MAX_BODY_BYTES
    )]
    gateway_max_body_bytes: usize,

    #[arg(
        long,
        env = "TABLEAU_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_HTTP_TIMEOUT_SECS
    )]
    http_timeout_secs: u64,

    #[arg(
        long,
        env = "TABLEAU_RETRY_MAX_ATTEMPTS",
        default_value_t = DEFAULT_RETRY_MAX_ATTEMPTS
    )]
    retry_max_attempts: u32,

    #[arg(
        long,
        env = "TABLEAU_RETRY_BACKOFF_MS",
        default_value_t = DEFAULT_RETRY_BACKOFF_MS
    )]
    retry_backoff_ms: u64,

    #[arg(
        long,
        env = "TABLEAU_TOKEN_TTL_MINUTES",
        default_value_t = DEFAULT_TOKEN_TTL_MINUTES
    )]
    token_ttl_minutes: i64,
}

/// Daemon settings loaded from CLI arguments and environment variables.
///
/// Tableau connection settings are resolved separately through
/// `TableauSettings::resolve`.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub mcp_http_addr: SocketAddr,
    pub gateway_serve: bool,
    pub gateway_addr: SocketAddr,
    pub gateway_timeout: Duration,
    pub gateway_max_body_bytes: usize,
    pub http: HttpSettings,
    pub token_ttl_minutes: i64,
}

impl DaemonConfig {
    /// # Errors
    /// Returns `ConfigError::InvalidSetting` when a value fails validation.
    pub fn from_args() -> Result<Self, ConfigError> {
        Self::try_from(CliArgs::parse())
    }

    #[must_use]
    pub const fn mcp_http(&self) -> McpHttpServerConfig {
        McpHttpServerConfig::new(self.mcp_http_addr)
    }

    #[must_use]
    pub const fn gateway(&self) -> GatewayConfig {
        GatewayConfig::new(self.gateway_addr)
            .with_request_timeout(self.gateway_timeout)
            .with_max_body_bytes(self.gateway_max_body_bytes)
    }
}

fn positive(name: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidSetting {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}

impl TryFrom<CliArgs> for DaemonConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if !(args.enable_stdio || args.mcp_serve || args.gateway_serve) {
            return Err(ConfigError::InvalidSetting {
                name: "TABLEAU_MCP_SERVE",
                value: "no surface enabled (stdio, MCP HTTP, and gateway are all off)".to_string(),
            });
        }

        let http_timeout = positive("TABLEAU_HTTP_TIMEOUT_SECS", args.http_timeout_secs)?;
        let gateway_timeout = positive("TABLEAU_GATEWAY_TIMEOUT_SECS", args.gateway_timeout_secs)?;
        positive("TABLEAU_RETRY_MAX_ATTEMPTS", u64::from(args.retry_max_attempts))?;
        if args.gateway_max_body_bytes == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "TABLEAU_GATEWAY_MAX_BODY_BYTES",
                value: args.gateway_max_body_bytes.to_string(),
            });
        }
        if args.token_ttl_minutes <= SKEW_MARGIN_MINUTES
            || args.token_ttl_minutes > MAX_TOKEN_TTL_MINUTES
        {
            return Err(ConfigError::InvalidSetting {
                name: "TABLEAU_TOKEN_TTL_MINUTES",
                value: args.token_ttl_minutes.to_string(),
            });
        }

        let retry = RetryPolicy::new(
            args.retry_max_attempts,
            Duration::from_millis(args.retry_backoff_ms),
        );

        Ok(Self {
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            mcp_http_addr: args.mcp_http_addr,
            gateway_serve: args.gateway_serve,
            gateway_addr: args.gateway_addr,
            gateway_timeout: Duration::from_secs(gateway_timeout),
            gateway_max_body_bytes: args.gateway_max_body_bytes,
            http: HttpSettings::new(Duration::from_secs(http_timeout)).with_retry(retry),
            token_ttl_minutes: args.token_ttl_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            enable_stdio: false,
            mcp_serve: true,
            mcp_http_addr: DEFAULT_MCP_HTTP_ADDR.parse().expect("valid MCP addr"),
            gateway_serve: false,
            gateway_addr: DEFAULT_GATEWAY_ADDR.parse().expect("valid gateway addr"),
            gateway_timeout_secs: DEFAULT_GATEWAY_TIMEOUT_SECS,
            gateway_max_body_bytes: DEFAULT_GATEWAY_MAX_BODY_BYTES,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
        }
    }

    #[test]
    fn defaults_serve_mcp_http_only() {
        let config = DaemonConfig::try_from(base_args()).expect("config should parse");

        assert!(config.mcp_serve);
        assert!(!config.gateway_serve);
        assert!(!config.enable_stdio);
        assert_eq!(config.http.timeout, Duration::from_secs(30));
        assert_eq!(config.http.retry, RetryPolicy::default());
        assert_eq!(config.token_ttl_minutes, 120);
        assert_eq!(config.gateway().max_body_bytes, 1024 * 1024);
    }

    #[test]
    fn rejects_no_surface() {
        let mut args = base_args();
        args.mcp_serve = false;

        let err = DaemonConfig::try_from(args).expect_err("should fail");
        assert!(matches!(err, ConfigError::InvalidSetting { name: "TABLEAU_MCP_SERVE", .. }));
    }

    #[test]
    fn rejects_zero_timeouts_and_attempts() {
        let mut args = base_args();
        args.http_timeout_secs = 0;
        assert!(matches!(
            DaemonConfig::try_from(args),
            Err(ConfigError::InvalidSetting { name: "TABLEAU_HTTP_TIMEOUT_SECS", .. })
        ));

        let mut args = base_args();
        args.retry_max_attempts = 0;
        assert!(matches!(
            DaemonConfig::try_from(args),
            Err(ConfigError::InvalidSetting { name: "TABLEAU_RETRY_MAX_ATTEMPTS", .. })
        ));
    }

    #[test]
    fn token_ttl_must_outlast_the_skew_margin() {
        let mut args = base_args();
        args.token_ttl_minutes = SKEW_MARGIN_MINUTES;
        assert!(DaemonConfig::try_from(args).is_err());
    }

    #[test]
    fn token_ttl_has_an_upper_bound() {
        let mut args = base_args();
        args.token_ttl_minutes = i64::MAX / 60;
        assert!(matches!(
            DaemonConfig::try_from(args),
            Err(ConfigError::InvalidSetting { name: "TABLEAU_TOKEN_TTL_MINUTES", .. })
        ));

        let mut args = base_args();
        args.token_ttl_minutes = MAX_TOKEN_TTL_MINUTES;
        let config = DaemonConfig::try_from(args).expect("the cap itself is allowed");
        assert_eq!(config.token_ttl_minutes, MAX_TOKEN_TTL_MINUTES);
    }

    #[test]
    fn stdio_alone_is_a_valid_surface() {
        let mut args = base_args();
        args.mcp_serve = false;
        args.enable_stdio = true;

        let config = DaemonConfig::try_from(args).expect("config should parse");
        assert!(config.enable_stdio);
    }
}
