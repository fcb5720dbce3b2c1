//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use roach_race::{EscrowConfig, Identity};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Bind address used when neither `--bind` nor `SERVER_BIND` is given
pub const DEFAULT_BIND: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 6969);

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Escrow owner, fee and operators
    pub escrow: EscrowConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Prometheus exporter address; metrics are disabled when unset
    pub metrics_bind: Option<SocketAddr>,
}

/// Security-related configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// JWT signing secret (required)
    pub jwt_secret: String,
    /// Lifetime of tokens issued by `--issue-token`
    pub token_ttl_secs: i64,
}

/// Values given on the command line; each wins over its env var
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<SocketAddr>,
    pub owner: Option<String>,
    pub platform_fee_percent: Option<u8>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::from_lookup(overrides, |key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(overrides: ConfigOverrides, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Bind address
        let bind = match overrides.bind {
            Some(bind) => bind,
            None => parse_var(&lookup, "SERVER_BIND")?.unwrap_or(DEFAULT_BIND),
        };

        // Escrow configuration (owner REQUIRED)
        let owner = overrides
            .owner
            .or_else(|| lookup("ESCROW_OWNER"))
            .ok_or_else(|| ConfigError::MissingRequired {
                var: "ESCROW_OWNER".to_string(),
                hint: "Set to the owner's account address or pass --owner".to_string(),
            })?;

        let mut escrow = EscrowConfig::new(Identity::new(&owner));
        escrow.fee_collector = lookup("FEE_COLLECTOR").map(|v| Identity::new(&v));
        escrow.platform_fee_percent = match overrides.platform_fee_percent {
            Some(percent) => percent,
            None => parse_var(&lookup, "PLATFORM_FEE_PERCENT")?
                .unwrap_or(escrow.platform_fee_percent),
        };
        escrow.operators = lookup("ESCROW_OPERATORS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(Identity::new)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(capacity) = parse_var(&lookup, "ESCROW_INBOX_CAPACITY")? {
            escrow.inbox_capacity = capacity;
        }

        // Security configuration (REQUIRED)
        let jwt_secret = lookup("JWT_SECRET").ok_or_else(|| ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Generate with: openssl rand -hex 32".to_string(),
        })?;

        let security = SecurityConfig {
            jwt_secret,
            token_ttl_secs: parse_var(&lookup, "TOKEN_TTL_SECS")?.unwrap_or(3600),
        };

        let metrics_bind = parse_var(&lookup, "METRICS_BIND")?;

        let config = ServerConfig {
            bind,
            escrow,
            security,
            metrics_bind,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        if self.security.token_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                var: "TOKEN_TTL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        self.escrow
            .validate()
            .map_err(|reason| ConfigError::Invalid {
                var: "ESCROW".to_string(),
                reason,
            })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an optional variable. Present but unparsable values are errors.
fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| {
            v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var: key.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
