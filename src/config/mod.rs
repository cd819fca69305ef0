use std::env;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while reading configuration at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?} is not a valid {expected}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub ssh: SshConfig,
    pub mysql: MySqlConfig,
    pub api: ApiConfig,
}

/// SSH server the tunnel is opened against
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
}

/// Database reached through the tunnel. `host`/`port` are as seen from the SSH server.
#[derive(Clone)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_host: String,
    pub bind_port: u16,
    pub connect_timeout_secs: u64,
    pub enable_cors: bool,
}

impl std::fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            bind_port: 9070,
            connect_timeout_secs: 30,
            enable_cors: false,
        }
    }
}

impl ApiConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl GatewayConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from any variable source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let config = Self {
            ssh: SshConfig {
                host: required("SSH_HOST")?,
                port: parse_var("SSH_PORT", &required("SSH_PORT")?, "port number")?,
            },
            mysql: MySqlConfig {
                host: required("MYSQL_HOST")?,
                port: parse_var("MYSQL_PORT", &required("MYSQL_PORT")?, "port number")?,
                user: required("MYSQL_USER")?,
                password: lookup("MYSQL_PASSWORD").ok_or(ConfigError::Missing("MYSQL_PASSWORD"))?,
                database: required("MYSQL_DB")?,
            },
            api: ApiConfig::default(),
        };

        config.with_env_overrides(&lookup)
    }

    fn with_env_overrides<F>(mut self, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GATEWAY_HOST") {
            self.api.bind_host = v;
        }
        if let Some(v) = lookup("GATEWAY_PORT") {
            self.api.bind_port = parse_var("GATEWAY_PORT", &v, "port number")?;
        }
        if let Some(v) = lookup("GATEWAY_CONNECT_TIMEOUT_SECS") {
            self.api.connect_timeout_secs =
                parse_var("GATEWAY_CONNECT_TIMEOUT_SECS", &v, "number of seconds")?;
        }
        if let Some(v) = lookup("GATEWAY_ENABLE_CORS") {
            self.api.enable_cors = parse_var("GATEWAY_ENABLE_CORS", &v, "boolean")?;
        }

        Ok(self)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api.bind_host, self.api.bind_port)
    }
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    value: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
        expected,
    })
}
