//! Gateway configuration and the env-file loader.
//!
//! Deployments keep credentials in a small `KEY=VALUE` file (by default
//! `/opt/sms/.env`). [`EnvSource::load`] reads it and lets variables already
//! present in the process environment take precedence, so a value exported
//! by the service manager always wins over the file.
//!
//! | Key | Fallback | Default |
//! |-----|----------|---------|
//! | `GATEWAY_HOST` | `TG_HOST` | required |
//! | `GATEWAY_USER` | `TG_USER` | required |
//! | `GATEWAY_SECRET` | `TG_PASS` | required |
//! | `GATEWAY_PORT` | `TG_PORT` | `5038` |
//! | `GATEWAY_DEFAULT_SIM` | `TG_DEFAULT_SIM` | `1` |

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use smsgate_ami::exchange::{DEFAULT_COMMAND_WAIT, DEFAULT_FOLLOW_TIMEOUT};
use smsgate_ami::session::{
    DEFAULT_KEEPALIVE_COMMAND, DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_LOGIN_TIMEOUT,
    DEFAULT_RECONNECT_DELAY, SessionConfig,
};
use smsgate_core::error::{Error, Result};
use smsgate_transport::DEFAULT_CONNECT_TIMEOUT;

/// Default manager-interface port.
pub const DEFAULT_PORT: u16 = 5038;

/// SIM used when none is given or a port string has no digits.
pub const DEFAULT_SIM: u32 = 1;

/// Conventional location of the deployment env file.
pub const DEFAULT_ENV_FILE: &str = "/opt/sms/.env";

/// Everything needed to reach and talk to one gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub secret: String,
    pub default_sim: u32,
    pub reconnect_delay: Duration,
    pub login_timeout: Duration,
    pub keepalive_interval: Duration,
    pub keepalive_command: String,
    pub connect_timeout: Duration,
    /// Reply window for commands issued without an explicit wait.
    pub command_wait: Duration,
    /// Per-frame wait while collecting a `Follows` reply.
    pub follow_timeout: Duration,
}

impl GatewayConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            secret: secret.into(),
            default_sim: DEFAULT_SIM,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            keepalive_command: DEFAULT_KEEPALIVE_COMMAND.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_wait: DEFAULT_COMMAND_WAIT,
            follow_timeout: DEFAULT_FOLLOW_TIMEOUT,
        }
    }

    /// Build from environment-style variables.
    ///
    /// Missing required keys produce `Error::Config("<KEY> is required")`.
    pub fn from_env(env: &EnvSource) -> Result<Self> {
        let host = required(env, "GATEWAY_HOST", "TG_HOST")?;
        let username = required(env, "GATEWAY_USER", "TG_USER")?;
        let secret = required(env, "GATEWAY_SECRET", "TG_PASS")?;

        let mut config = Self::new(host, username, secret);
        if let Some(port) = optional(env, "GATEWAY_PORT", "TG_PORT") {
            config.port = port.parse().map_err(|_| {
                Error::Config(format!("GATEWAY_PORT must be a port number, got {port:?}"))
            })?;
        }
        if let Some(sim) = optional(env, "GATEWAY_DEFAULT_SIM", "TG_DEFAULT_SIM") {
            config.default_sim = sim.parse().map_err(|_| {
                Error::Config(format!("GATEWAY_DEFAULT_SIM must be a number, got {sim:?}"))
            })?;
        }
        Ok(config)
    }

    /// Load an env file (process variables win) and build from it.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_env(&EnvSource::load(path)?)
    }

    /// `host:port` for logging.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub(crate) fn session_config(&self) -> SessionConfig {
        let mut session = SessionConfig::new(&self.username, &self.secret);
        session.reconnect_delay = self.reconnect_delay;
        session.login_timeout = self.login_timeout;
        session.keepalive_interval = self.keepalive_interval;
        session.keepalive_command = self.keepalive_command.clone();
        session.keepalive_wait = self.command_wait;
        session
    }
}

fn required(env: &EnvSource, key: &str, fallback: &str) -> Result<String> {
    optional(env, key, fallback)
        .map(str::to_string)
        .ok_or_else(|| Error::Config(format!("{key} is required")))
}

fn optional<'a>(env: &'a EnvSource, key: &str, fallback: &str) -> Option<&'a str> {
    env.get(key).or_else(|| env.get(fallback))
}

/// A resolved set of `KEY=VALUE` variables.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Parse env-file contents.
    ///
    /// Blank lines and `#` comments are skipped, as are lines without `=`.
    /// Keys and values are trimmed. A value wrapped in matching quotes is
    /// unwrapped verbatim; otherwise a trailing ` # comment` is dropped.
    pub fn parse(contents: &str) -> Self {
        let mut vars = HashMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            vars.insert(key.to_string(), parse_value(value.trim()));
        }
        Self { vars }
    }

    /// Only the current process environment. Variables that are not
    /// valid UTF-8 are skipped.
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Read `path`, then overlay the process environment. A missing file
    /// is not an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut source = match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "env file not found");
                Self::default()
            }
            Err(e) => return Err(Error::Io(e)),
        };
        source.overlay(Self::from_process());
        Ok(source)
    }

    /// Let every variable in `other` replace the same key here.
    pub fn overlay(&mut self, other: EnvSource) {
        self.vars.extend(other.vars);
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Value for `key`; empty values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

fn parse_value(raw: &str) -> String {
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return raw[1..raw.len() - 1].to_string();
        }
    }
    match raw.find(" #") {
        Some(pos) => raw[..pos].trim_end().to_string(),
        None => raw.to_string(),
    }
}
