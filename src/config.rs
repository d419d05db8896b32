use crate::error::{EdcError, Result};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_TERMINAL_PORT: u16 = 10009;
pub const DEFAULT_SUCCESS_PROBABILITY: f64 = 0.9;

/// How the gateway authenticates outbound requests.
#[derive(Clone, PartialEq, Eq)]
pub enum GatewayCredential {
    Bearer(String),
    Basic { username: String, password: String },
}

impl fmt::Debug for GatewayCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayCredential::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            GatewayCredential::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base endpoint; authorizations post here, follow-ups to `/reauthorize`
    /// and `/capture` below it.
    pub endpoint: String,
    pub credential: GatewayCredential,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(endpoint: impl Into<String>, credential: GatewayCredential) -> Self {
        Self {
            endpoint: endpoint.into(),
            credential,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TerminalConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    /// Upper bound on the wait for a complete response frame.
    pub read_timeout: Duration,
    pub max_frame_len: usize,
}

impl TerminalConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_TERMINAL_PORT,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(2),
            max_frame_len: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalEmulationConfig {
    success_probability: f64,
}

impl LocalEmulationConfig {
    pub fn new(success_probability: f64) -> Result<Self> {
        if (0.0..=1.0).contains(&success_probability) {
            Ok(Self {
                success_probability,
            })
        } else {
            Err(EdcError::InvalidInput(format!(
                "success probability must be within [0, 1], got {success_probability}"
            )))
        }
    }

    pub fn success_probability(&self) -> f64 {
        self.success_probability
    }
}

impl Default for LocalEmulationConfig {
    fn default() -> Self {
        Self {
            success_probability: DEFAULT_SUCCESS_PROBABILITY,
        }
    }
}
