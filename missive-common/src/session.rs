use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

const fn default_port() -> u16 {
    25
}

const fn default_timeout() -> u64 {
    30
}

/// How the transport secures its connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsMode {
    /// Plain text connection
    #[default]
    None,
    /// Upgrade a plain connection with STARTTLS (required)
    StartTls,
    /// TLS from the first byte (SMTPS)
    Wrapper,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Transport configuration shared by every message of a batch.
///
/// The pipeline passes a session through untouched; only the transport (and
/// a store that needs it to rebuild messages) looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub host: String,

    /// Default: 25
    #[serde(default = "default_port")]
    pub port: u16,

    /// Name announced in EHLO, the transport picks one when unset
    #[serde(default)]
    pub helo: Option<String>,

    #[serde(default)]
    pub credentials: Option<Credentials>,

    #[serde(default)]
    pub tls: TlsMode,

    /// Connection and command timeout in seconds
    ///
    /// Default: 30 seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Free-form settings for custom transports
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Session {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            helo: None,
            credentials: None,
            tls: TlsMode::None,
            timeout_secs: default_timeout(),
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    #[must_use]
    pub const fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `host:port`, for logging
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new("localhost", default_port())
    }
}
