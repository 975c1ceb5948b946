//! Engine and transport configuration.
//!
//! # Design
//! Both structs deserialize from JSON with every field optional, so a config
//! file only names what it overrides. Durations are written in milliseconds.
//! The defaults verify TLS and send no cookie; callers embedding the engine
//! against a specific site opt into `site_cookie` or `verify_tls = false`.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which statuses count as `Response::success`.
///
/// The raw status is always kept on the response regardless of policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessPolicy {
    /// Only 200 is a success.
    #[default]
    ExactOk,
    /// Any 2xx status is a success.
    Any2xx,
}

impl SuccessPolicy {
    pub fn accepts(self, status: u16) -> bool {
        match self {
            SuccessPolicy::ExactOk => status == 200,
            SuccessPolicy::Any2xx => (200..300).contains(&status),
        }
    }
}

/// How the executor prepares each transport call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Cookie header value sent ahead of caller headers on every request.
    pub site_cookie: Option<String>,
    /// Verify server certificates and host names.
    pub verify_tls: bool,
    /// Upper bound for the whole exchange; `None` disables it.
    #[serde(with = "millis_opt", rename = "total_timeout_ms")]
    pub total_timeout: Option<Duration>,
    pub success_policy: SuccessPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            site_cookie: None,
            verify_tls: true,
            total_timeout: Some(Duration::from_secs(300)),
            success_policy: SuccessPolicy::ExactOk,
        }
    }
}

impl TransportConfig {
    pub fn with_site_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.site_cookie = Some(cookie.into());
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_total_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.total_timeout = timeout;
        self
    }

    pub fn with_success_policy(mut self, policy: SuccessPolicy) -> Self {
        self.success_policy = policy;
        self
    }
}

/// Upper bound for `EngineConfig::idle_wait`; the worker must re-check the
/// shutdown flag at least this often.
pub const MAX_IDLE_WAIT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Longest the worker sleeps on an empty queue before re-checking the
    /// shutdown flag.
    #[serde(with = "millis", rename = "idle_wait_ms")]
    pub idle_wait: Duration,
    pub transport: TransportConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_wait: Duration::from_millis(100),
            transport: TransportConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_wait.is_zero() {
            return Err(ConfigError::Invalid("idle_wait_ms must be greater than zero".into()));
        }
        if self.idle_wait > MAX_IDLE_WAIT {
            return Err(ConfigError::Invalid(format!(
                "idle_wait_ms must be at most {}",
                MAX_IDLE_WAIT.as_millis()
            )));
        }
        if let Some(total) = self.transport.total_timeout {
            if Instant::now().checked_add(total).is_none() {
                return Err(ConfigError::Invalid("total_timeout_ms is out of range".into()));
            }
        }
        if let Some(cookie) = &self.transport.site_cookie {
            if cookie.contains(['\r', '\n']) {
                return Err(ConfigError::Invalid("site_cookie must be a single line".into()));
            }
        }
        Ok(())
    }

    pub fn with_idle_wait(mut self, idle_wait: Duration) -> Self {
        self.idle_wait = idle_wait;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod millis_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|v| v.map(Duration::from_millis))
    }
}
