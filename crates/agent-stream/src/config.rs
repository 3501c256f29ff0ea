use std::time::Duration;

use crate::errors::ClientError;
use crate::session::SessionId;

/// Configuration for [`crate::AgentClient`] and [`crate::HttpTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the agent service.
    pub base_url: String,
    /// Path of the invoke endpoint.
    pub invoke_path: String,
    /// Delay between revealed characters.
    pub typing_interval: Duration,
    /// Optional overall request timeout.
    ///
    /// Unset by default: tool calls on the agent side can take a long time.
    pub timeout: Option<Duration>,
    /// Prefix of generated session ids.
    pub session_prefix: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            invoke_path: "/agent/invoke".to_string(),
            typing_interval: Duration::from_millis(20),
            timeout: None,
            session_prefix: "session".to_string(),
        }
    }
}

impl ClientConfig {
    /// Builds a config from defaults overridden by the environment.
    ///
    /// - `AGENT_STREAM_URL`: base URL.
    /// - `AGENT_STREAM_TYPING_MS`: milliseconds per revealed character.
    /// - `AGENT_STREAM_TIMEOUT_SECS`: request timeout.
    pub fn from_env() -> Result<Self, ClientError> {
        let mut config = Self::default();
        if let Some(url) = env_var("AGENT_STREAM_URL") {
            config.base_url = url;
        }
        if let Some(ms) = env_var("AGENT_STREAM_TYPING_MS") {
            config.typing_interval = Duration::from_millis(parse_env("AGENT_STREAM_TYPING_MS", &ms)?);
        }
        if let Some(secs) = env_var("AGENT_STREAM_TIMEOUT_SECS") {
            config.timeout = Some(Duration::from_secs(parse_env(
                "AGENT_STREAM_TIMEOUT_SECS",
                &secs,
            )?));
        }
        Ok(config)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn invoke_path(mut self, path: impl Into<String>) -> Self {
        self.invoke_path = path.into();
        self
    }

    pub fn typing_interval(mut self, interval: Duration) -> Self {
        self.typing_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn session_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.session_prefix = prefix.into();
        self
    }

    pub fn invoke_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.invoke_path.trim_start_matches('/')
        )
    }

    pub fn history_url(&self, session_id: &SessionId) -> String {
        format!(
            "{}/agent/history/{}",
            self.base_url.trim_end_matches('/'),
            session_id
        )
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Config("base_url must not be empty".into()));
        }
        if self.typing_interval.is_zero() {
            return Err(ClientError::Config(
                "typing_interval must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env(key: &str, value: &str) -> Result<u64, ClientError> {
    value
        .trim()
        .parse()
        .map_err(|e| ClientError::Config(format!("invalid {key}={value:?}: {e}")))
}
