pub mod error;
pub mod headers;

use std::fmt;
use std::time::Duration;

pub use error::{RelayError, RelayResult};
pub use headers::{Headers, header_get, is_hop_by_hop_or_framing_header};

/// Mistral's OpenAI-compatible API root.
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_FIRST_BYTE_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum RelayConfigError {
    #[error("missing required config field: {0}")]
    MissingField(&'static str),
}

/// Final configuration of the running process. Built once at startup, then shared read-only.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token for the upstream API. Never logged.
    pub api_key: String,
    pub base_url: String,
    /// Enables request-body and chunk logging, and verbose startup logs.
    pub debug: bool,
    pub connect_timeout: Duration,
    /// Deadline for upstream response headers.
    pub first_byte_timeout: Duration,
    /// Longest gap allowed between two upstream stream chunks.
    pub stream_idle_timeout: Duration,
}

impl RelayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("debug", &self.debug)
            .field("connect_timeout", &self.connect_timeout)
            .field("first_byte_timeout", &self.first_byte_timeout)
            .field("stream_idle_timeout", &self.stream_idle_timeout)
            .finish()
    }
}

/// Optional layer used for merging config sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub debug: Option<bool>,
    pub first_byte_timeout_secs: Option<u64>,
    pub stream_idle_timeout_secs: Option<u64>,
}

impl RelayConfigPatch {
    pub fn overlay(&mut self, other: RelayConfigPatch) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.debug.is_some() {
            self.debug = other.debug;
        }
        if other.first_byte_timeout_secs.is_some() {
            self.first_byte_timeout_secs = other.first_byte_timeout_secs;
        }
        if other.stream_idle_timeout_secs.is_some() {
            self.stream_idle_timeout_secs = other.stream_idle_timeout_secs;
        }
    }

    pub fn into_config(self) -> Result<RelayConfig, RelayConfigError> {
        Ok(RelayConfig {
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            api_key: self
                .api_key
                .ok_or(RelayConfigError::MissingField("api_key"))?,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            debug: self.debug.unwrap_or(false),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            first_byte_timeout: Duration::from_secs(
                self.first_byte_timeout_secs
                    .unwrap_or(DEFAULT_FIRST_BYTE_TIMEOUT_SECS),
            ),
            stream_idle_timeout: Duration::from_secs(
                self.stream_idle_timeout_secs
                    .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT_SECS),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_fails() {
        let err = RelayConfigPatch::default().into_config().unwrap_err();
        assert!(matches!(err, RelayConfigError::MissingField("api_key")));
    }

    #[test]
    fn defaults_fill_everything_but_the_key() {
        let config = RelayConfigPatch {
            api_key: Some("k".to_string()),
            ..Default::default()
        }
        .into_config()
        .unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.base_url, "https://api.mistral.ai/v1");
        assert!(!config.debug);
        assert_eq!(config.bind_addr(), "127.0.0.1:8000");
    }

    #[test]
    fn overlay_keeps_unset_fields() {
        let mut base = RelayConfigPatch {
            port: Some(9000),
            api_key: Some("old".to_string()),
            ..Default::default()
        };
        base.overlay(RelayConfigPatch {
            api_key: Some("new".to_string()),
            debug: Some(true),
            ..Default::default()
        });

        assert_eq!(base.port, Some(9000));
        assert_eq!(base.api_key.as_deref(), Some("new"));
        assert_eq!(base.debug, Some(true));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let config = RelayConfigPatch {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        }
        .into_config()
        .unwrap();

        assert!(!format!("{config:?}").contains("sk-secret"));
    }
}
