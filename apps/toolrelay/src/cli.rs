use anyhow::Context;
use clap::Parser;

use toolrelay_common::RelayConfigPatch;

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "toolrelay",
    version,
    about = "OpenAI-compatible relay in front of the Mistral chat API"
)]
pub(crate) struct Cli {
    /// Upstream API key (required).
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    pub(crate) api_key: Option<String>,

    /// Upstream API root.
    #[arg(long, env = "TOOLRELAY_BASE_URL")]
    pub(crate) base_url: Option<String>,

    /// Bind host.
    #[arg(long, env = "HOST")]
    pub(crate) host: Option<String>,

    /// Bind port.
    #[arg(long, env = "PORT")]
    pub(crate) port: Option<String>,

    /// Log request bodies and relayed chunks.
    #[arg(long, env = "DEBUG")]
    pub(crate) debug: Option<String>,

    /// Seconds to wait for upstream response headers.
    #[arg(long, env = "TOOLRELAY_FIRST_BYTE_TIMEOUT_SECS")]
    pub(crate) first_byte_timeout_secs: Option<String>,

    /// Seconds of upstream silence tolerated mid-stream.
    #[arg(long, env = "TOOLRELAY_STREAM_IDLE_TIMEOUT_SECS")]
    pub(crate) stream_idle_timeout_secs: Option<String>,
}

impl Cli {
    /// clap already gives CLI precedence over ENV; this only cleans and parses values.
    pub(crate) fn into_patch(self) -> anyhow::Result<RelayConfigPatch> {
        Ok(RelayConfigPatch {
            host: sanitize_optional_env_value(self.host),
            port: parse_u16_env_value(self.port, "PORT")?,
            api_key: sanitize_optional_env_value(self.api_key),
            base_url: sanitize_optional_env_value(self.base_url),
            debug: parse_bool_env_value(self.debug, "DEBUG")?,
            first_byte_timeout_secs: parse_u64_env_value(
                self.first_byte_timeout_secs,
                "TOOLRELAY_FIRST_BYTE_TIMEOUT_SECS",
            )?,
            stream_idle_timeout_secs: parse_u64_env_value(
                self.stream_idle_timeout_secs,
                "TOOLRELAY_STREAM_IDLE_TIMEOUT_SECS",
            )?,
        })
    }
}

fn sanitize_optional_env_value(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        return None;
    }
    // Unresolved `${VAR}` placeholders from deploy templates count as unset.
    if trimmed.starts_with("${") && trimmed.ends_with('}') {
        return None;
    }
    Some(trimmed)
}

fn parse_u16_env_value(value: Option<String>, env_name: &str) -> anyhow::Result<Option<u16>> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = raw
        .parse::<u16>()
        .with_context(|| format!("invalid {env_name} value: {raw}"))?;
    Ok(Some(parsed))
}

fn parse_u64_env_value(value: Option<String>, env_name: &str) -> anyhow::Result<Option<u64>> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = raw
        .parse::<u64>()
        .with_context(|| format!("invalid {env_name} value: {raw}"))?;
    Ok(Some(parsed))
}

fn parse_bool_env_value(value: Option<String>, env_name: &str) -> anyhow::Result<Option<bool>> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => return Err(anyhow::anyhow!("invalid {env_name} value: {raw}")),
    };
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn placeholders_and_blanks_count_as_unset() {
        assert_eq!(sanitize_optional_env_value(some("${MISTRAL_API_KEY}")), None);
        assert_eq!(sanitize_optional_env_value(some("   ")), None);
        assert_eq!(sanitize_optional_env_value(None), None);
        assert_eq!(sanitize_optional_env_value(some(" key ")), some("key"));
    }

    #[test]
    fn debug_flag_parsing() {
        for raw in ["true", "TRUE", "1", "yes", "on"] {
            assert_eq!(parse_bool_env_value(some(raw), "DEBUG").unwrap(), Some(true));
        }
        for raw in ["false", "0", "no", "Off"] {
            assert_eq!(parse_bool_env_value(some(raw), "DEBUG").unwrap(), Some(false));
        }
        assert_eq!(parse_bool_env_value(None, "DEBUG").unwrap(), None);
        let err = parse_bool_env_value(some("verbose"), "DEBUG").unwrap_err();
        assert!(err.to_string().contains("DEBUG"));
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(parse_u16_env_value(some("80000"), "PORT").is_err());
        assert_eq!(parse_u16_env_value(some("9000"), "PORT").unwrap(), Some(9000));
    }

    #[test]
    fn patch_without_port_defaults_to_8000() {
        let config = Cli {
            api_key: some("k"),
            ..Default::default()
        }
        .into_patch()
        .unwrap()
        .into_config()
        .unwrap();

        assert_eq!(config.port, 8000);
        assert!(!config.debug);
    }

    #[test]
    fn missing_api_key_fails_config() {
        let patch = Cli {
            api_key: some("${MISTRAL_API_KEY}"),
            ..Default::default()
        }
        .into_patch()
        .unwrap();
        assert!(patch.into_config().is_err());
    }

    #[test]
    fn flags_parse_into_patch() {
        let cli = Cli::try_parse_from([
            "toolrelay",
            "--api-key",
            "k",
            "--port",
            "9001",
            "--debug",
            "true",
            "--host",
            "0.0.0.0",
            "--base-url",
            "http://127.0.0.1:9/v1",
            "--first-byte-timeout-secs",
            "5",
            "--stream-idle-timeout-secs",
            "7",
        ])
        .unwrap();
        let patch = cli.into_patch().unwrap();

        assert_eq!(patch.port, Some(9001));
        assert_eq!(patch.debug, Some(true));
        assert_eq!(patch.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(patch.first_byte_timeout_secs, Some(5));
        assert_eq!(patch.stream_idle_timeout_secs, Some(7));
    }
}
