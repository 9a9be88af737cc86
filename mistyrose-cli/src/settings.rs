use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use mistyrose_client::{ClientConfig, DEFAULT_API_BASE_URL};

const DEFAULT_CREDENTIALS_FILE: &str = ".mistyrose_session";

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) api_url: String,
    pub(crate) credentials_file: PathBuf,
    pub(crate) connect_timeout_secs: u64,
    pub(crate) request_timeout_secs: u64,
    pub(crate) log_level: String,
}

impl Settings {
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Читает настройки через произвольный источник переменных.
    ///
    /// Пустые значения считаются неустановленными.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_url = get("MISTYROSE_API_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let credentials_file = get("MISTYROSE_CREDENTIALS_FILE")
            .unwrap_or_else(|| DEFAULT_CREDENTIALS_FILE.to_string())
            .into();
        let connect_timeout_secs =
            parse_positive("HTTP_CONNECT_TIMEOUT_SECS", get("HTTP_CONNECT_TIMEOUT_SECS"), 5)?;
        let request_timeout_secs =
            parse_positive("HTTP_REQUEST_TIMEOUT_SECS", get("HTTP_REQUEST_TIMEOUT_SECS"), 15)?;
        let log_level = get("LOG_LEVEL").unwrap_or_else(|| "warn".to_string());

        Ok(Self {
            api_url,
            credentials_file,
            connect_timeout_secs,
            request_timeout_secs,
            log_level,
        })
    }

    pub(crate) fn client_config(&self, api_url_override: Option<String>) -> ClientConfig {
        let base_url = normalize_server(api_url_override.unwrap_or_else(|| self.api_url.clone()));
        ClientConfig::new(base_url).with_timeouts(
            Duration::from_secs(self.connect_timeout_secs),
            Duration::from_secs(self.request_timeout_secs),
        )
    }
}

fn parse_positive(key: &str, raw: Option<String>, default: u64) -> Result<u64> {
    let value = match raw {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("Failed to parse {key}, expecting positive integer"))?,
        None => default,
    };

    if value == 0 {
        return Err(anyhow!("{key} must be > 0"));
    }
    Ok(value)
}

fn normalize_server(server: String) -> String {
    if server.starts_with("http://") || server.starts_with("https://") {
        return server;
    }

    format!("http://{server}")
}
