use std::time::Duration;

/// Адрес API по умолчанию: локальный узел разработки.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/";

#[derive(Debug, Clone)]
/// Настройки подключения к REST API.
pub struct ClientConfig {
    /// Базовый URL API, например `http://localhost:8000/api/`.
    pub base_url: String,
    /// Таймаут установки соединения.
    pub connect_timeout: Duration,
    /// Таймаут запроса целиком.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

impl ClientConfig {
    /// Настройки с указанным базовым URL и таймаутами по умолчанию.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(15),
        }
    }

    /// Переопределяет таймауты.
    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }
}
