use thiserror::Error;

use crate::models::PostId;

#[derive(Debug, Error)]
/// Ошибки клиентской библиотеки `mistyrose-client`.
pub enum ClientError {
    /// Ошибка HTTP-транспорта (`reqwest`): сеть, таймаут, декодирование тела.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 401, который не удалось восстановить обновлением токена.
    #[error("unauthorized")]
    Unauthorized,

    /// HTTP 403. Обновление токена не выполняется.
    #[error("forbidden")]
    Forbidden,

    /// Запрошенный ресурс не найден.
    #[error("not found")]
    NotFound,

    /// Прочие ответы 4xx.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Ответы 5xx и любые другие неуспешные статусы.
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP-статус ответа.
        status: u16,
        /// Сообщение из тела ответа.
        message: String,
    },

    /// Пост из ленты пришёл без записи авторизации.
    #[error("post {0} has no authorization entry")]
    MissingAuthorization(PostId),

    /// Для одного поста пришло больше одной записи авторизации.
    #[error("post {0} has more than one authorization entry")]
    DuplicateAuthorization(PostId),

    /// Операции нужен текущий автор, но учётные данные не сохранены.
    #[error("not logged in")]
    NotLoggedIn,

    /// Черновик поста не прошёл клиентскую валидацию.
    #[error("validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Ошибка ввода-вывода хранилища учётных данных.
    #[error("credential storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Ошибка (де)сериализации JSON вне HTTP-ответа.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Результат операций `mistyrose-client`.
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub(crate) fn from_http_status(status: reqwest::StatusCode, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| format!("http status {status}"));
        match status {
            reqwest::StatusCode::UNAUTHORIZED => Self::Unauthorized,
            reqwest::StatusCode::FORBIDDEN => Self::Forbidden,
            reqwest::StatusCode::NOT_FOUND => Self::NotFound,
            status if status.is_client_error() => Self::InvalidRequest(message),
            status => Self::Server {
                status: status.as_u16(),
                message,
            },
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_http_status(status, None);
        }
        Self::Http(err)
    }

    /// `true`, если ошибка означает отказ в авторизации (401).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn maps_auth_statuses_separately() {
        assert!(matches!(
            ClientError::from_http_status(StatusCode::UNAUTHORIZED, None),
            ClientError::Unauthorized
        ));
        assert!(matches!(
            ClientError::from_http_status(StatusCode::FORBIDDEN, None),
            ClientError::Forbidden
        ));
    }

    #[test]
    fn client_errors_keep_message() {
        let err = ClientError::from_http_status(StatusCode::CONFLICT, Some("exists".to_string()));
        match err {
            ClientError::InvalidRequest(message) => assert_eq!(message, "exists"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn server_errors_keep_status() {
        let err = ClientError::from_http_status(StatusCode::BAD_GATEWAY, None);
        match err {
            ClientError::Server { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "http status 502 Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
