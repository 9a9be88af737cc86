use std::sync::Arc;

use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{
    AuthorId, Comment, Credentials, FeedPage, Like, Post, PostDraft, PostId, Profile, ProfileEdit,
};
use crate::session::Session;

const REFRESH_PATH: &str = "token/refresh/";
const LOGIN_PATH: &str = "login/";

#[derive(Debug, Serialize)]
struct LoginRequestDto<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponseDto {
    access_token: String,
    refresh_token: String,
    author_id: String,
}

#[derive(Debug, Serialize)]
struct RefreshRequestDto<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponseDto {
    access: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponseDto {
    detail: Option<String>,
    message: Option<String>,
    #[serde(alias = "Error")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponseDto {
    image_url: String,
}

#[derive(Debug, Serialize)]
struct LikeRequestDto<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    object: &'a str,
}

#[derive(Debug, Serialize)]
struct CommentRequestDto<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    post: &'a str,
    comment: &'a str,
    #[serde(rename = "contentType")]
    content_type: &'static str,
}

impl From<LoginResponseDto> for Credentials {
    fn from(value: LoginResponseDto) -> Self {
        Self {
            author_id: AuthorId(value.author_id),
            access_token: value.access_token,
            refresh_token: Some(value.refresh_token),
        }
    }
}

/// Какая это попытка отправить запрос.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// Первая отправка.
    Initial,
    /// Повтор после обновления токена. Больше повторов не бывает.
    AfterRefresh,
}

#[derive(Debug, Clone)]
/// HTTP-клиент REST API с bearer-авторизацией и обновлением токена по 401.
pub(crate) struct HttpClient {
    base_url: String,
    client: Client,
    session: Arc<Session>,
}

impl HttpClient {
    pub(crate) fn new(config: &ClientConfig, session: Arc<Session>) -> ClientResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            base_url: config.base_url.clone(),
            client,
            session,
        })
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Абсолютный URL поста, как его ждут эндпоинты лайков и комментариев.
    pub(crate) fn post_url(&self, author: &AuthorId, post: &PostId) -> String {
        self.endpoint(&post_path(author, post))
    }

    async fn decode_error(response: Response) -> ClientError {
        let status = response.status();

        let message = match response.json::<ErrorResponseDto>().await {
            Ok(body) => body.detail.or(body.message).or(body.error),
            Err(_) => None,
        };
        ClientError::from_http_status(status, message)
    }

    async fn ensure_success(response: Response) -> ClientResult<Response> {
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }
        Ok(response)
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
        token: Option<&str>,
    ) -> ClientResult<Response> {
        let mut request = self.client.request(method.clone(), self.endpoint(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(ClientError::from_reqwest)
    }

    /// Отправляет авторизованный запрос.
    ///
    /// На 401 обновляет токен и повторяет запрос один раз. Сетевые ошибки и
    /// прочие HTTP-статусы возвращаются без повторов.
    pub(crate) async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<Response> {
        let mut attempt = Attempt::Initial;
        loop {
            let token = self.session.access_token()?;
            debug!(%method, path, ?attempt, "sending request");

            let response = self
                .send_once(&method, path, body.as_ref(), token.as_deref())
                .await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Self::ensure_success(response).await;
            }

            let failure = Self::decode_error(response).await;
            if attempt == Attempt::AfterRefresh {
                return Err(failure);
            }
            if !self.refresh_access_token(token.as_deref()).await? {
                return Err(failure);
            }
            attempt = Attempt::AfterRefresh;
        }
    }

    /// Обновляет access token, отклонённый сервером.
    ///
    /// Возвращает `true`, если в хранилище лежит свежий токен и запрос можно
    /// повторить. При неудачном обновлении очищает хранилище.
    async fn refresh_access_token(&self, rejected: Option<&str>) -> ClientResult<bool> {
        let _guard = self.session.lock_refresh().await;

        let Some(creds) = self.session.credentials()? else {
            debug!("no credentials stored, skipping refresh");
            return Ok(false);
        };
        if rejected != Some(creds.access_token.as_str()) {
            // другой запрос уже обновил токен, пока мы ждали мьютекс
            debug!("access token already refreshed by a concurrent request");
            return Ok(true);
        }
        let Some(refresh) = creds.refresh_token.as_deref() else {
            debug!("no refresh token stored, skipping refresh");
            return Ok(false);
        };

        match self.exchange_refresh_token(refresh).await {
            Ok(access) => {
                debug!("access token refreshed");
                self.session.replace_access_token(access)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, clearing stored credentials");
                self.session.end()?;
                Ok(false)
            }
        }
    }

    async fn exchange_refresh_token(&self, refresh: &str) -> ClientResult<String> {
        let dto: RefreshResponseDto = self
            .post_anonymous(REFRESH_PATH, &RefreshRequestDto { refresh })
            .await?;
        Ok(dto.access)
    }

    /// POST без bearer-заголовка и без повторов (вход, обновление токена).
    async fn post_anonymous<TReq, TRes>(&self, path: &str, body: &TReq) -> ClientResult<TRes>
    where
        TReq: Serialize,
        TRes: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        let response = Self::ensure_success(response).await?;

        response.json::<TRes>().await.map_err(ClientError::from_reqwest)
    }

    async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> ClientResult<TRes> {
        let response = self.request(Method::GET, path, None).await?;
        response.json::<TRes>().await.map_err(ClientError::from_reqwest)
    }

    /// универсальный helper для запросов с json-payload
    async fn send_json<TReq, TRes>(&self, method: Method, path: &str, body: &TReq) -> ClientResult<TRes>
    where
        TReq: Serialize,
        TRes: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let response = self.request(method, path, Some(body)).await?;
        response.json::<TRes>().await.map_err(ClientError::from_reqwest)
    }

    pub(crate) async fn login(&self, username: &str, password: &str) -> ClientResult<Credentials> {
        let payload = LoginRequestDto { username, password };
        let dto: LoginResponseDto = self.post_anonymous(LOGIN_PATH, &payload).await?;
        Ok(dto.into())
    }

    pub(crate) async fn fetch_feed(&self) -> ClientResult<FeedPage> {
        self.get_json("posts/").await
    }

    pub(crate) async fn get_post(&self, author: &AuthorId, post: &PostId) -> ClientResult<Post> {
        self.get_json(&post_path(author, post)).await
    }

    pub(crate) async fn get_post_by_fqid(&self, fqid: &str) -> ClientResult<Post> {
        self.get_json(&format!("posts/{}", urlencoding::encode(fqid)))
            .await
    }

    pub(crate) async fn list_author_posts(&self, author: &AuthorId) -> ClientResult<Vec<Post>> {
        self.get_json(&format!("authors/{author}/posts")).await
    }

    pub(crate) async fn create_post(&self, author: &AuthorId, draft: &PostDraft) -> ClientResult<Post> {
        self.send_json(Method::POST, &format!("authors/{author}/posts"), draft)
            .await
    }

    pub(crate) async fn update_post(
        &self,
        author: &AuthorId,
        post: &PostId,
        draft: &PostDraft,
    ) -> ClientResult<Post> {
        self.send_json(Method::PUT, &post_path(author, post), draft)
            .await
    }

    pub(crate) async fn delete_post(&self, author: &AuthorId, post: &PostId) -> ClientResult<()> {
        self.request(Method::DELETE, &post_path(author, post), None)
            .await?;
        Ok(())
    }

    pub(crate) async fn post_image_url(&self, author: &AuthorId, post: &PostId) -> ClientResult<String> {
        let dto: ImageResponseDto = self
            .get_json(&format!("{}/image", post_path(author, post)))
            .await?;
        Ok(dto.image_url)
    }

    pub(crate) async fn author_profile(&self, author: &AuthorId) -> ClientResult<Profile> {
        self.get_json(&format!("authors/{author}/profile/")).await
    }

    pub(crate) async fn edit_profile(&self, author: &AuthorId) -> ClientResult<ProfileEdit> {
        self.get_json(&profile_edit_path(author)).await
    }

    pub(crate) async fn update_profile(
        &self,
        author: &AuthorId,
        edit: &ProfileEdit,
    ) -> ClientResult<ProfileEdit> {
        self.send_json(Method::PUT, &profile_edit_path(author), edit)
            .await
    }

    /// 404 означает, что подписки нет.
    pub(crate) async fn follower_status(
        &self,
        author: &AuthorId,
        follower_fqid: &str,
    ) -> ClientResult<bool> {
        match self
            .request(Method::GET, &follower_path(author, follower_fqid), None)
            .await
        {
            Ok(_) => Ok(true),
            Err(ClientError::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub(crate) async fn accept_follow(&self, author: &AuthorId, follower_fqid: &str) -> ClientResult<()> {
        self.request(Method::PUT, &follower_path(author, follower_fqid), None)
            .await?;
        Ok(())
    }

    pub(crate) async fn decline_follow(&self, author: &AuthorId, follower_fqid: &str) -> ClientResult<()> {
        self.request(Method::DELETE, &follower_path(author, follower_fqid), None)
            .await?;
        Ok(())
    }

    pub(crate) async fn like(&self, liker: &AuthorId, object_url: &str) -> ClientResult<Like> {
        let payload = LikeRequestDto {
            kind: "like",
            object: object_url,
        };
        self.send_json(Method::POST, &format!("authors/{liker}/liked"), &payload)
            .await
    }

    pub(crate) async fn post_likes(&self, author: &AuthorId, post: &PostId) -> ClientResult<Vec<Like>> {
        self.get_json(&format!("{}/likes", post_path(author, post)))
            .await
    }

    pub(crate) async fn comment(
        &self,
        commenter: &AuthorId,
        post_url: &str,
        text: &str,
    ) -> ClientResult<Comment> {
        let payload = CommentRequestDto {
            kind: "comment",
            post: post_url,
            comment: text,
            content_type: "text/plain",
        };
        self.send_json(Method::POST, &format!("authors/{commenter}/commented"), &payload)
            .await
    }

    pub(crate) async fn post_comments(
        &self,
        author: &AuthorId,
        post: &PostId,
    ) -> ClientResult<Vec<Comment>> {
        self.get_json(&format!("{}/comments", post_path(author, post)))
            .await
    }
}

fn post_path(author: &AuthorId, post: &PostId) -> String {
    format!("authors/{author}/posts/{post}")
}

fn profile_edit_path(author: &AuthorId) -> String {
    format!("authors/{author}/profile/edit/")
}

/// Полный URL подписчика кодируется в один сегмент пути.
fn follower_path(author: &AuthorId, follower_fqid: &str) -> String {
    format!(
        "authors/{author}/followers/{}",
        urlencoding::encode(follower_fqid)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryCredentialStore;

    fn client(base_url: &str) -> HttpClient {
        let config = ClientConfig::new(base_url);
        let session = Arc::new(Session::new(MemoryCredentialStore::new()));
        HttpClient::new(&config, session).expect("client must build")
    }

    #[test]
    fn endpoint_normalizes_slashes() {
        let client = client("http://localhost:8000/api/");
        assert_eq!(client.endpoint("/posts/"), "http://localhost:8000/api/posts/");
        assert_eq!(client.endpoint("token/refresh/"), "http://localhost:8000/api/token/refresh/");
    }

    #[test]
    fn post_url_is_absolute() {
        let client = client("http://localhost:8000/api");
        let url = client.post_url(&AuthorId::from("a1"), &PostId::from("p1"));
        assert_eq!(url, "http://localhost:8000/api/authors/a1/posts/p1");
    }

    #[test]
    fn login_response_maps_to_credentials() {
        let raw = r#"{"access_token":"acc","refresh_token":"ref","author_id":"a1"}"#;
        let dto: LoginResponseDto = serde_json::from_str(raw).expect("dto");
        let creds = Credentials::from(dto);
        assert_eq!(creds.author_id.as_str(), "a1");
        assert_eq!(creds.access_token, "acc");
        assert_eq!(creds.refresh_token.as_deref(), Some("ref"));
    }

    #[test]
    fn like_payload_uses_wire_names() {
        let payload = LikeRequestDto {
            kind: "like",
            object: "http://node/api/authors/a/posts/p",
        };
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["type"], "like");
        assert_eq!(value["object"], "http://node/api/authors/a/posts/p");
    }

    #[test]
    fn comment_payload_uses_wire_names() {
        let payload = CommentRequestDto {
            kind: "comment",
            post: "http://node/api/authors/a/posts/p",
            comment: "nice",
            content_type: "text/plain",
        };
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["type"], "comment");
        assert_eq!(value["contentType"], "text/plain");
        assert_eq!(value["comment"], "nice");
    }

    #[test]
    fn error_body_accepts_capitalized_key() {
        let dto: ErrorResponseDto =
            serde_json::from_str(r#"{"Error":"object URL is required."}"#).expect("dto");
        assert_eq!(dto.error.as_deref(), Some("object URL is required."));
    }

    #[test]
    fn follower_fqid_is_a_single_path_segment() {
        let path = follower_path(&AuthorId::from("a1"), "http://remote/api/authors/bob");
        assert_eq!(
            path,
            "authors/a1/followers/http%3A%2F%2Fremote%2Fapi%2Fauthors%2Fbob"
        );
    }
}
