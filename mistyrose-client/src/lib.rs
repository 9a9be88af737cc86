//! Клиентская библиотека для REST API узла mistyrose.
//!
//! Предоставляет единый API (`MistyroseClient`) поверх HTTP (`reqwest`):
//! - сессия с bearer-токеном и прозрачным обновлением токена по 401;
//! - загрузка домашней ленты с фильтрацией по авторизации и вкладке;
//! - обёртки над эндпоинтами постов, профилей, подписок, лайков и комментариев.
//!
//! Учётные данные живут в `CredentialStore`, который передаётся клиенту
//! явно. Глобального состояния нет.
#![warn(missing_docs)]

mod config;
mod error;
pub mod feed;
mod http_client;
mod models;
mod session;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};
use validator::Validate;

pub use config::{ClientConfig, DEFAULT_API_BASE_URL};
pub use error::{ClientError, ClientResult};
pub use feed::{AuthorizationIndex, FeedTab};
pub use models::{
    AuthorId, AuthorRef, AuthorSummary, Comment, ContentType, Credentials, FeedEntry, FeedPage,
    Like, Post, PostAuthorization, PostDraft, PostId, Profile, ProfileEdit, Visibility,
};
pub use reqwest::{Method, Response};
pub use session::{CredentialStore, FileCredentialStore, MemoryCredentialStore, Session};

use http_client::HttpClient;

#[derive(Debug, Clone)]
/// Клиент узла mistyrose. Клоны разделяют одну сессию.
pub struct MistyroseClient {
    http: HttpClient,
}

impl MistyroseClient {
    /// Создаёт клиент с собственной сессией поверх хранилища.
    pub fn new(config: ClientConfig, store: impl CredentialStore + 'static) -> ClientResult<Self> {
        Self::with_session(config, Arc::new(Session::new(store)))
    }

    /// Создаёт клиент поверх уже существующей сессии.
    pub fn with_session(config: ClientConfig, session: Arc<Session>) -> ClientResult<Self> {
        Ok(Self {
            http: HttpClient::new(&config, session)?,
        })
    }

    /// Сессия клиента.
    pub fn session(&self) -> &Session {
        self.http.session()
    }

    /// Текущий автор, если пользователь вошёл.
    pub fn current_author(&self) -> ClientResult<Option<AuthorId>> {
        self.session().author_id()
    }

    fn require_author(&self) -> ClientResult<AuthorId> {
        self.current_author()?.ok_or(ClientError::NotLoggedIn)
    }

    /// Выполняет вход и сохраняет пару токенов в хранилище.
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<AuthorId> {
        let credentials = self.http.login(username, password).await?;
        self.session().start(&credentials)?;
        debug!(author_id = %credentials.author_id, "logged in");
        Ok(credentials.author_id)
    }

    /// Выход: удаляет все сохранённые учётные данные.
    pub fn logout(&self) -> ClientResult<()> {
        self.session().end()
    }

    /// Произвольный авторизованный запрос к API.
    ///
    /// `path` задаётся относительно базового URL. На 401 токен обновляется и
    /// запрос повторяется не больше одного раза.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<Response> {
        self.http.request(method, path, body).await
    }

    /// Загружает домашнюю ленту для текущего автора и выбранной вкладки.
    ///
    /// Профили авторов видимых постов запрашиваются параллельно; неудачный
    /// запрос профиля даёт пустую карточку автора, а не ошибку ленты.
    pub async fn load_feed(&self, tab: FeedTab) -> ClientResult<Vec<FeedEntry>> {
        let viewer = self.require_author()?;
        let page = self.http.fetch_feed().await?;

        let index = AuthorizationIndex::from_entries(page.authorized_authors_per_post)?;
        let visible = feed::filter_visible(&page.posts, &index, &viewer, tab)?;
        debug!(
            total = page.posts.len(),
            authorized_entries = index.len(),
            visible = visible.len(),
            %tab,
            "feed filtered"
        );

        let authors = self.author_summaries(&visible).await;
        Ok(visible
            .into_iter()
            .map(|post| FeedEntry {
                author: authors.get(&post.author_id).cloned().unwrap_or_default(),
                post: post.clone(),
            })
            .collect())
    }

    async fn author_summaries(&self, posts: &[&Post]) -> HashMap<AuthorId, AuthorSummary> {
        let mut authors: Vec<&AuthorId> = posts.iter().map(|post| &post.author_id).collect();
        authors.sort();
        authors.dedup();

        let lookups = authors.into_iter().map(|author| async move {
            let summary = match self.http.author_profile(author).await {
                Ok(profile) => AuthorSummary::from(&profile),
                Err(err) => {
                    warn!(author_id = %author, error = %err, "profile lookup failed");
                    AuthorSummary::default()
                }
            };
            (author.clone(), summary)
        });

        join_all(lookups).await.into_iter().collect()
    }

    /// Возвращает пост автора.
    pub async fn get_post(&self, author: &AuthorId, post: &PostId) -> ClientResult<Post> {
        self.http.get_post(author, post).await
    }

    /// Возвращает пост по полному идентификатору (URL поста).
    pub async fn get_post_by_fqid(&self, fqid: &str) -> ClientResult<Post> {
        self.http.get_post_by_fqid(fqid).await
    }

    /// Все посты автора.
    pub async fn list_author_posts(&self, author: &AuthorId) -> ClientResult<Vec<Post>> {
        self.http.list_author_posts(author).await
    }

    /// Создаёт пост от имени автора.
    ///
    /// Черновик проверяется до отправки.
    pub async fn create_post(&self, author: &AuthorId, draft: &PostDraft) -> ClientResult<Post> {
        draft.validate()?;
        self.http.create_post(author, draft).await
    }

    /// Обновляет пост.
    ///
    /// Черновик проверяется до отправки.
    pub async fn update_post(
        &self,
        author: &AuthorId,
        post: &PostId,
        draft: &PostDraft,
    ) -> ClientResult<Post> {
        draft.validate()?;
        self.http.update_post(author, post, draft).await
    }

    /// Удаляет пост.
    pub async fn delete_post(&self, author: &AuthorId, post: &PostId) -> ClientResult<()> {
        self.http.delete_post(author, post).await
    }

    /// Абсолютный URL изображения поста.
    pub async fn post_image_url(&self, author: &AuthorId, post: &PostId) -> ClientResult<String> {
        self.http.post_image_url(author, post).await
    }

    /// Профиль автора.
    pub async fn author_profile(&self, author: &AuthorId) -> ClientResult<Profile> {
        self.http.author_profile(author).await
    }

    /// Редактируемые поля профиля автора.
    pub async fn edit_profile(&self, author: &AuthorId) -> ClientResult<ProfileEdit> {
        self.http.edit_profile(author).await
    }

    /// Сохраняет профиль автора. Поля проверяются до отправки.
    pub async fn update_profile(
        &self,
        author: &AuthorId,
        edit: &ProfileEdit,
    ) -> ClientResult<ProfileEdit> {
        edit.validate()?;
        self.http.update_profile(author, edit).await
    }

    /// Подписан ли автор с полным URL `follower_fqid` на `author`.
    pub async fn follower_status(&self, author: &AuthorId, follower_fqid: &str) -> ClientResult<bool> {
        self.http.follower_status(author, follower_fqid).await
    }

    /// Принимает запрос на подписку к текущему автору.
    pub async fn accept_follow(&self, follower_fqid: &str) -> ClientResult<()> {
        let me = self.require_author()?;
        self.http.accept_follow(&me, follower_fqid).await?;
        debug!(author_id = %me, follower = follower_fqid, "follow request accepted");
        Ok(())
    }

    /// Отклоняет запрос на подписку к текущему автору.
    pub async fn decline_follow(&self, follower_fqid: &str) -> ClientResult<()> {
        let me = self.require_author()?;
        self.http.decline_follow(&me, follower_fqid).await?;
        debug!(author_id = %me, follower = follower_fqid, "follow request declined");
        Ok(())
    }

    /// Ставит лайк посту от имени текущего автора.
    pub async fn like_post(&self, author: &AuthorId, post: &PostId) -> ClientResult<Like> {
        let liker = self.require_author()?;
        let object_url = self.http.post_url(author, post);
        self.http.like(&liker, &object_url).await
    }

    /// Ставит лайк комментарию по его полному URL.
    pub async fn like_comment(&self, comment_url: &str) -> ClientResult<Like> {
        if !comment_url.contains("/commented/") {
            return Err(ClientError::InvalidRequest(format!(
                "not a comment url: {comment_url}"
            )));
        }
        let liker = self.require_author()?;
        self.http.like(&liker, comment_url).await
    }

    /// Лайки поста.
    pub async fn post_likes(&self, author: &AuthorId, post: &PostId) -> ClientResult<Vec<Like>> {
        self.http.post_likes(author, post).await
    }

    /// Комментирует пост от имени текущего автора.
    pub async fn comment_on_post(
        &self,
        author: &AuthorId,
        post: &PostId,
        text: &str,
    ) -> ClientResult<Comment> {
        if text.trim().is_empty() {
            return Err(ClientError::InvalidRequest(
                "comment must not be empty".to_string(),
            ));
        }
        let commenter = self.require_author()?;
        let post_url = self.http.post_url(author, post);
        self.http.comment(&commenter, &post_url, text).await
    }

    /// Комментарии к посту.
    pub async fn post_comments(&self, author: &AuthorId, post: &PostId) -> ClientResult<Vec<Comment>> {
        self.http.post_comments(author, post).await
    }
}
