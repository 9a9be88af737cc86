use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Идентификатор автора.
pub struct AuthorId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Идентификатор поста.
pub struct PostId(pub String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// Строковое представление идентификатора.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(AuthorId);
string_id!(PostId);

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Пара токенов и автор, от имени которого они выданы.
///
/// Вход выдаёт все три поля, выход удаляет их вместе. Refresh token может
/// отсутствовать в хранилище: тогда access token по-прежнему отправляется,
/// но обновить его по 401 нельзя.
pub struct Credentials {
    /// Текущий автор.
    pub author_id: AuthorId,
    /// Короткоживущий access token.
    pub access_token: String,
    /// Refresh token для получения нового access token.
    pub refresh_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("author_id", &self.author_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Видимость поста.
pub enum Visibility {
    /// Виден всем.
    Public,
    /// Виден друзьям (взаимная подписка).
    Friends,
    /// Виден подписчикам, не попадает в публичную ленту.
    Unlisted,
    /// Пост, которым поделились.
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Тип содержимого поста.
pub enum ContentType {
    /// Простой текст.
    #[default]
    #[serde(rename = "text/plain")]
    PlainText,
    /// Markdown.
    #[serde(rename = "text/markdown")]
    Markdown,
    /// Изображение.
    #[serde(rename = "image")]
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Публичная модель поста.
pub struct Post {
    /// Идентификатор поста.
    pub id: PostId,
    /// Идентификатор автора.
    pub author_id: AuthorId,
    /// Заголовок.
    pub title: String,
    /// Краткое описание.
    #[serde(default)]
    pub description: Option<String>,
    /// Текст поста (plain или markdown).
    #[serde(default)]
    pub text_content: Option<String>,
    /// Путь к изображению на сервере.
    #[serde(default)]
    pub image_content: Option<String>,
    /// Тип содержимого.
    #[serde(default)]
    pub content_type: ContentType,
    /// Дата публикации (UTC).
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    /// Видимость.
    pub visibility: Visibility,
    /// Количество лайков.
    #[serde(default)]
    pub likes_count: u64,
    /// Количество комментариев.
    #[serde(default)]
    pub comments_count: u64,
    /// Исходный URL поста на удалённом узле.
    #[serde(default)]
    pub original_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Запись авторизации для одного поста ленты.
pub struct PostAuthorization {
    /// Пост, к которому относится запись.
    pub post_id: PostId,
    /// Авторы, которым пост разрешено показывать.
    pub authorized_authors: HashSet<AuthorId>,
    /// Видимость поста, как её видел сервер.
    #[serde(default)]
    pub visibility_type: Option<Visibility>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Ответ `GET posts/`: посты ленты и записи авторизации к ним.
pub struct FeedPage {
    /// Посты в порядке сервера.
    pub posts: Vec<Post>,
    /// По одной записи на каждый пост.
    pub authorized_authors_per_post: Vec<PostAuthorization>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Что лента показывает об авторе поста.
///
/// Оба поля пусты, если профиль получить не удалось.
pub struct AuthorSummary {
    /// Отображаемое имя.
    pub display_name: Option<String>,
    /// URL аватара.
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
/// Элемент отфильтрованной ленты.
pub struct FeedEntry {
    /// Пост.
    pub post: Post,
    /// Автор поста.
    pub author: AuthorSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// Профиль автора.
pub struct Profile {
    /// Идентификатор (может отсутствовать у старых ответов).
    #[serde(default)]
    pub id: Option<String>,
    /// Отображаемое имя.
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    /// URL аватара.
    #[serde(rename = "profileImage", default)]
    pub profile_image: Option<String>,
    /// Ссылка на GitHub.
    #[serde(default)]
    pub github: Option<String>,
    /// Страница автора.
    #[serde(default)]
    pub page: Option<String>,
    /// Друзья.
    #[serde(default)]
    pub friends_count: u64,
    /// Подписчики.
    #[serde(default)]
    pub followers_count: u64,
    /// Подписки.
    #[serde(default)]
    pub following_count: u64,
    /// Публичные посты автора.
    #[serde(default)]
    pub public_posts: Vec<Post>,
}

impl From<&Profile> for AuthorSummary {
    fn from(profile: &Profile) -> Self {
        Self {
            display_name: profile.display_name.clone(),
            profile_image: profile.profile_image.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_profile_edit"))]
/// Редактируемые поля профиля.
pub struct ProfileEdit {
    /// Отображаемое имя (до 100 символов, не пустое).
    #[serde(rename = "displayName")]
    #[validate(length(max = 100))]
    pub display_name: String,
    /// Ссылка на GitHub.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    /// URL аватара.
    #[serde(rename = "profileImage", default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    /// Страница автора.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

fn validate_profile_edit(edit: &ProfileEdit) -> Result<(), ValidationError> {
    if edit.display_name.trim().is_empty() {
        return Err(ValidationError::new("display_name_required"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Краткая карточка автора внутри лайка или комментария.
pub struct AuthorRef {
    /// Идентификатор или полный URL автора.
    #[serde(default)]
    pub id: Option<String>,
    /// Отображаемое имя.
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    /// Хост автора.
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Комментарий к посту.
pub struct Comment {
    /// Полный URL комментария.
    pub id: String,
    /// Автор комментария.
    pub author: AuthorRef,
    /// Дата публикации.
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    /// Текст.
    pub comment: String,
    /// URL поста.
    pub post: String,
    /// Тип содержимого.
    #[serde(rename = "contentType", default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Лайк поста или комментария.
pub struct Like {
    /// Полный URL лайка.
    pub id: String,
    /// Автор лайка.
    pub author: AuthorRef,
    /// Дата.
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    /// URL объекта, который лайкнули.
    #[serde(default)]
    pub object: Option<String>,
}

#[derive(Debug, Clone, Serialize, Validate)]
#[validate(schema(function = "validate_body"))]
/// Черновик нового или редактируемого поста.
pub struct PostDraft {
    /// Заголовок (1..=200 символов).
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// Краткое описание.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Текст.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    /// Изображение (data URL или путь).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_content: Option<String>,
    /// Тип содержимого.
    pub content_type: ContentType,
    /// Видимость.
    pub visibility: Visibility,
}

fn validate_body(draft: &PostDraft) -> Result<(), ValidationError> {
    let has_text = draft
        .text_content
        .as_deref()
        .is_some_and(|text| !text.trim().is_empty());
    let has_image = draft.image_content.is_some();

    match draft.content_type {
        ContentType::Image if !has_image => Err(ValidationError::new("image_content_required")),
        ContentType::PlainText | ContentType::Markdown if !has_text && !has_image => {
            Err(ValidationError::new("content_required"))
        }
        _ => Ok(()),
    }
}

impl PostDraft {
    /// Текстовый черновик с видимостью `PUBLIC`.
    pub fn text(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            text_content: Some(text.into()),
            image_content: None,
            content_type: ContentType::PlainText,
            visibility: Visibility::Public,
        }
    }

    /// Устанавливает видимость.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}
