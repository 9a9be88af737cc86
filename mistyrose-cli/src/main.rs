use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mistyrose_client::{
    AuthorId, ClientError, Comment, ContentType, FeedEntry, FeedTab, FileCredentialStore, Like,
    MistyroseClient, Post, PostDraft, PostId, Profile, ProfileEdit, Visibility,
};
use tracing::debug;

mod logging;
mod settings;

use logging::init_logging;
use settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "mistyrose", version, about = "CLI клиент для узла mistyrose")]
struct Cli {
    /// Базовый URL API (перекрывает MISTYROSE_API_URL).
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VisibilityArg {
    Public,
    Friends,
    Unlisted,
}

impl From<VisibilityArg> for Visibility {
    fn from(value: VisibilityArg) -> Self {
        match value {
            VisibilityArg::Public => Visibility::Public,
            VisibilityArg::Friends => Visibility::Friends,
            VisibilityArg::Unlisted => Visibility::Unlisted,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Вход: сохраняет токены в файл сессии.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Выход: удаляет файл сессии.
    Logout,
    /// Показывает текущего автора.
    Whoami,
    /// Домашняя лента (требует вход).
    ///
    /// Вкладки: public, friends, unlisted. Любое другое имя показывает все
    /// доступные посты.
    Feed {
        #[arg(long, default_value = "public")]
        tab: String,
    },
    /// Получение поста по автору и id или по полному URL.
    Get {
        /// Автор поста (по умолчанию текущий).
        #[arg(long)]
        author: Option<String>,
        #[arg(long, required_unless_present = "fqid")]
        id: Option<String>,
        /// Полный идентификатор поста (URL).
        #[arg(long, conflicts_with_all = ["author", "id"])]
        fqid: Option<String>,
    },
    /// Посты автора.
    List {
        #[arg(long)]
        author: Option<String>,
    },
    /// Создание поста от имени текущего автора.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum, default_value_t = VisibilityArg::Public)]
        visibility: VisibilityArg,
        /// Содержимое в markdown.
        #[arg(long)]
        markdown: bool,
    },
    /// Обновление своего поста.
    ///
    /// Неуказанные поля берутся из текущей версии поста.
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long, value_enum)]
        visibility: Option<VisibilityArg>,
    },
    /// Удаление своего поста.
    Delete {
        #[arg(long)]
        id: String,
    },
    /// URL изображения поста.
    Image {
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        id: String,
    },
    /// Профиль автора (по умолчанию текущего).
    Profile {
        #[arg(long)]
        author: Option<String>,
    },
    /// Редактирование своего профиля.
    ///
    /// Неуказанные поля остаются прежними.
    EditProfile {
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        github: Option<String>,
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        page: Option<String>,
    },
    /// Проверка, подписан ли автор (полный URL) на указанного автора.
    Follower {
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        fqid: String,
    },
    /// Принять запрос на подписку.
    AcceptFollow {
        #[arg(long)]
        fqid: String,
    },
    /// Отклонить запрос на подписку.
    DeclineFollow {
        #[arg(long)]
        fqid: String,
    },
    /// Лайк поста.
    Like {
        #[arg(long)]
        author: String,
        #[arg(long)]
        id: String,
    },
    /// Лайк комментария по его полному URL.
    LikeComment {
        #[arg(long)]
        url: String,
    },
    /// Лайки поста.
    Likes {
        #[arg(long)]
        author: String,
        #[arg(long)]
        id: String,
    },
    /// Комментарий к посту.
    Comment {
        #[arg(long)]
        author: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        text: String,
    },
    /// Комментарии к посту.
    Comments {
        #[arg(long)]
        author: String,
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Ошибка: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::from_env()?;
    init_logging(&settings.log_level)?;

    let config = settings.client_config(cli.server);
    debug!(api = %config.base_url, session = %settings.credentials_file.display(), "starting");

    let store = FileCredentialStore::new(&settings.credentials_file);
    let client = MistyroseClient::new(config, store).map_err(map_client_error)?;

    match cli.command {
        Command::Login { username, password } => {
            let author = client
                .login(&username, &password)
                .await
                .map_err(map_client_error)?;
            println!("Вход выполнен: author_id={author}");
        }
        Command::Logout => {
            client.logout().context("не удалось удалить файл сессии")?;
            println!("Выход выполнен");
        }
        Command::Whoami => match client.current_author().map_err(map_client_error)? {
            Some(author) => println!("author_id: {author}"),
            None => println!("Вход не выполнен"),
        },
        Command::Feed { tab } => {
            let tab = FeedTab::parse(&tab);
            let entries = client.load_feed(tab).await.map_err(map_client_error)?;
            print_feed(tab, &entries);
        }
        Command::Get { author, id, fqid } => {
            let post = match fqid {
                Some(fqid) => client.get_post_by_fqid(&fqid).await,
                None => {
                    let id = id.context("укажите --id или --fqid")?;
                    let author = resolve_author(&client, author)?;
                    client.get_post(&author, &PostId(id)).await
                }
            }
            .map_err(map_client_error)?;
            print_post("Пост", &post);
        }
        Command::List { author } => {
            let author = resolve_author(&client, author)?;
            let posts = client
                .list_author_posts(&author)
                .await
                .map_err(map_client_error)?;
            print_list(&author, &posts);
        }
        Command::Create {
            title,
            content,
            description,
            visibility,
            markdown,
        } => {
            let author = resolve_author(&client, None)?;
            let mut draft = PostDraft::text(title, content).with_visibility(visibility.into());
            draft.description = description;
            if markdown {
                draft.content_type = ContentType::Markdown;
            }

            let post = client
                .create_post(&author, &draft)
                .await
                .map_err(map_client_error)?;
            print_post("Пост создан", &post);
        }
        Command::Update {
            id,
            title,
            content,
            visibility,
        } => {
            let author = resolve_author(&client, None)?;
            let id = PostId(id);
            // Неуказанные поля сохраняем из текущей версии поста.
            let current = client
                .get_post(&author, &id)
                .await
                .map_err(map_client_error)?;
            let draft = edit_draft(&current, title, content, visibility.map(Visibility::from));

            let post = client
                .update_post(&author, &id, &draft)
                .await
                .map_err(map_client_error)?;
            print_post("Пост обновлён", &post);
        }
        Command::Delete { id } => {
            let author = resolve_author(&client, None)?;
            client
                .delete_post(&author, &PostId(id.clone()))
                .await
                .map_err(map_client_error)?;
            println!("Пост удалён: id={id}");
        }
        Command::Image { author, id } => {
            let author = resolve_author(&client, author)?;
            let url = client
                .post_image_url(&author, &PostId(id))
                .await
                .map_err(map_client_error)?;
            println!("{url}");
        }
        Command::Profile { author } => {
            let author = resolve_author(&client, author)?;
            let profile = client
                .author_profile(&author)
                .await
                .map_err(map_client_error)?;
            print_profile(&author, &profile);
        }
        Command::Like { author, id } => {
            let like = client
                .like_post(&AuthorId(author), &PostId(id))
                .await
                .map_err(map_client_error)?;
            println!("Лайк поставлен: {}", like.id);
        }
        Command::LikeComment { url } => {
            let like = client.like_comment(&url).await.map_err(map_client_error)?;
            println!("Лайк поставлен: {}", like.id);
        }
        Command::EditProfile {
            display_name,
            github,
            image,
            page,
        } => {
            let author = resolve_author(&client, None)?;
            let current = client
                .edit_profile(&author)
                .await
                .map_err(map_client_error)?;
            let edit = edit_profile(current, display_name, github, image, page);

            let saved = client
                .update_profile(&author, &edit)
                .await
                .map_err(map_client_error)?;
            println!("Профиль обновлён: {}", saved.display_name);
        }
        Command::Follower { author, fqid } => {
            let author = resolve_author(&client, author)?;
            let follows = client
                .follower_status(&author, &fqid)
                .await
                .map_err(map_client_error)?;
            if follows {
                println!("{fqid} подписан на {author}");
            } else {
                println!("{fqid} не подписан на {author}");
            }
        }
        Command::AcceptFollow { fqid } => {
            client.accept_follow(&fqid).await.map_err(map_client_error)?;
            println!("Запрос на подписку принят: {fqid}");
        }
        Command::DeclineFollow { fqid } => {
            client.decline_follow(&fqid).await.map_err(map_client_error)?;
            println!("Запрос на подписку отклонён: {fqid}");
        }
        Command::Likes { author, id } => {
            let likes = client
                .post_likes(&AuthorId(author), &PostId(id))
                .await
                .map_err(map_client_error)?;
            print_likes(&likes);
        }
        Command::Comment { author, id, text } => {
            let comment = client
                .comment_on_post(&AuthorId(author), &PostId(id), &text)
                .await
                .map_err(map_client_error)?;
            println!("Комментарий добавлен: {}", comment.id);
        }
        Command::Comments { author, id } => {
            let comments = client
                .post_comments(&AuthorId(author), &PostId(id))
                .await
                .map_err(map_client_error)?;
            print_comments(&comments);
        }
    }

    Ok(())
}

fn resolve_author(client: &MistyroseClient, author: Option<String>) -> Result<AuthorId> {
    if let Some(author) = author {
        return Ok(AuthorId(author));
    }
    client
        .current_author()
        .map_err(map_client_error)?
        .ok_or_else(|| map_client_error(ClientError::NotLoggedIn))
}

fn edit_draft(
    current: &Post,
    title: Option<String>,
    content: Option<String>,
    visibility: Option<Visibility>,
) -> PostDraft {
    PostDraft {
        title: title.unwrap_or_else(|| current.title.clone()),
        description: current.description.clone(),
        text_content: content.or_else(|| current.text_content.clone()),
        image_content: current.image_content.clone(),
        content_type: current.content_type,
        visibility: visibility.unwrap_or(current.visibility),
    }
}

fn edit_profile(
    current: ProfileEdit,
    display_name: Option<String>,
    github: Option<String>,
    image: Option<String>,
    page: Option<String>,
) -> ProfileEdit {
    ProfileEdit {
        display_name: display_name.unwrap_or(current.display_name),
        github: github.or(current.github),
        profile_image: image.or(current.profile_image),
        page: page.or(current.page),
    }
}

fn map_client_error(err: ClientError) -> anyhow::Error {
    let message = match err {
        ClientError::Unauthorized | ClientError::NotLoggedIn => {
            "требуется авторизация: выполните `mistyrose login ...`".to_string()
        }
        ClientError::Forbidden => "доступ запрещён".to_string(),
        ClientError::NotFound => "ресурс не найден".to_string(),
        ClientError::InvalidRequest(message) => format!("некорректный запрос: {message}"),
        ClientError::Server { status, message } => format!("ошибка сервера {status}: {message}"),
        ClientError::Http(err) => format!("ошибка HTTP: {err}"),
        ClientError::MissingAuthorization(id) => {
            format!("сервер не прислал авторизацию для поста {id}")
        }
        ClientError::DuplicateAuthorization(id) => {
            format!("сервер прислал несколько записей авторизации для поста {id}")
        }
        ClientError::Validation(errors) => format!("пост не прошёл проверку: {errors}"),
        ClientError::Storage(err) => format!("ошибка файла сессии: {err}"),
        ClientError::Serialization(err) => format!("ошибка формата данных: {err}"),
    };
    anyhow::anyhow!(message)
}

fn visibility_label(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "PUBLIC",
        Visibility::Friends => "FRIENDS",
        Visibility::Unlisted => "UNLISTED",
        Visibility::Shared => "SHARED",
    }
}

fn print_post(title: &str, post: &Post) {
    println!("{title}");
    println!("id: {}", post.id);
    println!("author_id: {}", post.author_id);
    println!("title: {}", post.title);
    if let Some(description) = &post.description {
        println!("description: {description}");
    }
    if let Some(text) = &post.text_content {
        println!("content: {text}");
    }
    if let Some(image) = &post.image_content {
        println!("image: {image}");
    }
    println!("visibility: {}", visibility_label(post.visibility));
    if let Some(published) = post.published {
        println!("published: {published}");
    }
    println!("likes: {}, comments: {}", post.likes_count, post.comments_count);
}

fn print_feed(tab: FeedTab, entries: &[FeedEntry]) {
    println!("Лента ({tab}): {} постов", entries.len());
    if entries.is_empty() {
        println!("Нет доступных постов.");
        return;
    }

    for entry in entries {
        let author = entry
            .author
            .display_name
            .as_deref()
            .unwrap_or("неизвестный автор");
        println!(
            "- [{}] {} ({author}, {}) likes={} comments={}",
            entry.post.id,
            entry.post.title,
            visibility_label(entry.post.visibility),
            entry.post.likes_count,
            entry.post.comments_count
        );
    }
}

fn print_list(author: &AuthorId, posts: &[Post]) {
    println!("Постов автора {author}: {}", posts.len());
    for post in posts {
        println!(
            "- [{}] {} ({})",
            post.id,
            post.title,
            visibility_label(post.visibility)
        );
    }
}

fn print_profile(author: &AuthorId, profile: &Profile) {
    println!("Профиль {author}");
    println!(
        "display_name: {}",
        profile.display_name.as_deref().unwrap_or("-")
    );
    println!(
        "profile_image: {}",
        profile.profile_image.as_deref().unwrap_or("-")
    );
    println!("github: {}", profile.github.as_deref().unwrap_or("-"));
    println!("page: {}", profile.page.as_deref().unwrap_or("-"));
    println!(
        "friends: {}, followers: {}, following: {}",
        profile.friends_count, profile.followers_count, profile.following_count
    );
    println!("public posts: {}", profile.public_posts.len());
    for post in &profile.public_posts {
        println!("- [{}] {}", post.id, post.title);
    }
}

fn print_likes(likes: &[Like]) {
    println!("Лайков: {}", likes.len());
    for like in likes {
        let who = like
            .author
            .display_name
            .as_deref()
            .or(like.author.id.as_deref())
            .unwrap_or("-");
        println!("- {who}");
    }
}

fn print_comments(comments: &[Comment]) {
    println!("Комментариев: {}", comments.len());
    for comment in comments {
        let who = comment
            .author
            .display_name
            .as_deref()
            .or(comment.author.id.as_deref())
            .unwrap_or("-");
        println!("- {who}: {}", comment.comment);
    }
}
