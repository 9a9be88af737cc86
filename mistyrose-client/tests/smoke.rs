use std::time::{SystemTime, UNIX_EPOCH};

use mistyrose_client::{
    ClientConfig, ClientError, FeedTab, MemoryCredentialStore, MistyroseClient, PostDraft,
    Visibility,
};

fn unique_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock must be after unix epoch")
        .as_nanos();
    format!("{nanos}")
}

#[tokio::test]
#[ignore = "requires running mistyrose node with an activated account"]
async fn http_smoke_flow() {
    let base_url = std::env::var("MISTYROSE_API_URL")
        .unwrap_or_else(|_| "http://localhost:8000/api/".to_string());
    let username = std::env::var("MISTYROSE_USERNAME").expect("MISTYROSE_USERNAME must be set");
    let password = std::env::var("MISTYROSE_PASSWORD").expect("MISTYROSE_PASSWORD must be set");

    let client = MistyroseClient::new(ClientConfig::new(base_url), MemoryCredentialStore::new())
        .expect("client must build");

    let author = client
        .login(&username, &password)
        .await
        .expect("login must succeed");
    assert_eq!(
        client.current_author().expect("store"),
        Some(author.clone())
    );

    let profile = client
        .author_profile(&author)
        .await
        .expect("profile must load");
    assert!(profile.display_name.is_some());

    let title = format!("smoke {}", unique_suffix());
    let draft = PostDraft::text(&title, "smoke content").with_visibility(Visibility::Public);
    let created = client
        .create_post(&author, &draft)
        .await
        .expect("create_post must succeed");
    assert_eq!(created.title, title);

    let fetched = client
        .get_post(&author, &created.id)
        .await
        .expect("get_post must succeed");
    assert_eq!(fetched.id, created.id);

    let listed = client
        .list_author_posts(&author)
        .await
        .expect("list must succeed");
    assert!(listed.iter().any(|post| post.id == created.id));

    // своя лента не содержит собственных постов, важно лишь что она грузится
    client
        .load_feed(FeedTab::Public)
        .await
        .expect("feed must load");

    client
        .delete_post(&author, &created.id)
        .await
        .expect("delete_post must succeed");

    let after_delete = client.get_post(&author, &created.id).await;
    assert!(matches!(after_delete, Err(ClientError::NotFound)));

    client.logout().expect("logout");
    assert!(client.current_author().expect("store").is_none());
}
