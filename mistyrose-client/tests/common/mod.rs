#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use mistyrose_client::{
    AuthorId, ClientConfig, Credentials, MemoryCredentialStore, MistyroseClient, Session,
};
use tokio::net::TcpListener;

/// Поднимает mock API на свободном порту и возвращает базовый URL `.../api/`.
pub async fn spawn_api(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("mock api must bind");
    let addr = listener.local_addr().expect("mock api must have address");

    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock api must serve");
    });

    format!("http://{addr}/api/")
}

pub fn credentials(access: &str, refresh: &str) -> Credentials {
    Credentials {
        author_id: AuthorId::from("viewer"),
        access_token: access.to_string(),
        refresh_token: Some(refresh.to_string()),
    }
}

/// Клиент с сессией в памяти. Сессия возвращается, чтобы проверять хранилище.
pub fn client_with(base_url: &str, credentials: Option<Credentials>) -> (MistyroseClient, Arc<Session>) {
    let store = match credentials {
        Some(credentials) => MemoryCredentialStore::with_credentials(credentials),
        None => MemoryCredentialStore::new(),
    };
    let session = Arc::new(Session::new(store));
    let client = MistyroseClient::with_session(ClientConfig::new(base_url), Arc::clone(&session))
        .expect("client must build");
    (client, session)
}
