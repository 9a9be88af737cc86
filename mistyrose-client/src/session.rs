//! Хранение учётных данных и сессия клиента.
//!
//! Сессия владеет хранилищем и мьютексом обновления токена: записывать
//! access token при обновлении может только тот, кто держит мьютекс.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::error::ClientResult;
use crate::models::{AuthorId, Credentials};

/// Хранилище пары токенов и идентификатора автора.
pub trait CredentialStore: Send + Sync {
    /// Возвращает сохранённые учётные данные, если есть автор и access token.
    fn get(&self) -> ClientResult<Option<Credentials>>;

    /// Перезаписывает учётные данные целиком.
    fn set(&self, credentials: &Credentials) -> ClientResult<()>;

    /// Удаляет все три ключа.
    fn clear(&self) -> ClientResult<()>;
}

#[derive(Debug, Default)]
/// Хранилище в памяти процесса.
pub struct MemoryCredentialStore {
    inner: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    /// Пустое хранилище.
    pub fn new() -> Self {
        Self::default()
    }

    /// Хранилище с уже выданными учётными данными.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: Mutex::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> ClientResult<Option<Credentials>> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.clone())
    }

    fn set(&self, credentials: &Credentials) -> ClientResult<()> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
        Ok(())
    }
}

/// Содержимое файла сессии: три независимых ключа.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    let value = value?.trim().to_string();
    if value.is_empty() {
        return None;
    }
    Some(value)
}

impl StoredKeys {
    fn into_credentials(self) -> Option<Credentials> {
        Some(Credentials {
            author_id: AuthorId(non_blank(self.author_id)?),
            access_token: non_blank(self.access_token)?,
            refresh_token: non_blank(self.refresh_token),
        })
    }
}

impl From<&Credentials> for StoredKeys {
    fn from(value: &Credentials) -> Self {
        Self {
            author_id: Some(value.author_id.0.clone()),
            access_token: Some(value.access_token.clone()),
            refresh_token: value.refresh_token.clone(),
        }
    }
}

#[derive(Debug, Clone)]
/// Хранилище в JSON-файле (аналог cookie браузера для CLI).
///
/// Файл создаётся с правами только для владельца на Unix.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Хранилище по указанному пути. Файл создаётся при первой записи.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Путь к файлу сессии.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> ClientResult<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let keys: StoredKeys = serde_json::from_str(&raw)?;
        Ok(keys.into_credentials())
    }

    fn set(&self, credentials: &Credentials) -> ClientResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let raw = serde_json::to_string_pretty(&StoredKeys::from(credentials))?;
        fs::write(&self.path, raw)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Сессия клиента: хранилище учётных данных плюс мьютекс обновления токена.
pub struct Session {
    store: Arc<dyn CredentialStore>,
    refresh_lock: AsyncMutex<()>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    /// Создаёт сессию поверх хранилища.
    pub fn new(store: impl CredentialStore + 'static) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Создаёт сессию поверх уже разделяемого хранилища.
    pub fn from_shared(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            refresh_lock: AsyncMutex::new(()),
        }
    }

    /// Сохранённые учётные данные.
    pub fn credentials(&self) -> ClientResult<Option<Credentials>> {
        self.store.get()
    }

    /// Текущий access token.
    pub fn access_token(&self) -> ClientResult<Option<String>> {
        Ok(self.store.get()?.map(|creds| creds.access_token))
    }

    /// Текущий автор.
    pub fn author_id(&self) -> ClientResult<Option<AuthorId>> {
        Ok(self.store.get()?.map(|creds| creds.author_id))
    }

    /// Начинает сессию после входа.
    pub fn start(&self, credentials: &Credentials) -> ClientResult<()> {
        self.store.set(credentials)
    }

    /// Завершает сессию: удаляет все учётные данные.
    pub fn end(&self) -> ClientResult<()> {
        self.store.clear()
    }

    pub(crate) async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_lock.lock().await
    }

    /// Заменяет access token, не трогая остальные ключи.
    ///
    /// Вызывается только под `lock_refresh`. Если хранилище уже очищено,
    /// ничего не делает.
    pub(crate) fn replace_access_token(&self, access_token: String) -> ClientResult<bool> {
        let Some(mut creds) = self.store.get()? else {
            return Ok(false);
        };
        creds.access_token = access_token;
        self.store.set(&creds)?;
        Ok(true)
    }
}
