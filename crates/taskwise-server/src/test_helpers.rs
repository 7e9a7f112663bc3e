use std::path::Path;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use taskwise_core::user::NewUser;
use taskwise_core::{Role, User};
use taskwise_store::{LocalStore, ObjectStore, StoreConfig, StoreError};
use tempfile::TempDir;
use tokio::net::TcpListener;

use crate::routes::{build_router, AppState, InnerAppState};

pub const TEST_ADMIN_EMAIL: &str = "admin@example.com";
/// Password of every seeded user.
pub const TEST_ADMIN_PASSWORD: &str = "password";

/// Hashing is deliberately slow, so seeded users share one hash.
fn seeded_password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| crate::password::hash_password(TEST_ADMIN_PASSWORD).unwrap())
}

/// A [`LocalStore`] over a temp dir that is removed when the store drops,
/// i.e. with the last clone of the state holding it.
pub struct ScratchStore {
    inner: LocalStore,
    _dir: TempDir,
}

impl ScratchStore {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let inner = LocalStore::new(&StoreConfig {
            local_data_dir: Some(dir.path().to_string_lossy().to_string()),
        });
        Self { inner, _dir: dir }
    }

    pub fn root(&self) -> &Path {
        self.inner.root()
    }
}

impl Default for ScratchStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for ScratchStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list(prefix).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }
}

/// In-memory SQLite, a [`ScratchStore`], and one admin ("Admin",
/// `admin@example.com`) with id 1.
pub async fn test_state(public_url: &str) -> AppState {
    let db = Arc::new(taskwise_db::SqliteDatabase::open_in_memory().unwrap());
    let store = Arc::new(ScratchStore::new());
    let state = Arc::new(InnerAppState::new(db, store, public_url));
    seed_user(&state, "Admin", TEST_ADMIN_EMAIL, Role::Admin).await;
    state
}

pub async fn seed_user(state: &AppState, name: &str, email: &str, role: Role) -> User {
    state
        .db
        .create_user(&NewUser {
            name: name.into(),
            email: email.into(),
            password_hash: seeded_password_hash().to_string(),
            role,
            jabatan: None,
        })
        .await
        .unwrap()
}

/// Issue a bearer token for `user` without going through `/login`.
pub async fn login_as(state: &AppState, user: &User) -> String {
    crate::auth::issue_token(state, user, "test").await.unwrap()
}

/// Build a test router over a fresh [`test_state`].
pub async fn test_router() -> Router {
    build_router(test_state("http://127.0.0.1:8000").await)
}

/// Build a test router, returning (router, admin token).
pub async fn test_router_with_token() -> (Router, String) {
    let (router, _state, token) = test_state_with_token().await;
    (router, token)
}

/// Like [`test_router_with_token`], also handing back the state so tests can
/// seed rows or inspect the store directly.
pub async fn test_state_with_token() -> (Router, AppState, String) {
    let state = test_state("http://127.0.0.1:8000").await;
    let admin = state
        .db
        .find_user_by_email(TEST_ADMIN_EMAIL)
        .await
        .unwrap()
        .unwrap();
    let token = login_as(&state, &admin).await;
    (build_router(state.clone()), state, token)
}

/// A running test server with base_url and background task handle.
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn an axum test server on a random port. Storage URLs point back at
/// the server itself.
pub async fn spawn_test_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let state = test_state(&base_url).await;
    let app = build_router(state.clone());
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url,
        state,
        _handle: handle,
    }
}
