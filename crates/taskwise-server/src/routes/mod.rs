pub mod attachments;
pub mod auth;
pub mod comments;
pub mod health;
pub mod journals;
pub mod profile;
pub mod statistics;
pub mod storage;
pub mod tasks;
pub mod users;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use taskwise_core::{ResourceContext, Task, User};
use taskwise_db::Database;
use taskwise_store::ObjectStore;

use crate::auth::auth_middleware;
use crate::error::{ApiError, ApiResult};

/// Upper bound for request bodies, multipart uploads included.
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

pub struct InnerAppState {
    pub db: Arc<dyn Database>,
    pub store: Arc<dyn ObjectStore>,
    /// Public base URL of `/storage`, without a trailing slash.
    pub storage_url: String,
}

impl InnerAppState {
    pub fn new(db: Arc<dyn Database>, store: Arc<dyn ObjectStore>, public_url: &str) -> Self {
        Self {
            db,
            store,
            storage_url: format!("{}/storage", public_url.trim_end_matches('/')),
        }
    }

    /// Serialization context for one response.
    pub fn resource_context(&self) -> ResourceContext {
        ResourceContext::new(self.storage_url.as_str())
    }

    /// Remove a stored object after its row is gone. Failures are only logged.
    pub async fn discard_object(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key, error = %e, "failed to delete stored object");
        }
    }
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(storage::routes());

    let protected = Router::new()
        .merge(profile::routes())
        .merge(users::routes())
        .merge(tasks::routes())
        .merge(attachments::routes())
        .merge(comments::routes())
        .merge(journals::routes())
        .merge(statistics::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Load every user referenced by `ids`, keyed by id.
pub(crate) async fn users_by_id(
    state: &AppState,
    ids: impl IntoIterator<Item = i64>,
) -> ApiResult<HashMap<i64, User>> {
    let ids: Vec<i64> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
    let users = state.db.get_users_by_ids(&ids).await?;
    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}

/// Fetch a task the caller may see. Tasks outside an employee's reach are
/// reported as missing.
pub(crate) async fn visible_task(state: &AppState, user: &User, id: i64) -> ApiResult<Task> {
    let task = state.db.get_task(id).await?;
    if user.is_admin() || task.is_visible_to(user.id) {
        Ok(task)
    } else {
        Err(ApiError::not_found(format!("task {id}")))
    }
}
