pub mod auth;
pub mod config;
pub mod error;
pub mod password;
pub mod routes;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use std::sync::Arc;

use anyhow::Result;
use taskwise_db::Database;
use taskwise_store::ObjectStore;
use tokio::net::TcpListener;
use tracing::info;

use routes::InnerAppState;

pub async fn serve(
    listener: TcpListener,
    db: Arc<dyn Database>,
    store: Arc<dyn ObjectStore>,
    public_url: &str,
) -> Result<()> {
    let state = Arc::new(InnerAppState::new(db, store, public_url));
    let app = routes::build_router(state);
    info!(addr = %listener.local_addr()?, "taskwise-server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
