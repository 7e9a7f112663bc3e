use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::warn;

use taskwise_core::User;

use crate::error::ApiError;
use crate::routes::AppState;

/// Tokens are stored as the hex SHA-256 of the raw value.
pub fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// `tw_` followed by 43 random base62 characters.
pub fn generate_token() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(43)
        .map(char::from)
        .collect();
    format!("tw_{suffix}")
}

/// Issue a token for `user` and persist its hash. The raw token is only
/// ever returned here.
pub async fn issue_token(state: &AppState, user: &User, name: &str) -> Result<String, ApiError> {
    let token = generate_token();
    state
        .db
        .create_access_token(user.id, name, &sha256_hex(&token))
        .await?;
    Ok(token)
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the bearer token to a user and attach it as a request extension.
/// Anything else is a 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token_hash) = bearer_token(&request).map(sha256_hex) else {
        return ApiError::unauthenticated().into_response();
    };

    match state.db.find_access_token(&token_hash).await {
        Ok(Some((access_token, user))) => {
            let db = state.db.clone();
            tokio::spawn(async move {
                if let Err(e) = db.touch_access_token(access_token.id).await {
                    warn!(token_id = access_token.id, error = %e, "failed to touch access token");
                }
            });
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => ApiError::unauthenticated().into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("this action requires an admin".into()))
    }
}
