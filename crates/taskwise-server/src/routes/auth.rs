use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use taskwise_core::resource::{LoginResponse, UserResource};
use taskwise_core::user::Credentials;

use super::AppState;
use crate::auth::issue_token;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::password::verify_password;

pub fn routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || ApiError::Unauthorized("invalid email or password".into());

    let user = state
        .db
        .find_user_by_email(&credentials.email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&credentials.password, &user.password_hash)? {
        return Err(invalid());
    }

    let token = issue_token(&state, &user, "login").await?;
    info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse {
        token,
        user: UserResource::new(&user, &state.resource_context()),
    }))
}
