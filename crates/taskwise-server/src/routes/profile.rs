use axum::{
    extract::{Multipart, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use tracing::info;

use taskwise_core::resource::{Envelope, MessageResponse, UserResource};
use taskwise_core::user::{UpdatePassword, UpdateProfile, UserChanges};
use taskwise_core::{User, ValidationError};
use taskwise_store::profile_photo_key;

use super::AppState;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::password::{hash_password, verify_password};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/user", get(current_user))
        .route("/v1/user/profile", put(update_profile))
        .route("/v1/user/password", put(update_password))
        .route("/v1/user/photo", post(upload_photo))
}

async fn current_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Json<Envelope<UserResource>> {
    Json(Envelope::new(UserResource::new(
        &user,
        &state.resource_context(),
    )))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiJson(input): ApiJson<UpdateProfile>,
) -> ApiResult<Json<Envelope<UserResource>>> {
    input.validate()?;
    let changes = UserChanges {
        name: Some(input.name.trim().to_string()),
        email: Some(input.email.trim().to_string()),
        jabatan: Some(input.jabatan.filter(|j| !j.trim().is_empty())),
        ..Default::default()
    };
    let updated = state.db.update_user(user.id, &changes).await?;
    Ok(Json(Envelope::new(UserResource::new(
        &updated,
        &state.resource_context(),
    ))))
}

async fn update_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiJson(input): ApiJson<UpdatePassword>,
) -> ApiResult<Json<MessageResponse>> {
    input.validate()?;
    if !verify_password(&input.current_password, &user.password_hash)? {
        return Err(ValidationError::new("current_password", "does not match").into());
    }
    let changes = UserChanges {
        password_hash: Some(hash_password(&input.password)?),
        ..Default::default()
    };
    state.db.update_user(user.id, &changes).await?;
    info!(user_id = user.id, "password changed");
    Ok(Json(MessageResponse {
        message: "password updated".into(),
    }))
}

/// Replace the caller's profile photo. Expects an `image/*` part named `photo`.
async fn upload_photo(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> ApiResult<Json<Envelope<UserResource>>> {
    let mut photo = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("photo") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("photo").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        photo = Some((file_name, content_type, bytes));
    }

    let (file_name, content_type, bytes) =
        photo.ok_or_else(|| ValidationError::new("photo", "is required"))?;
    if !content_type.starts_with("image/") {
        return Err(ValidationError::new("photo", "must be an image").into());
    }

    let key = profile_photo_key(&uuid::Uuid::new_v4().to_string(), &file_name);
    state.store.put(&key, bytes).await?;

    let changes = UserChanges {
        profile_photo_path: Some(Some(key.clone())),
        ..Default::default()
    };
    let updated = match state.db.update_user(user.id, &changes).await {
        Ok(updated) => updated,
        Err(e) => {
            state.discard_object(&key).await;
            return Err(e.into());
        }
    };
    if let Some(old) = user.profile_photo_path.as_deref() {
        state.discard_object(old).await;
    }

    Ok(Json(Envelope::new(UserResource::new(
        &updated,
        &state.resource_context(),
    ))))
}
