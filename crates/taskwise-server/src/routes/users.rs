use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use tracing::info;

use taskwise_core::resource::{Envelope, PageMeta, Paginated, UserResource};
use taskwise_core::user::{CreateUser, NewUser, UpdateUser, UserChanges, UserFilter, UserQuery};
use taskwise_core::{Role, User, ValidationError};

use super::AppState;
use crate::auth::require_admin;
use crate::error::{ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::password::hash_password;

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/users", get(list_users).post(create_user))
        .route("/v1/users/{id}", put(update_user).delete(delete_user))
}

/// Without `page`: every employee, unpaginated (assignee pickers).
/// With `page`: one page of all users plus `meta`.
async fn list_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<Paginated<UserResource>>> {
    let ctx = state.resource_context();
    let search = query.search.filter(|s| !s.trim().is_empty());

    let Some(page) = query.page else {
        let filter = UserFilter {
            role: Some(query.role.unwrap_or(Role::Employee)),
            search,
            ..Default::default()
        };
        let users = state.db.list_users(&filter).await?;
        return Ok(Json(Paginated {
            data: users.iter().map(|u| UserResource::new(u, &ctx)).collect(),
            meta: None,
        }));
    };

    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let mut filter = UserFilter {
        role: query.role,
        search,
        ..Default::default()
    };
    let total = state.db.count_users(&filter).await?;
    let meta = PageMeta::new(page.max(1), per_page, total);
    filter.limit = Some(i64::from(meta.per_page));
    filter.offset = Some(meta.offset());
    let users = state.db.list_users(&filter).await?;

    Ok(Json(Paginated {
        data: users.iter().map(|u| UserResource::new(u, &ctx)).collect(),
        meta: Some(meta),
    }))
}

async fn create_user(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    ApiJson(input): ApiJson<CreateUser>,
) -> ApiResult<(StatusCode, Json<Envelope<UserResource>>)> {
    require_admin(&admin)?;
    input.validate()?;
    let new_user = NewUser {
        name: input.name.trim().to_string(),
        email: input.email.trim().to_string(),
        password_hash: hash_password(&input.password)?,
        role: input.role,
        jabatan: input.jabatan.filter(|j| !j.trim().is_empty()),
    };
    let user = state.db.create_user(&new_user).await?;
    info!(user_id = user.id, by = admin.id, "user created");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::new(UserResource::new(
            &user,
            &state.resource_context(),
        ))),
    ))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<UpdateUser>,
) -> ApiResult<Json<Envelope<UserResource>>> {
    require_admin(&admin)?;
    input.validate()?;
    if id == admin.id && input.role == Some(Role::Employee) {
        return Err(ValidationError::new("role", "you cannot demote yourself").into());
    }
    let password_hash = match input.password {
        Some(ref password) => Some(hash_password(password)?),
        None => None,
    };
    let changes = UserChanges {
        name: input.name.map(|n| n.trim().to_string()),
        email: input.email.map(|e| e.trim().to_string()),
        password_hash,
        role: input.role,
        jabatan: input.jabatan,
        profile_photo_path: None,
    };
    let user = state.db.update_user(id, &changes).await?;
    Ok(Json(Envelope::new(UserResource::new(
        &user,
        &state.resource_context(),
    ))))
}

async fn delete_user(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    require_admin(&admin)?;
    if id == admin.id {
        return Err(ValidationError::new("id", "you cannot delete your own account").into());
    }
    let user = state.db.get_user(id).await?;
    state.db.delete_user(id).await?;
    if let Some(key) = user.profile_photo_path.as_deref() {
        state.discard_object(key).await;
    }
    info!(user_id = id, by = admin.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::testing::send;
    use crate::test_helpers::{login_as, seed_user, test_state_with_token};
    use taskwise_core::Role;

    #[tokio::test]
    async fn fetch_all_mode_returns_employees_without_meta() {
        let (app, state, token) = test_state_with_token().await;
        seed_user(&state, "Siti", "siti@example.com", Role::Employee).await;
        seed_user(&state, "Budi", "budi@example.com", Role::Employee).await;

        let (status, body) = send(&app, "GET", "/v1/users?", &token, None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Budi", "Siti"]);
        assert!(body.get("meta").is_none());
    }

    #[tokio::test]
    async fn paged_mode_includes_meta() {
        let (app, state, token) = test_state_with_token().await;
        for i in 0..3 {
            seed_user(
                &state,
                &format!("Pegawai {i}"),
                &format!("p{i}@example.com"),
                Role::Employee,
            )
            .await;
        }

        let (status, body) = send(&app, "GET", "/v1/users?page=2&per_page=3", &token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["meta"],
            json!({ "current_page": 2, "last_page": 2, "per_page": 3, "total": 4 })
        );
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (_, body) = send(&app, "GET", "/v1/users?page=1&search=p1%40", &token, None).await;
        assert_eq!(body["meta"]["total"], 1);
        assert_eq!(body["data"][0]["email"], "p1@example.com");
    }

    #[tokio::test]
    async fn admin_manages_users() {
        let (app, _state, token) = test_state_with_token().await;
        let (status, created) = send(
            &app,
            "POST",
            "/v1/users",
            &token,
            Some(json!({
                "name": "Rina",
                "email": "rina@example.com",
                "password": "rina-password",
                "jabatan": "Staff Keuangan"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["data"]["role"], "employee");
        let id = created["data"]["id"].as_i64().unwrap();

        let (status, _) = send(
            &app,
            "POST",
            "/v1/users",
            &token,
            Some(json!({
                "name": "Rina 2",
                "email": "rina@example.com",
                "password": "rina-password"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/v1/users/{id}"),
            &token,
            Some(json!({ "jabatan": null, "role": "admin" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["data"]["jabatan"], serde_json::Value::Null);
        assert_eq!(updated["data"]["role"], "admin");

        let (status, _) = send(&app, "DELETE", &format!("/v1/users/{id}"), &token, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &format!("/v1/users/{id}"), &token, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn employees_cannot_manage_users() {
        let (app, state, _token) = test_state_with_token().await;
        let employee = seed_user(&state, "Siti", "siti@example.com", Role::Employee).await;
        let token = login_as(&state, &employee).await;

        let (status, body) = send(
            &app,
            "POST",
            "/v1/users",
            &token,
            Some(json!({ "name": "X", "email": "x@example.com", "password": "password1" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "this action requires an admin");

        let (status, _) = send(&app, "GET", "/v1/users", &token, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_role_is_422() {
        let (app, _state, token) = test_state_with_token().await;
        let (status, _) = send(
            &app,
            "POST",
            "/v1/users",
            &token,
            Some(json!({
                "name": "X",
                "email": "x@example.com",
                "password": "password1",
                "role": "manager"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn admin_cannot_delete_self() {
        let (app, state, token) = test_state_with_token().await;
        let admin_id = state
            .db
            .find_user_by_email(crate::test_helpers::TEST_ADMIN_EMAIL)
            .await
            .unwrap()
            .unwrap()
            .id;
        let (status, _) =
            send(&app, "DELETE", &format!("/v1/users/{admin_id}"), &token, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
