use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};

use taskwise_core::activity::{ActivityAction, CreateActivity};
use taskwise_core::comment::CreateComment;
use taskwise_core::resource::{CommentResource, Envelope};
use taskwise_core::User;

use super::{users_by_id, visible_task, AppState};
use crate::error::{ApiJson, ApiPath, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/v1/tasks/{id}/comments",
        get(list_comments).post(create_comment),
    )
}

async fn list_comments(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiPath(task_id): ApiPath<i64>,
) -> ApiResult<Json<Envelope<Vec<CommentResource>>>> {
    visible_task(&state, &user, task_id).await?;
    let comments = state.db.list_comments(task_id).await?;
    let authors = users_by_id(&state, comments.iter().map(|c| c.user_id)).await?;
    let ctx = state.resource_context();
    let shaped = comments
        .iter()
        .map(|c| CommentResource::new(c, authors.get(&c.user_id), &ctx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(Envelope::new(shaped)))
}

async fn create_comment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiPath(task_id): ApiPath<i64>,
    ApiJson(input): ApiJson<CreateComment>,
) -> ApiResult<(StatusCode, Json<Envelope<CommentResource>>)> {
    input.validate()?;
    visible_task(&state, &user, task_id).await?;
    let comment = state.db.create_comment(task_id, user.id, &input.body).await?;
    state
        .db
        .record_activity(&CreateActivity::new(
            task_id,
            user.id,
            ActivityAction::Commented,
            "commented on the task",
        ))
        .await?;
    let resource = CommentResource::new(&comment, Some(&user), &state.resource_context())?;
    Ok((StatusCode::CREATED, Json(Envelope::new(resource))))
}
