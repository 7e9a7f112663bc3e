use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use tracing::info;

use taskwise_core::activity::{ActivityAction, CreateActivity};
use taskwise_core::resource::{ActivityResource, Envelope, TaskResource};
use taskwise_core::task::{CreateTask, TaskFilter, TaskProgressUpdate, UpdateTask};
use taskwise_core::{Task, User};

use super::{users_by_id, visible_task, AppState};
use crate::error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/tasks", get(list_tasks).post(create_task))
        .route(
            "/v1/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/v1/tasks/{id}/activities", get(list_activities))
        .route("/v1/tasks/{id}/updates", post(post_update))
}

/// Shape tasks for the wire, loading creators and assignees in one query.
pub(crate) async fn task_resources(state: &AppState, tasks: &[Task]) -> ApiResult<Vec<TaskResource>> {
    let ids = tasks
        .iter()
        .flat_map(|t| std::iter::once(t.creator_id).chain(t.assignee_id));
    let users = users_by_id(state, ids).await?;
    tasks
        .iter()
        .map(|t| {
            let creator = users.get(&t.creator_id);
            let assignee = t.assignee_id.and_then(|id| users.get(&id));
            TaskResource::new(t, creator, assignee).map_err(ApiError::from)
        })
        .collect()
}

async fn task_resource(state: &AppState, task: &Task) -> ApiResult<TaskResource> {
    let mut shaped = task_resources(state, std::slice::from_ref(task)).await?;
    shaped
        .pop()
        .ok_or_else(|| ApiError::Internal(format!("task {} vanished while shaping", task.id)))
}

async fn record(
    state: &AppState,
    task_id: i64,
    user: &User,
    action: ActivityAction,
    description: impl Into<String>,
) -> ApiResult<()> {
    state
        .db
        .record_activity(&CreateActivity::new(task_id, user.id, action, description))
        .await?;
    Ok(())
}

fn with_note(description: String, note: Option<&str>) -> String {
    match note.map(str::trim).filter(|n| !n.is_empty()) {
        Some(note) => format!("{description}: {note}"),
        None => description,
    }
}

async fn list_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiQuery(mut filter): ApiQuery<TaskFilter>,
) -> ApiResult<Json<Envelope<Vec<TaskResource>>>> {
    if !user.is_admin() {
        filter.visible_to = Some(user.id);
    }
    let tasks = state.db.list_tasks(&filter).await?;
    Ok(Json(Envelope::new(task_resources(&state, &tasks).await?)))
}

async fn get_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Envelope<TaskResource>>> {
    let task = visible_task(&state, &user, id).await?;
    Ok(Json(Envelope::new(task_resource(&state, &task).await?)))
}

async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiJson(input): ApiJson<CreateTask>,
) -> ApiResult<(StatusCode, Json<Envelope<TaskResource>>)> {
    input.validate()?;
    let task = state.db.create_task(user.id, &input).await?;
    record(&state, task.id, &user, ActivityAction::Created, "created the task").await?;
    info!(task_id = task.id, user_id = user.id, "task created");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::new(task_resource(&state, &task).await?)),
    ))
}

async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<UpdateTask>,
) -> ApiResult<Json<Envelope<TaskResource>>> {
    input.validate()?;
    let before = visible_task(&state, &user, id).await?;
    if input.is_empty() {
        return Ok(Json(Envelope::new(task_resource(&state, &before).await?)));
    }
    let after = state.db.update_task(id, &input).await?;

    if before.status != after.status {
        let description = format!("changed status from {} to {}", before.status, after.status);
        record(&state, id, &user, ActivityAction::StatusChanged, description).await?;
    } else {
        record(&state, id, &user, ActivityAction::Updated, "updated the task").await?;
    }
    Ok(Json(Envelope::new(task_resource(&state, &after).await?)))
}

/// Only the creator or an admin may delete a task. Stored attachment files
/// go with it.
async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let task = visible_task(&state, &user, id).await?;
    if !user.is_admin() && task.creator_id != user.id {
        return Err(ApiError::Forbidden(
            "only the creator or an admin can delete a task".into(),
        ));
    }
    let attachments = state.db.list_attachments(id).await?;
    state.db.delete_task(id).await?;
    for key in attachments.iter().filter_map(|a| a.path.as_deref()) {
        state.discard_object(key).await;
    }
    info!(task_id = id, user_id = user.id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_activities(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Envelope<Vec<ActivityResource>>>> {
    visible_task(&state, &user, id).await?;
    let activities = state.db.list_activities(id).await?;
    let users = users_by_id(&state, activities.iter().map(|a| a.user_id)).await?;
    let ctx = state.resource_context();
    let shaped = activities
        .iter()
        .map(|a| ActivityResource::new(a, users.get(&a.user_id), &ctx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(Envelope::new(shaped)))
}

/// A progress report: status and/or progress change plus an optional note,
/// each recorded in the task's history.
async fn post_update(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(report): ApiJson<TaskProgressUpdate>,
) -> ApiResult<Json<Envelope<TaskResource>>> {
    report.validate()?;
    let before = visible_task(&state, &user, id).await?;
    let patch = report.to_update();
    let after = if patch.is_empty() {
        before.clone()
    } else {
        state.db.update_task(id, &patch).await?
    };
    let note = report.note.as_deref();

    let mut recorded = false;
    if before.status != after.status {
        let description = format!("changed status from {} to {}", before.status, after.status);
        record(
            &state,
            id,
            &user,
            ActivityAction::StatusChanged,
            with_note(description, note),
        )
        .await?;
        recorded = true;
    }
    if before.progress != after.progress {
        let description = format!("updated progress to {}%", after.progress);
        let description = if recorded {
            description
        } else {
            with_note(description, note)
        };
        record(&state, id, &user, ActivityAction::ProgressUpdated, description).await?;
        recorded = true;
    }
    if !recorded {
        let description = with_note("posted an update".to_string(), note);
        record(&state, id, &user, ActivityAction::Updated, description).await?;
    }

    Ok(Json(Envelope::new(task_resource(&state, &after).await?)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::routes::testing::send;
    use crate::test_helpers::{login_as, seed_user, test_state_with_token};
    use taskwise_core::Role;

    fn actions(body: &Value) -> Vec<String> {
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["action"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn task_crud_records_activities() {
        let (app, state, token) = test_state_with_token().await;
        let siti = seed_user(&state, "Siti", "siti@example.com", Role::Employee).await;

        let (status, created) = send(
            &app,
            "POST",
            "/v1/tasks",
            &token,
            Some(json!({
                "title": "Rekap absensi",
                "priority": "high",
                "due_date": "2025-08-01",
                "assignee_id": siti.id
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let task = &created["data"];
        assert_eq!(task["status"], "todo");
        assert_eq!(task["assignee"], json!({ "id": siti.id, "name": "Siti" }));
        assert_eq!(task["creator"]["name"], "Admin");
        let id = task["id"].as_i64().unwrap();

        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/v1/tasks/{id}"),
            &token,
            Some(json!({ "status": "in_progress", "assignee_id": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["data"]["status"], "in_progress");
        assert_eq!(updated["data"]["assignee"], Value::Null);

        let (_, history) = send(&app, "GET", &format!("/v1/tasks/{id}/activities"), &token, None).await;
        assert_eq!(actions(&history), vec!["status_changed", "created"]);
        assert_eq!(
            history["data"][0]["description"],
            "changed status from To Do to In Progress"
        );
        assert_eq!(history["data"][0]["user"]["name"], "Admin");

        let (status, _) = send(&app, "DELETE", &format!("/v1/tasks/{id}"), &token, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &format!("/v1/tasks/{id}"), &token, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn validation_failures_are_422() {
        let (app, _state, token) = test_state_with_token().await;
        let (status, body) = send(&app, "POST", "/v1/tasks", &token, Some(json!({ "title": "  " }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "title: must not be empty");

        let (status, _) = send(
            &app,
            "POST",
            "/v1/tasks",
            &token,
            Some(json!({ "title": "X", "progress": 101 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(
            &app,
            "POST",
            "/v1/tasks",
            &token,
            Some(json!({ "title": "X", "status": "archived" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(
            &app,
            "POST",
            "/v1/tasks",
            &token,
            Some(json!({ "title": "X", "assignee_id": 9999 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&app, "GET", "/v1/tasks?status=archived", &token, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn employees_only_see_their_tasks() {
        let (app, state, admin_token) = test_state_with_token().await;
        let siti = seed_user(&state, "Siti", "siti@example.com", Role::Employee).await;
        let budi = seed_user(&state, "Budi", "budi@example.com", Role::Employee).await;
        let siti_token = login_as(&state, &siti).await;
        let budi_token = login_as(&state, &budi).await;

        let (_, assigned) = send(
            &app,
            "POST",
            "/v1/tasks",
            &admin_token,
            Some(json!({ "title": "Untuk Siti", "assignee_id": siti.id })),
        )
        .await;
        send(&app, "POST", "/v1/tasks", &admin_token, Some(json!({ "title": "Admin saja" }))).await;
        send(&app, "POST", "/v1/tasks", &siti_token, Some(json!({ "title": "Buatan Siti" }))).await;

        let (_, all) = send(&app, "GET", "/v1/tasks", &admin_token, None).await;
        assert_eq!(all["data"].as_array().unwrap().len(), 3);

        let (_, mine) = send(&app, "GET", "/v1/tasks", &siti_token, None).await;
        let titles: Vec<&str> = mine["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Buatan Siti", "Untuk Siti"]);

        let id = assigned["data"]["id"].as_i64().unwrap();
        let (status, _) = send(&app, "GET", &format!("/v1/tasks/{id}"), &budi_token, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Assignees may work the task but not delete it.
        let (status, _) = send(&app, "DELETE", &format!("/v1/tasks/{id}"), &siti_token, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn progress_reports() {
        let (app, _state, token) = test_state_with_token().await;
        let (_, created) = send(&app, "POST", "/v1/tasks", &token, Some(json!({ "title": "Audit" }))).await;
        let id = created["data"]["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            "POST",
            &format!("/v1/tasks/{id}/updates"),
            &token,
            Some(json!({ "progress": 40, "note": "setengah jalan" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["progress"], 40);

        let (_, body) = send(
            &app,
            "POST",
            &format!("/v1/tasks/{id}/updates"),
            &token,
            Some(json!({ "status": "done" })),
        )
        .await;
        assert_eq!(body["data"]["status"], "done");
        assert_eq!(body["data"]["progress"], 100);

        let (status, _) = send(
            &app,
            "POST",
            &format!("/v1/tasks/{id}/updates"),
            &token,
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, history) = send(&app, "GET", &format!("/v1/tasks/{id}/activities"), &token, None).await;
        assert_eq!(
            actions(&history),
            vec!["progress_updated", "status_changed", "progress_updated", "created"]
        );
        assert_eq!(
            history["data"][2]["description"],
            "updated progress to 40%: setengah jalan"
        );
    }
}
