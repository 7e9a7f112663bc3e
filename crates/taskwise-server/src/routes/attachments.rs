use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    routing::{delete, get},
    Extension, Json, Router,
};
use bytes::Bytes;
use tracing::info;

use taskwise_core::activity::{ActivityAction, CreateActivity};
use taskwise_core::attachment::{AttachmentType, CreateAttachment, LinkAttachmentInput};
use taskwise_core::resource::{Envelope, TaskAttachmentResource};
use taskwise_core::{User, ValidationError};
use taskwise_store::task_attachment_key;

use super::{users_by_id, visible_task, AppState};
use crate::error::{ApiError, ApiJson, ApiPath, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/tasks/{id}/attachments",
            get(list_attachments).post(add_attachment),
        )
        .route("/v1/attachments/{id}", delete(delete_attachment))
}

struct Upload {
    kind: Option<AttachmentType>,
    file_name: String,
    content_type: String,
    bytes: Bytes,
}

async fn list_attachments(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiPath(task_id): ApiPath<i64>,
) -> ApiResult<Json<Envelope<Vec<TaskAttachmentResource>>>> {
    visible_task(&state, &user, task_id).await?;
    let attachments = state.db.list_attachments(task_id).await?;
    let users = users_by_id(&state, attachments.iter().map(|a| a.user_id)).await?;
    let ctx = state.resource_context();
    let shaped = attachments
        .iter()
        .map(|a| TaskAttachmentResource::new(a, users.get(&a.user_id), &ctx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(Envelope::new(shaped)))
}

/// `multipart/form-data` uploads a file; a JSON body adds a link.
async fn add_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiPath(task_id): ApiPath<i64>,
    request: Request,
) -> ApiResult<(StatusCode, Json<Envelope<TaskAttachmentResource>>)> {
    visible_task(&state, &user, task_id).await?;

    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (input, description) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let upload = read_upload(multipart).await?;
        store_upload(&state, &user, task_id, upload).await?
    } else {
        let ApiJson(link) = ApiJson::<LinkAttachmentInput>::from_request(request, &state).await?;
        if link.attachment_type != AttachmentType::Link {
            return Err(ValidationError::new(
                "attachment_type",
                "files must be sent as multipart/form-data",
            )
            .into());
        }
        let input = CreateAttachment::link(task_id, user.id, &link.url)?;
        let description = format!("added link {}", link.url.trim());
        (input, description)
    };

    let attachment = match state.db.create_attachment(&input).await {
        Ok(a) => a,
        Err(e) => {
            if let Some(key) = input.path.as_deref() {
                state.discard_object(key).await;
            }
            return Err(e.into());
        }
    };
    state
        .db
        .record_activity(&CreateActivity::new(
            task_id,
            user.id,
            ActivityAction::AttachmentAdded,
            description,
        ))
        .await?;
    info!(task_id, attachment_id = attachment.id, kind = %attachment.kind, "attachment added");

    let resource = TaskAttachmentResource::new(&attachment, Some(&user), &state.resource_context())?;
    Ok((StatusCode::CREATED, Json(Envelope::new(resource))))
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut kind = None;
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        match field.name() {
            Some("attachment_type") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                let parsed = AttachmentType::parse_str(text.trim()).ok_or_else(|| {
                    ValidationError::new("attachment_type", format!("unknown type '{text}'"))
                })?;
                kind = Some(parsed);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("file").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                file = Some((file_name, content_type, bytes));
            }
            _ => {}
        }
    }
    let (file_name, content_type, bytes) =
        file.ok_or_else(|| ValidationError::new("file", "is required"))?;
    Ok(Upload {
        kind,
        file_name,
        content_type,
        bytes,
    })
}

/// Write the file to the object store and build the row that points at it.
async fn store_upload(
    state: &AppState,
    user: &User,
    task_id: i64,
    upload: Upload,
) -> ApiResult<(CreateAttachment, String)> {
    let kind = AttachmentType::from_mime(&upload.content_type);
    match upload.kind {
        Some(AttachmentType::Link) => {
            return Err(ValidationError::new(
                "attachment_type",
                "links must be sent as JSON",
            )
            .into())
        }
        Some(declared) if declared != kind => {
            return Err(ValidationError::new(
                "attachment_type",
                "does not match the file's content type",
            )
            .into())
        }
        _ => {}
    }
    let key = task_attachment_key(task_id, &uuid::Uuid::new_v4().to_string(), &upload.file_name);
    let size = upload.bytes.len() as i64;
    state.store.put(&key, upload.bytes).await?;

    let input = CreateAttachment::upload(
        task_id,
        user.id,
        kind,
        &upload.file_name,
        &key,
        &upload.content_type,
        size,
    );
    Ok((input, format!("attached {}", upload.file_name)))
}

/// The uploader or an admin may remove an attachment; its stored file goes too.
async fn delete_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    let attachment = state.db.get_attachment(id).await?;
    if !user.is_admin() && attachment.user_id != user.id {
        return Err(ApiError::Forbidden(
            "only the uploader or an admin can delete an attachment".into(),
        ));
    }
    let removed = state.db.delete_attachment(id).await?;
    if let Some(key) = removed.path.as_deref() {
        state.discard_object(key).await;
    }

    let label = removed
        .original_name
        .as_deref()
        .or(removed.url.as_deref())
        .unwrap_or("an attachment");
    state
        .db
        .record_activity(&CreateActivity::new(
            removed.task_id,
            user.id,
            ActivityAction::AttachmentRemoved,
            format!("removed {label}"),
        ))
        .await?;
    info!(attachment_id = id, task_id = removed.task_id, "attachment deleted");
    Ok(StatusCode::NO_CONTENT)
}
