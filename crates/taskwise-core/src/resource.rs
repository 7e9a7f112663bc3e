//! Public JSON shapes.
//!
//! Every response body the server produces is built here from internal
//! records. Records such as [`User`] are not `Serialize`, so a handler cannot
//! return one by accident: hidden columns (password hash, photo path, store
//! keys) only leave the process through the fields listed on these structs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityAction, TaskActivity};
use crate::attachment::{AttachmentType, TaskAttachment};
use crate::comment::TaskComment;
use crate::error::ResourceError;
use crate::humanize::diff_for_humans;
use crate::journal::{JournalEntry, JournalNote, Mood};
use crate::task::{Priority, Task, TaskStatus};
use crate::user::{Role, User};

const AVATAR_SERVICE: &str = "https://ui-avatars.com/api/";

/// Request-scoped inputs to serialization: the clock used for relative
/// timestamps and the public base URL of stored files.
#[derive(Debug, Clone)]
pub struct ResourceContext {
    pub now: DateTime<Utc>,
    pub storage_url: String,
}

impl ResourceContext {
    pub fn new(storage_url: impl Into<String>) -> Self {
        Self::at(Utc::now(), storage_url)
    }

    pub fn at(now: DateTime<Utc>, storage_url: impl Into<String>) -> Self {
        let storage_url = storage_url.into().trim_end_matches('/').to_string();
        Self { now, storage_url }
    }

    pub fn storage_url_for(&self, key: &str) -> String {
        format!("{}/{}", self.storage_url, key.trim_start_matches('/'))
    }

    pub fn humanize(&self, at: DateTime<Utc>) -> String {
        diff_for_humans(at, self.now)
    }
}

impl User {
    /// Uploaded photo if any, otherwise a generated initials avatar.
    pub fn profile_photo_url(&self, ctx: &ResourceContext) -> String {
        match self.profile_photo_path {
            Some(ref key) => ctx.storage_url_for(key),
            None => {
                let initials = self
                    .name
                    .split_whitespace()
                    .filter_map(|word| word.chars().next())
                    .map(String::from)
                    .collect::<Vec<_>>()
                    .join(" ");
                let encoded: String =
                    url::form_urlencoded::byte_serialize(initials.as_bytes()).collect();
                format!("{AVATAR_SERVICE}?name={encoded}&color=7F9CF5&background=EBF4FF")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResource {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub profile_photo_url: String,
    pub role: Role,
    pub jabatan: Option<String>,
}

impl UserResource {
    pub fn new(user: &User, ctx: &ResourceContext) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            profile_photo_url: user.profile_photo_url(ctx),
            role: user.role,
            jabatan: user.jabatan.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAttachmentResource {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: AttachmentType,
    pub original_name: Option<String>,
    pub file_url: Option<String>,
    pub created_at: String,
    pub user: UserSummary,
}

impl TaskAttachmentResource {
    pub fn new(
        attachment: &TaskAttachment,
        uploader: Option<&User>,
        ctx: &ResourceContext,
    ) -> Result<Self, ResourceError> {
        let uploader = uploader
            .filter(|u| u.id == attachment.user_id)
            .ok_or(ResourceError::MissingRelation {
                resource: "attachment",
                id: attachment.id,
                relation: "user",
            })?;
        Ok(Self {
            id: attachment.id,
            kind: attachment.kind,
            original_name: attachment.original_name.clone(),
            file_url: attachment.file_url(ctx),
            created_at: ctx.humanize(attachment.created_at),
            user: UserSummary::from(uploader),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResource {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub progress: u8,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub creator: UserSummary,
    pub assignee: Option<UserSummary>,
}

impl TaskResource {
    pub fn new(
        task: &Task,
        creator: Option<&User>,
        assignee: Option<&User>,
    ) -> Result<Self, ResourceError> {
        let missing = |relation| ResourceError::MissingRelation {
            resource: "task",
            id: task.id,
            relation,
        };
        let creator = creator
            .filter(|u| u.id == task.creator_id)
            .ok_or_else(|| missing("creator"))?;
        let assignee = match task.assignee_id {
            Some(id) => Some(
                assignee
                    .filter(|u| u.id == id)
                    .map(UserSummary::from)
                    .ok_or_else(|| missing("assignee"))?,
            ),
            None => None,
        };
        Ok(Self {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            progress: task.progress,
            due_date: task.due_date,
            created_at: task.created_at,
            updated_at: task.updated_at,
            creator: UserSummary::from(creator),
            assignee,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub id: i64,
    pub name: String,
    pub profile_photo_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentResource {
    pub id: i64,
    pub body: String,
    pub created_at: String,
    pub user: CommentAuthor,
}

impl CommentResource {
    pub fn new(
        comment: &TaskComment,
        author: Option<&User>,
        ctx: &ResourceContext,
    ) -> Result<Self, ResourceError> {
        let author = author
            .filter(|u| u.id == comment.user_id)
            .ok_or(ResourceError::MissingRelation {
                resource: "comment",
                id: comment.id,
                relation: "user",
            })?;
        Ok(Self {
            id: comment.id,
            body: comment.body.clone(),
            created_at: ctx.humanize(comment.created_at),
            user: CommentAuthor {
                id: author.id,
                name: author.name.clone(),
                profile_photo_url: author.profile_photo_url(ctx),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityResource {
    pub id: i64,
    pub action: ActivityAction,
    pub description: String,
    pub created_at: String,
    pub user: UserSummary,
}

impl ActivityResource {
    pub fn new(
        activity: &TaskActivity,
        actor: Option<&User>,
        ctx: &ResourceContext,
    ) -> Result<Self, ResourceError> {
        let actor = actor
            .filter(|u| u.id == activity.user_id)
            .ok_or(ResourceError::MissingRelation {
                resource: "activity",
                id: activity.id,
                relation: "user",
            })?;
        Ok(Self {
            id: activity.id,
            action: activity.action,
            description: activity.description.clone(),
            created_at: ctx.humanize(activity.created_at),
            user: UserSummary::from(actor),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalNoteResource {
    pub id: i64,
    pub title: Option<String>,
    pub color: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&JournalNote> for JournalNoteResource {
    fn from(note: &JournalNote) -> Self {
        Self {
            id: note.id,
            title: note.title.clone(),
            color: note.color.clone(),
            content: note.content.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalDayResource {
    pub date: NaiveDate,
    pub mood: Option<Mood>,
    pub notes: Vec<JournalNoteResource>,
}

impl JournalDayResource {
    /// A day without an entry renders as an empty shell.
    pub fn new(date: NaiveDate, entry: Option<&JournalEntry>, notes: &[JournalNote]) -> Self {
        Self {
            date,
            mood: entry.and_then(|e| e.mood),
            notes: notes.iter().map(JournalNoteResource::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `{"data": ...}` wrapper used for every resource response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl PageMeta {
    pub fn new(current_page: u32, per_page: u32, total: i64) -> Self {
        let per_page = per_page.max(1);
        let pages = (total.max(0) as u64).div_ceil(per_page as u64).max(1);
        Self {
            current_page,
            last_page: u32::try_from(pages).unwrap_or(u32::MAX),
            per_page,
            total,
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.current_page.saturating_sub(1)) * i64::from(self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::{json, Value};

    use super::*;

    fn ctx() -> ResourceContext {
        ResourceContext::new("http://localhost:8000/storage")
    }

    fn user(id: i64, name: &str) -> User {
        let now = Utc::now();
        User {
            id,
            name: name.into(),
            email: format!("user{id}@example.com"),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
            role: Role::Employee,
            jabatan: Some("Staff IT".into()),
            profile_photo_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn link_attachment(ctx: &ResourceContext) -> TaskAttachment {
        TaskAttachment {
            id: 1,
            task_id: 9,
            user_id: 2,
            kind: AttachmentType::Link,
            original_name: None,
            path: None,
            url: Some("http://x/y".into()),
            mime_type: None,
            size_bytes: 0,
            created_at: ctx.now - Duration::hours(3),
        }
    }

    fn keys(value: &Value) -> Vec<String> {
        let mut keys: Vec<String> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    #[test]
    fn attachment_has_exactly_six_keys() {
        let ctx = ctx();
        let uploader = user(2, "A");
        let resource =
            TaskAttachmentResource::new(&link_attachment(&ctx), Some(&uploader), &ctx).unwrap();
        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(
            keys(&value),
            vec!["created_at", "file_url", "id", "original_name", "type", "user"]
        );
        assert_eq!(value["created_at"], json!("3 hours ago"));
        assert!(!value["created_at"].is_number());
    }

    #[test]
    fn attachment_user_is_id_and_name_only() {
        let ctx = ctx();
        let uploader = user(2, "A");
        let resource =
            TaskAttachmentResource::new(&link_attachment(&ctx), Some(&uploader), &ctx).unwrap();
        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(value["user"], json!({ "id": 2, "name": "A" }));
        assert_eq!(value["type"], json!("link"));
        assert_eq!(value["original_name"], Value::Null);
        assert_eq!(value["file_url"], json!("http://x/y"));
    }

    #[test]
    fn attachment_without_user_is_an_error() {
        let ctx = ctx();
        let err = TaskAttachmentResource::new(&link_attachment(&ctx), None, &ctx).unwrap_err();
        assert_eq!(
            err,
            ResourceError::MissingRelation {
                resource: "attachment",
                id: 1,
                relation: "user",
            }
        );

        // A user that is not the uploader does not satisfy the relation either.
        let stranger = user(3, "B");
        assert!(TaskAttachmentResource::new(&link_attachment(&ctx), Some(&stranger), &ctx).is_err());
    }

    #[test]
    fn user_resource_never_leaks_credentials() {
        let ctx = ctx();
        let mut u = user(5, "Budi Santoso");
        u.profile_photo_path = Some("profile-photos/abc/me.png".into());
        let value = serde_json::to_value(UserResource::new(&u, &ctx)).unwrap();
        assert_eq!(
            keys(&value),
            vec!["email", "id", "jabatan", "name", "profile_photo_url", "role"]
        );
        let text = value.to_string();
        assert!(!text.contains("argon2"));
        assert!(!text.contains("password"));
        assert_eq!(
            value["profile_photo_url"],
            json!("http://localhost:8000/storage/profile-photos/abc/me.png")
        );
    }

    #[test]
    fn default_avatar_uses_initials() {
        let u = user(5, "Budi Santoso");
        assert_eq!(
            u.profile_photo_url(&ctx()),
            "https://ui-avatars.com/api/?name=B+S&color=7F9CF5&background=EBF4FF"
        );
    }

    #[test]
    fn task_resource_requires_assignee_when_assigned() {
        let now = Utc::now();
        let task = Task {
            id: 4,
            title: "Audit".into(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: Priority::High,
            progress: 0,
            due_date: None,
            assignee_id: Some(2),
            creator_id: 1,
            created_at: now,
            updated_at: now,
        };
        let creator = user(1, "Admin");
        let assignee = user(2, "Siti");
        let err = TaskResource::new(&task, Some(&creator), None).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::MissingRelation { relation: "assignee", .. }
        ));
        let ok = TaskResource::new(&task, Some(&creator), Some(&assignee)).unwrap();
        assert_eq!(ok.assignee.unwrap().name, "Siti");
        assert_eq!(ok.creator.id, 1);
    }

    #[test]
    fn page_meta_math() {
        let meta = PageMeta::new(2, 10, 25);
        assert_eq!(meta.last_page, 3);
        assert_eq!(meta.offset(), 10);
        assert_eq!(PageMeta::new(1, 10, 0).last_page, 1);
    }

    #[test]
    fn journal_day_without_entry_is_empty() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 19).unwrap();
        let day = JournalDayResource::new(date, None, &[]);
        assert_eq!(day.mood, None);
        assert!(day.notes.is_empty());
    }
}
