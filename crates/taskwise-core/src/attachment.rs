use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::resource::ResourceContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentType {
    Image,
    File,
    Link,
}

impl AttachmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentType::Image => "image",
            AttachmentType::File => "file",
            AttachmentType::Link => "link",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "image" => Some(AttachmentType::Image),
            "file" => Some(AttachmentType::File),
            "link" => Some(AttachmentType::Link),
            _ => None,
        }
    }

    /// Type of an uploaded file, inferred from its MIME type.
    pub fn from_mime(mime: &str) -> Self {
        if mime.trim().to_ascii_lowercase().starts_with("image/") {
            AttachmentType::Image
        } else {
            AttachmentType::File
        }
    }
}

impl fmt::Display for AttachmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task attachment row. Uploads carry a store `path`; links carry a `url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAttachment {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub kind: AttachmentType,
    pub original_name: Option<String>,
    pub path: Option<String>,
    pub url: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl TaskAttachment {
    /// Public URL: the stored URL for links, the storage URL for uploads.
    pub fn file_url(&self, ctx: &ResourceContext) -> Option<String> {
        match self.kind {
            AttachmentType::Link => self.url.clone(),
            AttachmentType::Image | AttachmentType::File => {
                self.path.as_deref().map(|key| ctx.storage_url_for(key))
            }
        }
    }
}

/// Input for a new attachment row. Built by the server after the upload (if
/// any) has been written to the object store.
#[derive(Debug, Clone)]
pub struct CreateAttachment {
    pub task_id: i64,
    pub user_id: i64,
    pub kind: AttachmentType,
    pub original_name: Option<String>,
    pub path: Option<String>,
    pub url: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
}

impl CreateAttachment {
    pub fn upload(
        task_id: i64,
        user_id: i64,
        kind: AttachmentType,
        original_name: &str,
        path: &str,
        mime_type: &str,
        size_bytes: i64,
    ) -> Self {
        Self {
            task_id,
            user_id,
            kind,
            original_name: Some(original_name.to_string()),
            path: Some(path.to_string()),
            url: None,
            mime_type: Some(mime_type.to_string()),
            size_bytes,
        }
    }

    pub fn link(task_id: i64, user_id: i64, url: &str) -> Result<Self, ValidationError> {
        validate_link(url)?;
        Ok(Self {
            task_id,
            user_id,
            kind: AttachmentType::Link,
            original_name: None,
            path: None,
            url: Some(url.trim().to_string()),
            mime_type: None,
            size_bytes: 0,
        })
    }
}

/// JSON body for adding a link attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkAttachmentInput {
    pub attachment_type: AttachmentType,
    pub url: String,
}

/// MIME type for a file name, by extension.
pub fn guess_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => "application/octet-stream",
    }
}

fn validate_link(url: &str) -> Result<(), ValidationError> {
    let parsed = url::Url::parse(url.trim())
        .map_err(|e| ValidationError::new("url", format!("invalid url: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ValidationError::new(
            "url",
            format!("unsupported scheme '{other}'"),
        )),
    }
}
