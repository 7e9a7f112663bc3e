use chrono::Utc;
use rusqlite::{params, Connection, Row};

use taskwise_core::attachment::{AttachmentType, CreateAttachment, TaskAttachment};

use super::super::{not_found_as, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_attachment(row: &Row) -> rusqlite::Result<TaskAttachment> {
    let kind_str: String = row.get("type")?;
    Ok(TaskAttachment {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        user_id: row.get("user_id")?,
        kind: AttachmentType::parse_str(&kind_str).unwrap_or(AttachmentType::File),
        original_name: row.get("original_name")?,
        path: row.get("path")?,
        url: row.get("url")?,
        mime_type: row.get("mime_type")?,
        size_bytes: row.get("size_bytes")?,
        created_at: row.get("created_at")?,
    })
}

fn fetch_attachment(conn: &Connection, id: i64) -> Result<TaskAttachment, DbError> {
    conn.query_row(
        "SELECT * FROM task_attachments WHERE id = ?1",
        params![id],
        row_to_attachment,
    )
    .map_err(not_found_as(format!("attachment {id}")))
}

impl SqliteDatabase {
    pub fn create_attachment_sync(
        &self,
        input: &CreateAttachment,
    ) -> Result<TaskAttachment, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO task_attachments (
                    task_id, user_id, type, original_name, path, url, mime_type, size_bytes, created_at
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    input.task_id,
                    input.user_id,
                    input.kind.as_str(),
                    input.original_name,
                    input.path,
                    input.url,
                    input.mime_type,
                    input.size_bytes,
                    Utc::now(),
                ],
            )
            .to_db()?;
            fetch_attachment(conn, conn.last_insert_rowid())
        })
    }

    pub fn get_attachment_sync(&self, id: i64) -> Result<TaskAttachment, DbError> {
        self.with_conn(|conn| fetch_attachment(conn, id))
    }

    pub fn list_attachments_sync(&self, task_id: i64) -> Result<Vec<TaskAttachment>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM task_attachments WHERE task_id = ?1
                     ORDER BY created_at DESC, id DESC",
                )
                .to_db()?;
            let attachments = stmt
                .query_map(params![task_id], row_to_attachment)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(attachments)
        })
    }

    /// Delete the row and hand it back so the caller can remove the stored object.
    pub fn delete_attachment_sync(&self, id: i64) -> Result<TaskAttachment, DbError> {
        self.with_conn(|conn| {
            let attachment = fetch_attachment(conn, id)?;
            conn.execute("DELETE FROM task_attachments WHERE id = ?1", params![id])
                .to_db()?;
            Ok(attachment)
        })
    }
}
