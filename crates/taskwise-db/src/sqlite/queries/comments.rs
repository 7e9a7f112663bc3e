use chrono::Utc;
use rusqlite::{params, Row};

use taskwise_core::comment::TaskComment;

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_comment(row: &Row) -> rusqlite::Result<TaskComment> {
    Ok(TaskComment {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        user_id: row.get("user_id")?,
        body: row.get("body")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_comment_sync(
        &self,
        task_id: i64,
        user_id: i64,
        body: &str,
    ) -> Result<TaskComment, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO task_comments (task_id, user_id, body, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![task_id, user_id, body.trim(), Utc::now()],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM task_comments WHERE id = ?1",
                params![conn.last_insert_rowid()],
                row_to_comment,
            )
            .to_db()
        })
    }

    /// Oldest first, the order a conversation reads in.
    pub fn list_comments_sync(&self, task_id: i64) -> Result<Vec<TaskComment>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM task_comments WHERE task_id = ?1
                     ORDER BY created_at ASC, id ASC",
                )
                .to_db()?;
            let comments = stmt
                .query_map(params![task_id], row_to_comment)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(comments)
        })
    }
}
