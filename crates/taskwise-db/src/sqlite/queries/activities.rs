use chrono::Utc;
use rusqlite::{params, Row};

use taskwise_core::activity::{ActivityAction, CreateActivity, TaskActivity};

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_activity(row: &Row) -> rusqlite::Result<TaskActivity> {
    let action_str: String = row.get("action")?;
    Ok(TaskActivity {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        user_id: row.get("user_id")?,
        action: ActivityAction::parse_str(&action_str).unwrap_or(ActivityAction::Updated),
        description: row.get("description")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn record_activity_sync(&self, input: &CreateActivity) -> Result<TaskActivity, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO task_activities (task_id, user_id, action, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    input.task_id,
                    input.user_id,
                    input.action.as_str(),
                    input.description,
                    Utc::now(),
                ],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM task_activities WHERE id = ?1",
                params![conn.last_insert_rowid()],
                row_to_activity,
            )
            .to_db()
        })
    }

    /// Newest first.
    pub fn list_activities_sync(&self, task_id: i64) -> Result<Vec<TaskActivity>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM task_activities WHERE task_id = ?1
                     ORDER BY created_at DESC, id DESC",
                )
                .to_db()?;
            let activities = stmt
                .query_map(params![task_id], row_to_activity)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(activities)
        })
    }
}
