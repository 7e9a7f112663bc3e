use chrono::Utc;
use rusqlite::{params, Connection, Row};

use taskwise_core::task::{CreateTask, Priority, Task, TaskFilter, TaskStatus, UpdateTask};

use super::super::{not_found_as, SqliteDatabase, SqliteResultExt};
use super::{like_pattern, Params};
use crate::DbError;

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    let status_str: String = row.get("status")?;
    let priority_str: String = row.get("priority")?;
    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: TaskStatus::parse_str(&status_str).unwrap_or_default(),
        priority: Priority::parse_str(&priority_str).unwrap_or_default(),
        progress: row.get("progress")?,
        due_date: row.get("due_date")?,
        assignee_id: row.get("assignee_id")?,
        creator_id: row.get("creator_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn fetch_task(conn: &Connection, id: i64) -> Result<Task, DbError> {
    conn.query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
        .map_err(not_found_as(format!("task {id}")))
}

/// Assignees must exist; a dangling id would otherwise be a FK conflict.
fn ensure_user_exists(conn: &Connection, user_id: i64) -> Result<(), DbError> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![user_id],
            |row| row.get(0),
        )
        .to_db()?;
    if !exists {
        return Err(DbError::InvalidInput(format!("user {user_id} does not exist")));
    }
    Ok(())
}

impl SqliteDatabase {
    pub fn create_task_sync(&self, creator_id: i64, input: &CreateTask) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            if let Some(assignee) = input.assignee_id {
                ensure_user_exists(conn, assignee)?;
            }
            let progress = if input.status == TaskStatus::Done {
                100
            } else {
                input.progress
            };
            let now = Utc::now();
            conn.execute(
                "INSERT INTO tasks (
                    title, description, status, priority, progress, due_date,
                    assignee_id, creator_id, created_at, updated_at
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    input.title.trim(),
                    input.description,
                    input.status.as_str(),
                    input.priority.as_str(),
                    progress,
                    input.due_date,
                    input.assignee_id,
                    creator_id,
                    now,
                    now,
                ],
            )
            .to_db()?;
            fetch_task(conn, conn.last_insert_rowid())
        })
    }

    pub fn get_task_sync(&self, id: i64) -> Result<Task, DbError> {
        self.with_conn(|conn| fetch_task(conn, id))
    }

    pub fn list_tasks_sync(&self, filter: &TaskFilter) -> Result<Vec<Task>, DbError> {
        self.with_conn(|conn| {
            let mut p = Params::default();
            let mut sql = String::from("SELECT * FROM tasks WHERE 1=1");

            if let Some(status) = filter.status {
                sql.push_str(&format!(" AND status = {}", p.push(status.as_str().to_string())));
            }
            if let Some(priority) = filter.priority {
                sql.push_str(&format!(
                    " AND priority = {}",
                    p.push(priority.as_str().to_string())
                ));
            }
            if let Some(assignee_id) = filter.assignee_id {
                sql.push_str(&format!(" AND assignee_id = {}", p.push(assignee_id)));
            }
            if let Some(ref search) = filter.search {
                if !search.trim().is_empty() {
                    let ph = p.push(like_pattern(search));
                    sql.push_str(&format!(
                        " AND (title LIKE {ph} ESCAPE '\\' OR description LIKE {ph} ESCAPE '\\')"
                    ));
                }
            }
            if let Some(user_id) = filter.visible_to {
                let ph = p.push(user_id);
                sql.push_str(&format!(" AND (creator_id = {ph} OR assignee_id = {ph})"));
            }
            if let Some(from) = filter.created_from {
                sql.push_str(&format!(" AND substr(created_at, 1, 10) >= {}", p.push(from)));
            }
            if let Some(to) = filter.created_to {
                sql.push_str(&format!(" AND substr(created_at, 1, 10) <= {}", p.push(to)));
            }

            sql.push_str(" ORDER BY created_at DESC, id DESC");

            let mut stmt = conn.prepare(&sql).to_db()?;
            let tasks = stmt
                .query_map(p.as_refs().as_slice(), row_to_task)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(tasks)
        })
    }

    pub fn update_task_sync(&self, id: i64, update: &UpdateTask) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            if let Some(Some(assignee)) = update.assignee_id {
                ensure_user_exists(conn, assignee)?;
            }

            let mut p = Params::default();
            let mut sets = vec![format!("updated_at = {}", p.push(Utc::now()))];

            if let Some(ref title) = update.title {
                sets.push(format!("title = {}", p.push(title.trim().to_string())));
            }
            if let Some(ref description) = update.description {
                sets.push(format!("description = {}", p.push(description.clone())));
            }
            if let Some(status) = update.status {
                sets.push(format!("status = {}", p.push(status.as_str().to_string())));
            }
            if let Some(priority) = update.priority {
                sets.push(format!("priority = {}", p.push(priority.as_str().to_string())));
            }
            let progress = match update.status {
                Some(TaskStatus::Done) => Some(100u8),
                _ => update.progress,
            };
            if let Some(progress) = progress {
                sets.push(format!("progress = {}", p.push(progress)));
            }
            if let Some(due_date) = update.due_date {
                sets.push(format!("due_date = {}", p.push(due_date)));
            }
            if let Some(assignee_id) = update.assignee_id {
                sets.push(format!("assignee_id = {}", p.push(assignee_id)));
            }

            let sql = format!(
                "UPDATE tasks SET {} WHERE id = {}",
                sets.join(", "),
                p.push(id)
            );
            let changed = conn.execute(&sql, p.as_refs().as_slice()).to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("task {id}")));
            }
            fetch_task(conn, id)
        })
    }

    pub fn delete_task_sync(&self, id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM tasks WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("task {id}")));
            }
            Ok(())
        })
    }
}
