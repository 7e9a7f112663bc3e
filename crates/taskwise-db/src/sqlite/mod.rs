pub mod migrations;
pub mod queries;

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{Connection, ErrorCode};

use taskwise_core::activity::{CreateActivity, TaskActivity};
use taskwise_core::attachment::{CreateAttachment, TaskAttachment};
use taskwise_core::comment::TaskComment;
use taskwise_core::journal::{
    CreateJournalNote, JournalDaySummary, JournalEntry, JournalNote, Mood, UpdateJournalNote,
};
use taskwise_core::task::{CreateTask, Task, TaskFilter, UpdateTask};
use taskwise_core::user::{AccessToken, NewUser, User, UserChanges, UserFilter};

use crate::{Database, DbConfig, DbError};

/// Converts `rusqlite::Result<T>` into `Result<T, DbError>` so query modules
/// can write `.to_db()?`.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config.path();
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let db = Self::open_unmigrated(path)?;
        db.run_migrations()?;
        Ok(db)
    }

    /// Open without touching the schema. Used by rollback tooling.
    pub fn open_unmigrated(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(migrations::run)
    }

    pub fn schema_version(&self) -> Result<i64, DbError> {
        self.with_conn(migrations::current_version)
    }

    pub fn migrate_to(&self, version: i64) -> Result<(), DbError> {
        self.with_conn(|conn| migrations::migrate_to(conn, version))
    }

    pub fn rollback_to(&self, version: i64) -> Result<(), DbError> {
        self.with_conn(|conn| migrations::rollback_to(conn, version))
    }

    /// Revert the newest applied migration. Returns the resulting version.
    pub fn rollback_last(&self) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            let current = migrations::current_version(conn)?;
            if current == 0 {
                return Err(DbError::InvalidInput("no migrations to roll back".into()));
            }
            migrations::rollback_to(conn, current - 1)?;
            migrations::current_version(conn)
        })
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&SqliteDatabase) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

/// Map a `rusqlite::Error` into a `DbError`. Constraint violations (unique
/// email, foreign keys, CHECKs) surface as `Conflict`.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound("no matching row".into()),
        rusqlite::Error::SqliteFailure(ref err, ref msg)
            if err.code == ErrorCode::ConstraintViolation =>
        {
            DbError::Conflict(msg.clone().unwrap_or_else(|| err.to_string()))
        }
        other => DbError::Internal(other.to_string()),
    }
}

/// `map_sqlite_err` with a descriptive NotFound for single-row lookups.
pub(crate) fn not_found_as(what: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> DbError {
    let what = what.into();
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(what),
        other => map_sqlite_err(other),
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    // -- Users --
    async fn create_user(&self, input: &NewUser) -> Result<User, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_user_sync(&input)).await
    }
    async fn get_user(&self, id: i64) -> Result<User, DbError> {
        self.blocking(move |db| db.get_user_sync(id)).await
    }
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let email = email.to_string();
        self.blocking(move |db| db.find_user_by_email_sync(&email))
            .await
    }
    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, DbError> {
        let ids = ids.to_vec();
        self.blocking(move |db| db.get_users_by_ids_sync(&ids)).await
    }
    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, DbError> {
        let filter = filter.clone();
        self.blocking(move |db| db.list_users_sync(&filter)).await
    }
    async fn count_users(&self, filter: &UserFilter) -> Result<i64, DbError> {
        let filter = filter.clone();
        self.blocking(move |db| db.count_users_sync(&filter)).await
    }
    async fn update_user(&self, id: i64, changes: &UserChanges) -> Result<User, DbError> {
        let changes = changes.clone();
        self.blocking(move |db| db.update_user_sync(id, &changes))
            .await
    }
    async fn delete_user(&self, id: i64) -> Result<(), DbError> {
        self.blocking(move |db| db.delete_user_sync(id)).await
    }

    // -- Access tokens --
    async fn create_access_token(
        &self,
        user_id: i64,
        name: &str,
        token_hash: &str,
    ) -> Result<AccessToken, DbError> {
        let name = name.to_string();
        let token_hash = token_hash.to_string();
        self.blocking(move |db| db.create_access_token_sync(user_id, &name, &token_hash))
            .await
    }
    async fn find_access_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<(AccessToken, User)>, DbError> {
        let token_hash = token_hash.to_string();
        self.blocking(move |db| db.find_access_token_sync(&token_hash))
            .await
    }
    async fn touch_access_token(&self, id: i64) -> Result<(), DbError> {
        self.blocking(move |db| db.touch_access_token_sync(id)).await
    }

    // -- Tasks --
    async fn create_task(&self, creator_id: i64, input: &CreateTask) -> Result<Task, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_task_sync(creator_id, &input))
            .await
    }
    async fn get_task(&self, id: i64) -> Result<Task, DbError> {
        self.blocking(move |db| db.get_task_sync(id)).await
    }
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, DbError> {
        let filter = filter.clone();
        self.blocking(move |db| db.list_tasks_sync(&filter)).await
    }
    async fn update_task(&self, id: i64, update: &UpdateTask) -> Result<Task, DbError> {
        let update = update.clone();
        self.blocking(move |db| db.update_task_sync(id, &update))
            .await
    }
    async fn delete_task(&self, id: i64) -> Result<(), DbError> {
        self.blocking(move |db| db.delete_task_sync(id)).await
    }

    // -- Attachments --
    async fn create_attachment(
        &self,
        input: &CreateAttachment,
    ) -> Result<TaskAttachment, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_attachment_sync(&input))
            .await
    }
    async fn get_attachment(&self, id: i64) -> Result<TaskAttachment, DbError> {
        self.blocking(move |db| db.get_attachment_sync(id)).await
    }
    async fn list_attachments(&self, task_id: i64) -> Result<Vec<TaskAttachment>, DbError> {
        self.blocking(move |db| db.list_attachments_sync(task_id))
            .await
    }
    async fn delete_attachment(&self, id: i64) -> Result<TaskAttachment, DbError> {
        self.blocking(move |db| db.delete_attachment_sync(id)).await
    }

    // -- Comments --
    async fn create_comment(
        &self,
        task_id: i64,
        user_id: i64,
        body: &str,
    ) -> Result<TaskComment, DbError> {
        let body = body.to_string();
        self.blocking(move |db| db.create_comment_sync(task_id, user_id, &body))
            .await
    }
    async fn list_comments(&self, task_id: i64) -> Result<Vec<TaskComment>, DbError> {
        self.blocking(move |db| db.list_comments_sync(task_id)).await
    }

    // -- Activities --
    async fn record_activity(&self, input: &CreateActivity) -> Result<TaskActivity, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.record_activity_sync(&input))
            .await
    }
    async fn list_activities(&self, task_id: i64) -> Result<Vec<TaskActivity>, DbError> {
        self.blocking(move |db| db.list_activities_sync(task_id))
            .await
    }

    // -- Journal --
    async fn get_journal_entry(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Option<JournalEntry>, DbError> {
        self.blocking(move |db| db.get_journal_entry_sync(user_id, date))
            .await
    }
    async fn set_journal_mood(
        &self,
        user_id: i64,
        date: NaiveDate,
        mood: Option<Mood>,
    ) -> Result<JournalEntry, DbError> {
        self.blocking(move |db| db.set_journal_mood_sync(user_id, date, mood))
            .await
    }
    async fn journal_month(
        &self,
        user_id: i64,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<Vec<JournalDaySummary>, DbError> {
        self.blocking(move |db| db.journal_month_sync(user_id, first, last))
            .await
    }
    async fn list_journal_notes(&self, entry_id: i64) -> Result<Vec<JournalNote>, DbError> {
        self.blocking(move |db| db.list_journal_notes_sync(entry_id))
            .await
    }
    async fn create_journal_note(
        &self,
        user_id: i64,
        input: &CreateJournalNote,
    ) -> Result<JournalNote, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_journal_note_sync(user_id, &input))
            .await
    }
    async fn update_journal_note(
        &self,
        user_id: i64,
        id: i64,
        update: &UpdateJournalNote,
    ) -> Result<JournalNote, DbError> {
        let update = update.clone();
        self.blocking(move |db| db.update_journal_note_sync(user_id, id, &update))
            .await
    }
    async fn delete_journal_note(&self, user_id: i64, id: i64) -> Result<(), DbError> {
        self.blocking(move |db| db.delete_journal_note_sync(user_id, id))
            .await
    }
}
