pub mod sqlite;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use taskwise_core::activity::{CreateActivity, TaskActivity};
use taskwise_core::attachment::{CreateAttachment, TaskAttachment};
use taskwise_core::comment::TaskComment;
use taskwise_core::journal::{
    CreateJournalNote, JournalDaySummary, JournalEntry, JournalNote, Mood, UpdateJournalNote,
};
use taskwise_core::task::{CreateTask, Task, TaskFilter, UpdateTask};
use taskwise_core::user::{AccessToken, NewUser, User, UserChanges, UserFilter};

pub use sqlite::SqliteDatabase;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Internal(String),
}

/// Where the database lives. `None` uses `<data_dir>/taskwise.db`.
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    pub sqlite_path: Option<String>,
}

impl DbConfig {
    pub fn path(&self) -> PathBuf {
        self.sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir().join("taskwise.db"))
    }
}

/// Storage operations used by the HTTP server.
///
/// Records come back as internal rows; shaping them for the wire is the job
/// of `taskwise_core::resource`.
#[async_trait]
pub trait Database: Send + Sync {
    // -- Users --
    async fn create_user(&self, input: &NewUser) -> Result<User, DbError>;
    async fn get_user(&self, id: i64) -> Result<User, DbError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError>;
    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, DbError>;
    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, DbError>;
    async fn count_users(&self, filter: &UserFilter) -> Result<i64, DbError>;
    async fn update_user(&self, id: i64, changes: &UserChanges) -> Result<User, DbError>;
    async fn delete_user(&self, id: i64) -> Result<(), DbError>;

    // -- Access tokens --
    async fn create_access_token(
        &self,
        user_id: i64,
        name: &str,
        token_hash: &str,
    ) -> Result<AccessToken, DbError>;
    async fn find_access_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<(AccessToken, User)>, DbError>;
    async fn touch_access_token(&self, id: i64) -> Result<(), DbError>;

    // -- Tasks --
    async fn create_task(&self, creator_id: i64, input: &CreateTask) -> Result<Task, DbError>;
    async fn get_task(&self, id: i64) -> Result<Task, DbError>;
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, DbError>;
    async fn update_task(&self, id: i64, update: &UpdateTask) -> Result<Task, DbError>;
    async fn delete_task(&self, id: i64) -> Result<(), DbError>;

    // -- Attachments --
    async fn create_attachment(&self, input: &CreateAttachment)
        -> Result<TaskAttachment, DbError>;
    async fn get_attachment(&self, id: i64) -> Result<TaskAttachment, DbError>;
    async fn list_attachments(&self, task_id: i64) -> Result<Vec<TaskAttachment>, DbError>;
    async fn delete_attachment(&self, id: i64) -> Result<TaskAttachment, DbError>;

    // -- Comments --
    async fn create_comment(
        &self,
        task_id: i64,
        user_id: i64,
        body: &str,
    ) -> Result<TaskComment, DbError>;
    async fn list_comments(&self, task_id: i64) -> Result<Vec<TaskComment>, DbError>;

    // -- Activities --
    async fn record_activity(&self, input: &CreateActivity) -> Result<TaskActivity, DbError>;
    async fn list_activities(&self, task_id: i64) -> Result<Vec<TaskActivity>, DbError>;

    // -- Journal --
    async fn get_journal_entry(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Option<JournalEntry>, DbError>;
    async fn set_journal_mood(
        &self,
        user_id: i64,
        date: NaiveDate,
        mood: Option<Mood>,
    ) -> Result<JournalEntry, DbError>;
    async fn journal_month(
        &self,
        user_id: i64,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<Vec<JournalDaySummary>, DbError>;
    async fn list_journal_notes(&self, entry_id: i64) -> Result<Vec<JournalNote>, DbError>;
    async fn create_journal_note(
        &self,
        user_id: i64,
        input: &CreateJournalNote,
    ) -> Result<JournalNote, DbError>;
    async fn update_journal_note(
        &self,
        user_id: i64,
        id: i64,
        update: &UpdateJournalNote,
    ) -> Result<JournalNote, DbError>;
    async fn delete_journal_note(&self, user_id: i64, id: i64) -> Result<(), DbError>;
}

/// `$XDG_DATA_HOME/taskwise`, falling back to `~/.local/share/taskwise`.
pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("taskwise")
}
