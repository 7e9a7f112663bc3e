use rusqlite::{params, Connection};
use tracing::info;

use super::SqliteResultExt;
use crate::DbError;

/// A reversible schema step. `down` must leave the schema exactly as it was
/// before `up` ran.
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users_table",
        up: "
            CREATE TABLE users (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                name               TEXT NOT NULL,
                email              TEXT NOT NULL UNIQUE,
                password_hash      TEXT NOT NULL,
                role               TEXT NOT NULL DEFAULT 'employee'
                                       CHECK(role IN ('admin', 'employee')),
                jabatan            TEXT,
                profile_photo_path TEXT,
                created_at         TEXT NOT NULL,
                updated_at         TEXT NOT NULL
            );

            CREATE TABLE access_tokens (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id      INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name         TEXT NOT NULL DEFAULT '',
                token_hash   TEXT NOT NULL UNIQUE,
                created_at   TEXT NOT NULL,
                last_used_at TEXT
            );
            CREATE INDEX idx_access_tokens_user ON access_tokens(user_id);
        ",
        down: "
            DROP TABLE access_tokens;
            DROP TABLE users;
        ",
    },
    Migration {
        version: 2,
        name: "create_tasks_tables",
        up: "
            CREATE TABLE tasks (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                title       TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status      TEXT NOT NULL DEFAULT 'todo'
                                CHECK(status IN ('todo', 'in_progress', 'review', 'done')),
                priority    TEXT NOT NULL DEFAULT 'medium'
                                CHECK(priority IN ('low', 'medium', 'high')),
                progress    INTEGER NOT NULL DEFAULT 0
                                CHECK(progress BETWEEN 0 AND 100),
                due_date    TEXT,
                assignee_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                creator_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );
            CREATE INDEX idx_tasks_assignee ON tasks(assignee_id);
            CREATE INDEX idx_tasks_creator  ON tasks(creator_id);
            CREATE INDEX idx_tasks_status   ON tasks(status);

            CREATE TABLE task_attachments (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id       INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                user_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                type          TEXT NOT NULL CHECK(type IN ('image', 'file', 'link')),
                original_name TEXT,
                path          TEXT,
                url           TEXT,
                mime_type     TEXT,
                size_bytes    INTEGER NOT NULL DEFAULT 0,
                created_at    TEXT NOT NULL
            );
            CREATE INDEX idx_task_attachments_task ON task_attachments(task_id);

            CREATE TABLE task_comments (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id    INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                user_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                body       TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX idx_task_comments_task ON task_comments(task_id);

            CREATE TABLE task_activities (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id     INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                action      TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created_at  TEXT NOT NULL
            );
            CREATE INDEX idx_task_activities_task ON task_activities(task_id);
        ",
        down: "
            DROP TABLE task_activities;
            DROP TABLE task_comments;
            DROP TABLE task_attachments;
            DROP TABLE tasks;
        ",
    },
    Migration {
        version: 3,
        name: "create_journal_tables",
        up: "
            CREATE TABLE journal_entries (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                entry_date TEXT NOT NULL,
                mood       TEXT CHECK(mood IN ('great', 'good', 'okay', 'bad', 'awful')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, entry_date)
            );

            CREATE TABLE journal_notes (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                journal_entry_id INTEGER NOT NULL REFERENCES journal_entries(id) ON DELETE CASCADE,
                title            TEXT,
                content          TEXT NOT NULL,
                created_at       TEXT NOT NULL,
                updated_at       TEXT NOT NULL
            );
            CREATE INDEX idx_journal_notes_entry ON journal_notes(journal_entry_id);
        ",
        down: "
            DROP TABLE journal_notes;
            DROP TABLE journal_entries;
        ",
    },
    // SQLite appends new columns; there is no AFTER clause.
    Migration {
        version: 4,
        name: "add_color_to_journal_notes_table",
        up: "ALTER TABLE journal_notes ADD COLUMN color TEXT NOT NULL DEFAULT 'default';",
        down: "ALTER TABLE journal_notes DROP COLUMN color;",
    },
];

pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

fn ensure_version_table(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )
    .to_db()
}

pub fn current_version(conn: &Connection) -> Result<i64, DbError> {
    ensure_version_table(conn)?;
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )
    .to_db()
}

/// Bring the schema up to the newest version.
pub fn run(conn: &Connection) -> Result<(), DbError> {
    migrate_to(conn, latest_version())
}

/// Apply pending migrations up to and including `target`.
pub fn migrate_to(conn: &Connection, target: i64) -> Result<(), DbError> {
    let current = current_version(conn)?;
    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > current && m.version <= target)
    {
        let tx = conn.unchecked_transaction().to_db()?;
        tx.execute_batch(migration.up).to_db()?;
        tx.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
            params![migration.version],
        )
        .to_db()?;
        tx.commit().to_db()?;
        info!(version = migration.version, name = migration.name, "applied migration");
    }
    Ok(())
}

/// Revert applied migrations, newest first, until the schema is at `target`.
pub fn rollback_to(conn: &Connection, target: i64) -> Result<(), DbError> {
    if target < 0 {
        return Err(DbError::InvalidInput(format!(
            "cannot roll back to version {target}"
        )));
    }
    let current = current_version(conn)?;
    for migration in MIGRATIONS
        .iter()
        .rev()
        .filter(|m| m.version <= current && m.version > target)
    {
        let tx = conn.unchecked_transaction().to_db()?;
        tx.execute_batch(migration.down).to_db()?;
        tx.execute(
            "DELETE FROM schema_version WHERE version = ?1",
            params![migration.version],
        )
        .to_db()?;
        tx.commit().to_db()?;
        info!(version = migration.version, name = migration.name, "rolled back migration");
    }
    Ok(())
}
