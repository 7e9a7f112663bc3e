use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use taskwise_core::journal::{
    CreateJournalNote, JournalDaySummary, JournalEntry, JournalNote, Mood, UpdateJournalNote,
};

use super::super::{not_found_as, SqliteDatabase, SqliteResultExt};
use super::Params;
use crate::DbError;

fn row_to_entry(row: &Row) -> rusqlite::Result<JournalEntry> {
    let mood_str: Option<String> = row.get("mood")?;
    Ok(JournalEntry {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        entry_date: row.get("entry_date")?,
        mood: mood_str.and_then(|s| Mood::parse_str(&s)),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_note(row: &Row) -> rusqlite::Result<JournalNote> {
    Ok(JournalNote {
        id: row.get("id")?,
        journal_entry_id: row.get("journal_entry_id")?,
        title: row.get("title")?,
        color: row.get("color")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn fetch_entry(conn: &Connection, user_id: i64, date: NaiveDate) -> rusqlite::Result<JournalEntry> {
    conn.query_row(
        "SELECT * FROM journal_entries WHERE user_id = ?1 AND entry_date = ?2",
        params![user_id, date],
        row_to_entry,
    )
}

/// Return the entry for the day, creating an empty one if needed.
fn ensure_entry(conn: &Connection, user_id: i64, date: NaiveDate) -> Result<JournalEntry, DbError> {
    let now = Utc::now();
    conn.execute(
        "INSERT OR IGNORE INTO journal_entries (user_id, entry_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![user_id, date, now, now],
    )
    .to_db()?;
    fetch_entry(conn, user_id, date).to_db()
}

/// A note, provided it belongs to one of `user_id`'s entries.
fn fetch_owned_note(conn: &Connection, user_id: i64, id: i64) -> Result<JournalNote, DbError> {
    conn.query_row(
        "SELECT n.* FROM journal_notes n
         JOIN journal_entries e ON e.id = n.journal_entry_id
         WHERE n.id = ?1 AND e.user_id = ?2",
        params![id, user_id],
        row_to_note,
    )
    .map_err(not_found_as(format!("journal note {id}")))
}

fn normalize_title(title: Option<&str>) -> Option<String> {
    title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

impl SqliteDatabase {
    pub fn get_journal_entry_sync(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Option<JournalEntry>, DbError> {
        self.with_conn(|conn| fetch_entry(conn, user_id, date).optional().to_db())
    }

    /// Upsert the day's entry with the given mood. `None` clears it.
    pub fn set_journal_mood_sync(
        &self,
        user_id: i64,
        date: NaiveDate,
        mood: Option<Mood>,
    ) -> Result<JournalEntry, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO journal_entries (user_id, entry_date, mood, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id, entry_date)
                 DO UPDATE SET mood = excluded.mood, updated_at = excluded.updated_at",
                params![user_id, date, mood.map(|m| m.as_str()), now, now],
            )
            .to_db()?;
            fetch_entry(conn, user_id, date).to_db()
        })
    }

    /// Days in `[first, last]` that carry a mood or at least one note.
    pub fn journal_month_sync(
        &self,
        user_id: i64,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<Vec<JournalDaySummary>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT e.entry_date, e.mood, COUNT(n.id) AS notes_count
                     FROM journal_entries e
                     LEFT JOIN journal_notes n ON n.journal_entry_id = e.id
                     WHERE e.user_id = ?1 AND e.entry_date BETWEEN ?2 AND ?3
                     GROUP BY e.id
                     HAVING e.mood IS NOT NULL OR COUNT(n.id) > 0
                     ORDER BY e.entry_date ASC",
                )
                .to_db()?;
            let days = stmt
                .query_map(params![user_id, first, last], |row| {
                    let mood_str: Option<String> = row.get("mood")?;
                    Ok(JournalDaySummary {
                        date: row.get("entry_date")?,
                        mood: mood_str.and_then(|s| Mood::parse_str(&s)),
                        notes_count: row.get("notes_count")?,
                    })
                })
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(days)
        })
    }

    /// Oldest first.
    pub fn list_journal_notes_sync(&self, entry_id: i64) -> Result<Vec<JournalNote>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM journal_notes WHERE journal_entry_id = ?1
                     ORDER BY created_at ASC, id ASC",
                )
                .to_db()?;
            let notes = stmt
                .query_map(params![entry_id], row_to_note)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(notes)
        })
    }

    pub fn create_journal_note_sync(
        &self,
        user_id: i64,
        input: &CreateJournalNote,
    ) -> Result<JournalNote, DbError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().to_db()?;
            let entry = ensure_entry(&tx, user_id, input.entry_date)?;
            let now = Utc::now();
            tx.execute(
                "INSERT INTO journal_notes (journal_entry_id, title, color, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id,
                    normalize_title(input.title.as_deref()),
                    input.color_or_default(),
                    input.content,
                    now,
                    now,
                ],
            )
            .to_db()?;
            let note = tx
                .query_row(
                    "SELECT * FROM journal_notes WHERE id = ?1",
                    params![tx.last_insert_rowid()],
                    row_to_note,
                )
                .to_db()?;
            tx.commit().to_db()?;
            Ok(note)
        })
    }

    pub fn update_journal_note_sync(
        &self,
        user_id: i64,
        id: i64,
        update: &UpdateJournalNote,
    ) -> Result<JournalNote, DbError> {
        self.with_conn(|conn| {
            fetch_owned_note(conn, user_id, id)?;

            let mut p = Params::default();
            let mut sets = vec![format!("updated_at = {}", p.push(Utc::now()))];
            if let Some(ref title) = update.title {
                sets.push(format!(
                    "title = {}",
                    p.push(normalize_title(title.as_deref()))
                ));
            }
            if let Some(ref color) = update.color {
                sets.push(format!("color = {}", p.push(color.trim().to_string())));
            }
            if let Some(ref content) = update.content {
                sets.push(format!("content = {}", p.push(content.clone())));
            }

            let sql = format!(
                "UPDATE journal_notes SET {} WHERE id = {}",
                sets.join(", "),
                p.push(id)
            );
            conn.execute(&sql, p.as_refs().as_slice()).to_db()?;
            fetch_owned_note(conn, user_id, id)
        })
    }

    pub fn delete_journal_note_sync(&self, user_id: i64, id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            fetch_owned_note(conn, user_id, id)?;
            conn.execute("DELETE FROM journal_notes WHERE id = ?1", params![id])
                .to_db()?;
            Ok(())
        })
    }
}
