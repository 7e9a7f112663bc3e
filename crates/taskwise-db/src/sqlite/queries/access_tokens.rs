use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use taskwise_core::user::{AccessToken, User};

use super::super::{SqliteDatabase, SqliteResultExt};
use super::users::fetch_user;
use crate::DbError;

fn row_to_access_token(row: &Row) -> rusqlite::Result<AccessToken> {
    Ok(AccessToken {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
        last_used_at: row.get("last_used_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_access_token_sync(
        &self,
        user_id: i64,
        name: &str,
        token_hash: &str,
    ) -> Result<AccessToken, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO access_tokens (user_id, name, token_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, name, token_hash, Utc::now()],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM access_tokens WHERE id = ?1",
                params![conn.last_insert_rowid()],
                row_to_access_token,
            )
            .to_db()
        })
    }

    /// Resolve a token hash to the token and its owner.
    pub fn find_access_token_sync(
        &self,
        token_hash: &str,
    ) -> Result<Option<(AccessToken, User)>, DbError> {
        self.with_conn(|conn| {
            let token = conn
                .query_row(
                    "SELECT * FROM access_tokens WHERE token_hash = ?1",
                    params![token_hash],
                    row_to_access_token,
                )
                .optional()
                .to_db()?;
            match token {
                Some(token) => {
                    let user = fetch_user(conn, token.user_id)?;
                    Ok(Some((token, user)))
                }
                None => Ok(None),
            }
        })
    }

    pub fn touch_access_token_sync(&self, id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE access_tokens SET last_used_at = ?1 WHERE id = ?2",
                params![Utc::now(), id],
            )
            .to_db()?;
            Ok(())
        })
    }
}
