use chrono::Utc;
use rusqlite::{params, Connection, Row};

use taskwise_core::user::{NewUser, Role, User, UserChanges, UserFilter};

use super::super::{not_found_as, SqliteDatabase, SqliteResultExt};
use super::{like_pattern, Params};
use crate::DbError;

pub(crate) fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    let role_str: String = row.get("role")?;
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        role: Role::parse_str(&role_str).unwrap_or_default(),
        jabatan: row.get("jabatan")?,
        profile_photo_path: row.get("profile_photo_path")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn fetch_user(conn: &Connection, id: i64) -> Result<User, DbError> {
    conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
        .map_err(not_found_as(format!("user {id}")))
}

/// WHERE clause shared by listing and counting.
fn filter_clause(filter: &UserFilter, p: &mut Params) -> String {
    let mut sql = String::from(" WHERE 1=1");
    if let Some(role) = filter.role {
        sql.push_str(&format!(" AND role = {}", p.push(role.as_str().to_string())));
    }
    if let Some(ref search) = filter.search {
        if !search.trim().is_empty() {
            let ph = p.push(like_pattern(search));
            sql.push_str(&format!(
                " AND (name LIKE {ph} ESCAPE '\\' OR email LIKE {ph} ESCAPE '\\')"
            ));
        }
    }
    sql
}

impl SqliteDatabase {
    pub fn create_user_sync(&self, input: &NewUser) -> Result<User, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO users (name, email, password_hash, role, jabatan, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    input.name,
                    input.email,
                    input.password_hash,
                    input.role.as_str(),
                    input.jabatan,
                    now,
                    now,
                ],
            )
            .map_err(|e| match crate::sqlite::map_sqlite_err(e) {
                DbError::Conflict(_) => {
                    DbError::Conflict(format!("email '{}' is already taken", input.email))
                }
                other => other,
            })?;
            fetch_user(conn, conn.last_insert_rowid())
        })
    }

    pub fn get_user_sync(&self, id: i64) -> Result<User, DbError> {
        self.with_conn(|conn| fetch_user(conn, id))
    }

    pub fn find_user_by_email_sync(&self, email: &str) -> Result<Option<User>, DbError> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT * FROM users WHERE email = ?1 COLLATE NOCASE",
                params![email.trim()],
                row_to_user,
            );
            match result {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(DbError::Internal(e.to_string())),
            }
        })
    }

    pub fn get_users_by_ids_sync(&self, ids: &[i64]) -> Result<Vec<User>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let mut p = Params::default();
            let placeholders: Vec<String> = ids.iter().map(|id| p.push(*id)).collect();
            let sql = format!(
                "SELECT * FROM users WHERE id IN ({}) ORDER BY id",
                placeholders.join(", ")
            );
            let mut stmt = conn.prepare(&sql).to_db()?;
            let users = stmt
                .query_map(p.as_refs().as_slice(), row_to_user)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(users)
        })
    }

    pub fn list_users_sync(&self, filter: &UserFilter) -> Result<Vec<User>, DbError> {
        self.with_conn(|conn| {
            let mut p = Params::default();
            let mut sql = String::from("SELECT * FROM users");
            sql.push_str(&filter_clause(filter, &mut p));
            sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC");

            if let Some(limit) = filter.limit {
                sql.push_str(&format!(" LIMIT {}", p.push(limit)));
                if let Some(offset) = filter.offset {
                    sql.push_str(&format!(" OFFSET {}", p.push(offset)));
                }
            }

            let mut stmt = conn.prepare(&sql).to_db()?;
            let users = stmt
                .query_map(p.as_refs().as_slice(), row_to_user)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(users)
        })
    }

    pub fn count_users_sync(&self, filter: &UserFilter) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            let mut p = Params::default();
            let sql = format!("SELECT COUNT(*) FROM users{}", filter_clause(filter, &mut p));
            conn.query_row(&sql, p.as_refs().as_slice(), |row| row.get(0))
                .to_db()
        })
    }

    pub fn update_user_sync(&self, id: i64, changes: &UserChanges) -> Result<User, DbError> {
        self.with_conn(|conn| {
            let mut p = Params::default();
            let mut sets = vec![format!("updated_at = {}", p.push(Utc::now()))];

            if let Some(ref name) = changes.name {
                sets.push(format!("name = {}", p.push(name.clone())));
            }
            if let Some(ref email) = changes.email {
                sets.push(format!("email = {}", p.push(email.clone())));
            }
            if let Some(ref hash) = changes.password_hash {
                sets.push(format!("password_hash = {}", p.push(hash.clone())));
            }
            if let Some(role) = changes.role {
                sets.push(format!("role = {}", p.push(role.as_str().to_string())));
            }
            if let Some(ref jabatan) = changes.jabatan {
                sets.push(format!("jabatan = {}", p.push(jabatan.clone())));
            }
            if let Some(ref photo) = changes.profile_photo_path {
                sets.push(format!("profile_photo_path = {}", p.push(photo.clone())));
            }

            let sql = format!(
                "UPDATE users SET {} WHERE id = {}",
                sets.join(", "),
                p.push(id)
            );
            let changed = conn.execute(&sql, p.as_refs().as_slice()).to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("user {id}")));
            }
            fetch_user(conn, id)
        })
    }

    pub fn delete_user_sync(&self, id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM users WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("user {id}")));
            }
            Ok(())
        })
    }
}
