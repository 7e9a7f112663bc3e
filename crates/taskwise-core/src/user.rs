use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::serde_ext::double_option;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Employee => "employee",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "employee" => Some(Role::Employee),
            _ => None,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Employee
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user row as stored. Never serialized directly; see `resource::UserResource`.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub jabatan: Option<String>,
    pub profile_photo_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A user row ready for insertion. Carries the hash, never the password.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub jabatan: Option<String>,
}

/// Column-level patch applied by the database layer.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub jabatan: Option<Option<String>>,
    pub profile_photo_path: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Issued at login. Only the SHA-256 of the bearer token is persisted.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Input for creating a user. `password` is plaintext; the server hashes it
/// before it reaches the database layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub jabatan: Option<String>,
}

impl CreateUser {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

/// Admin-side update of any user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub jabatan: Option<Option<String>>,
}

impl UpdateUser {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(ref name) = self.name {
            validate_name(name)?;
        }
        if let Some(ref email) = self.email {
            validate_email(email)?;
        }
        if let Some(ref password) = self.password {
            validate_password(password)?;
        }
        Ok(())
    }
}

/// Self-service profile update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub jabatan: Option<String>,
}

impl UpdateProfile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_email(&self.email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePassword {
    pub current_password: String,
    pub password: String,
    pub password_confirmation: String,
}

impl UpdatePassword {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_password(&self.password)?;
        if self.password != self.password_confirmation {
            return Err(ValidationError::new(
                "password",
                "confirmation does not match",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Listing parameters for `/v1/users`. Without `page` the listing is
/// unpaginated and returns every employee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("name", "must not be empty"));
    }
    if name.chars().count() > 255 {
        return Err(ValidationError::new("name", "must be at most 255 characters"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::new("email", format!("'{email}' is not a valid address"));
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Admin, Role::Employee] {
            assert_eq!(Role::parse_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse_str("manager"), None);
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("budi@example.com").is_ok());
        assert!(validate_email("budi@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("budi example@x.com").is_err());
        assert!(validate_email("budi@@example.com").is_err());
    }

    #[test]
    fn password_confirmation_must_match() {
        let update = UpdatePassword {
            current_password: "old-password".into(),
            password: "new-password".into(),
            password_confirmation: "new-passw0rd".into(),
        };
        let err = update.validate().unwrap_err();
        assert_eq!(err.field, "password");
    }

    #[test]
    fn short_password_rejected() {
        let input = CreateUser {
            name: "Siti".into(),
            email: "siti@example.com".into(),
            password: "short".into(),
            role: Role::Employee,
            jabatan: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn update_user_distinguishes_null_from_absent() {
        let cleared: UpdateUser = serde_json::from_str(r#"{"jabatan": null}"#).unwrap();
        assert_eq!(cleared.jabatan, Some(None));

        let untouched: UpdateUser = serde_json::from_str(r#"{"name": "Ani"}"#).unwrap();
        assert_eq!(untouched.jabatan, None);
    }
}
