//! Rust structs that represent database table mappings.
//!
//! These models define the structure of data as it is stored in and retrieved
//! from the database. Note that these may differ from API-specific models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account role stored on the user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Identity record as persisted in the `users` table.
///
/// `password_hash` and `refresh_token` never leave the service layer;
/// API responses carry the sanitized [`crate::auth::models::UserInfo`] instead.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
    pub terms_accepted: bool,
    pub refresh_token: Option<String>,
    pub remember_me: bool,
    pub forgot_password_otp: Option<i64>,
    pub forgot_password_otp_expiry: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert DTO for new user records. The password arrives here already hashed.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
    pub terms_accepted: bool,
}
