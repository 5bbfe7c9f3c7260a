//! Database repository for user management operations.
//!
//! The single shared mutable resource of the identity core. All mutations
//! are single-record updates by id; refresh-token rotation uses a
//! compare-and-swap on the previous value so concurrent rotations of the
//! same token cannot both succeed.

use crate::database::models::{CreateUser, User};
use crate::errors::{ServiceError, ServiceResult};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Repository for user database operations.
pub struct UserRepository<'a> {
    /// Shared SQLite connection pool
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Creates a new UserRepository instance.
    ///
    /// # Arguments
    /// * `pool` - Reference to SQLite connection pool
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a new user in the database.
    ///
    /// The unique-email constraint is authoritative: a concurrent duplicate
    /// registration that slips past the caller's existence check still
    /// surfaces as a `Conflict`, not a store failure.
    ///
    /// # Arguments
    /// * `user` - CreateUser DTO containing user details
    ///
    /// # Returns
    /// The newly created User with all fields populated
    pub async fn create_user(&self, user: CreateUser) -> ServiceResult<User> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, phone, password_hash, role, terms_accepted, remember_me, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.terms_accepted)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ServiceError::conflict("Email is already registered")
            }
            _ => ServiceError::Database { source: e.into() },
        })?;

        Ok(created)
    }

    /// Retrieves a user by their unique identifier.
    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(user)
    }

    /// Retrieves a user by their email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool)
            .await?;

        Ok(user)
    }

    /// Retrieves the user currently holding a refresh token value, if any.
    ///
    /// A presented refresh token is only valid while it matches this column;
    /// logout and rotation both make the old value unmatchable.
    pub async fn get_user_by_refresh_token(&self, refresh_token: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE refresh_token = ?")
            .bind(refresh_token)
            .fetch_optional(self.pool)
            .await?;

        Ok(user)
    }

    /// Checks if an email already exists in the system.
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
                .bind(email)
                .fetch_one(self.pool)
                .await?;

        Ok(count > 0)
    }

    /// Opens a fresh session on login: stores the new refresh token and the
    /// remember-me choice, and clears any stale recovery challenge.
    pub async fn open_session(
        &self,
        user_id: &str,
        refresh_token: &str,
        remember_me: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = ?,
                remember_me = ?,
                forgot_password_otp = NULL,
                forgot_password_otp_expiry = NULL,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(refresh_token)
        .bind(remember_me)
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Replaces the stored refresh token only if it still matches the value
    /// being rotated away.
    ///
    /// # Returns
    /// `true` if the swap happened; `false` if another call already rotated
    /// or cleared the token.
    pub async fn rotate_refresh_token(
        &self,
        user_id: &str,
        old_token: &str,
        new_token: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = ?, updated_at = ? WHERE id = ? AND refresh_token = ?",
        )
        .bind(new_token)
        .bind(Utc::now())
        .bind(user_id)
        .bind(old_token)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Clears the stored refresh token. Safe to call repeatedly.
    pub async fn clear_refresh_token(&self, user_id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET refresh_token = NULL, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Stores a recovery challenge, overwriting any outstanding one.
    pub async fn set_recovery_otp(
        &self,
        user_id: &str,
        code: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET forgot_password_otp = ?,
                forgot_password_otp_expiry = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(code)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Replaces the password digest and invalidates the recovery challenge.
    /// The sole point where the OTP columns are cleared.
    pub async fn update_password_and_clear_otp(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?,
                forgot_password_otp = NULL,
                forgot_password_otp_expiry = NULL,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Sets the free-form account status flag.
    pub async fn set_status(&self, user_id: &str, status: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET status = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{CreateUser, Role};
    use crate::database::test_pool;
    use chrono::Duration;

    fn sample_user(id: &str, email: &str) -> CreateUser {
        CreateUser {
            id: id.to_string(),
            username: "alice".to_string(),
            email: email.to_string(),
            phone: "0501234567".to_string(),
            password_hash: "digest".to_string(),
            role: Role::User,
            terms_accepted: true,
        }
    }

    #[tokio::test]
    async fn create_and_fetch_by_email() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);

        let created = repo
            .create_user(sample_user("u1", "alice@x.com"))
            .await
            .expect("create user");
        assert_eq!(created.role, Role::User);
        assert!(created.refresh_token.is_none());

        let found = repo
            .get_user_by_email("alice@x.com")
            .await
            .expect("query")
            .expect("user exists");
        assert_eq!(found.id, "u1");
        assert!(repo.email_exists("alice@x.com").await.expect("query"));
        assert!(!repo.email_exists("bob@x.com").await.expect("query"));
    }

    #[tokio::test]
    async fn rotation_is_compare_and_swap() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);
        repo.create_user(sample_user("u1", "alice@x.com"))
            .await
            .expect("create user");

        repo.open_session("u1", "token-a", false)
            .await
            .expect("open session");

        assert!(repo
            .rotate_refresh_token("u1", "token-a", "token-b")
            .await
            .expect("rotate"));
        // The superseded value no longer matches.
        assert!(!repo
            .rotate_refresh_token("u1", "token-a", "token-c")
            .await
            .expect("rotate"));

        let user = repo
            .get_user_by_refresh_token("token-b")
            .await
            .expect("query")
            .expect("holder exists");
        assert_eq!(user.id, "u1");
    }

    #[tokio::test]
    async fn open_session_clears_stale_challenge() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);
        repo.create_user(sample_user("u1", "alice@x.com"))
            .await
            .expect("create user");

        repo.set_recovery_otp("u1", 123456, Utc::now() + Duration::hours(1))
            .await
            .expect("set otp");
        repo.open_session("u1", "token-a", true)
            .await
            .expect("open session");

        let user = repo
            .get_user_by_id("u1")
            .await
            .expect("query")
            .expect("user exists");
        assert!(user.forgot_password_otp.is_none());
        assert!(user.forgot_password_otp_expiry.is_none());
        assert!(user.remember_me);
    }

    #[tokio::test]
    async fn password_update_clears_challenge_unconditionally() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);
        repo.create_user(sample_user("u1", "alice@x.com"))
            .await
            .expect("create user");

        repo.set_recovery_otp("u1", 654321, Utc::now() - Duration::minutes(5))
            .await
            .expect("set otp");
        repo.update_password_and_clear_otp("u1", "new-digest")
            .await
            .expect("update password");

        let user = repo
            .get_user_by_id("u1")
            .await
            .expect("query")
            .expect("user exists");
        assert_eq!(user.password_hash, "new-digest");
        assert!(user.forgot_password_otp.is_none());
        assert!(user.forgot_password_otp_expiry.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_surfaces_as_conflict() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);
        repo.create_user(sample_user("u1", "alice@x.com"))
            .await
            .expect("create user");

        // The constraint itself is what protects racing registrations, so
        // the violation must come back as Conflict, not a store failure.
        let err = repo
            .create_user(sample_user("u2", "alice@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict { .. }));
    }
}
