//! Core business logic for the session lifecycle.
//!
//! Orchestrates registration, login, refresh-token rotation, and logout over
//! the user repository, the password hasher, and the token issuer. Per user
//! at most one refresh token is live: every login or refresh overwrites the
//! stored value, which unilaterally invalidates any session derived from the
//! previous one.

use crate::auth::models::{LoginRequest, LoginResponse, RefreshResponse, RegisterRequest, UserInfo};
use crate::config::Config;
use crate::database::models::{CreateUser, Role};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::user_repository::UserRepository;
use crate::utils::jwt::JwtUtils;
use crate::utils::password::{hash_password, verify_password};
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

/// Message shared by "unknown email" and the admin allow-list miss, so a
/// caller cannot tell an unlisted admin account apart from no account.
const NOT_REGISTERED: &str = "No account found for this email, please register first";

/// Authentication service for handling the session state machine
pub struct AuthService<'a> {
    pool: &'a SqlitePool,
    jwt_utils: JwtUtils,
    config: Config,
}

impl<'a> AuthService<'a> {
    /// Create a new AuthService instance with configuration from the environment
    pub fn new(pool: &'a SqlitePool) -> ServiceResult<Self> {
        let config = Config::from_env()
            .map_err(|e| ServiceError::internal(format!("Config error: {e}")))?;
        Ok(Self::with_config(pool, config))
    }

    /// Create an AuthService instance from an already-loaded configuration
    pub fn with_config(pool: &'a SqlitePool, config: Config) -> Self {
        let jwt_utils = JwtUtils::from_config(&config);
        AuthService {
            pool,
            jwt_utils,
            config,
        }
    }

    /// Register a new user account.
    ///
    /// Validates the payload, rejects duplicate emails, hashes the password
    /// before it is persisted, and returns the sanitized identity.
    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<UserInfo> {
        request
            .validate()
            .map_err(ServiceError::from_validation_errors)?;

        if !request.terms_accepted {
            return Err(ServiceError::validation(
                "You must accept the terms and conditions",
            ));
        }

        let repo = UserRepository::new(self.pool);
        if repo.email_exists(&request.email).await? {
            return Err(ServiceError::conflict("Email is already registered"));
        }

        let password_hash = hash_password(&request.password)?;

        let user = repo
            .create_user(CreateUser {
                id: Uuid::now_v7().to_string(),
                username: request.username,
                email: request.email,
                phone: request.phone,
                password_hash,
                role: Role::User,
                terms_accepted: request.terms_accepted,
            })
            .await?;

        tracing::info!(user_id = %user.id, "user registered");

        Ok(UserInfo::from(&user))
    }

    /// Authenticate a user and open a session.
    ///
    /// On success a fresh token pair is minted and the new refresh token is
    /// persisted, overwriting any previous one. Stale recovery state is
    /// cleared as part of the same write.
    pub async fn login(&self, request: LoginRequest) -> ServiceResult<LoginResponse> {
        request
            .validate()
            .map_err(ServiceError::from_validation_errors)?;

        let repo = UserRepository::new(self.pool);
        let user = repo
            .get_user_by_email(&request.email)
            .await?
            .ok_or_else(|| ServiceError::not_found(NOT_REGISTERED))?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(ServiceError::forbidden("Incorrect email or password"));
        }

        // An admin account whose email is not on the allow-list answers
        // exactly like an unregistered email.
        if user.role == Role::Admin && !self.config.is_admin_email(&user.email) {
            tracing::warn!(user_id = %user.id, "admin login attempt outside allow-list");
            return Err(ServiceError::not_found(NOT_REGISTERED));
        }

        let access_token = self.jwt_utils.generate_access_token(&user)?;
        let refresh_token = self.jwt_utils.generate_refresh_token(&user.id)?;

        repo.open_session(&user.id, &refresh_token, request.remember_me)
            .await?;

        tracing::info!(user_id = %user.id, "session opened");

        Ok(LoginResponse {
            access_token,
            refresh_token,
            user: UserInfo::from(&user),
            expires_in: self.jwt_utils.access_expires_in_seconds(),
        })
    }

    /// Rotate a presented refresh token into a brand-new pair.
    ///
    /// The presented value must match the stored column (the revocation
    /// check) and carry a valid signature whose subject is the holder. The
    /// swap is conditional on the old value so a concurrent rotation of the
    /// same token cannot also succeed.
    pub async fn refresh(&self, presented: Option<String>) -> ServiceResult<RefreshResponse> {
        let presented =
            presented.ok_or_else(|| ServiceError::unauthorized("No refresh token provided"))?;

        let repo = UserRepository::new(self.pool);
        let user = repo
            .get_user_by_refresh_token(&presented)
            .await?
            .ok_or_else(|| ServiceError::forbidden("Refresh token is no longer valid"))?;

        let claims = self.jwt_utils.verify_refresh(&presented).map_err(|e| {
            tracing::warn!(user_id = %user.id, error = %e, "refresh token rejected");
            ServiceError::forbidden("Invalid refresh token")
        })?;

        if claims.sub != user.id {
            tracing::warn!(user_id = %user.id, "refresh token subject does not match holder");
            return Err(ServiceError::forbidden("Invalid refresh token"));
        }

        let access_token = self.jwt_utils.generate_access_token(&user)?;
        let refresh_token = self.jwt_utils.generate_refresh_token(&user.id)?;

        let rotated = repo
            .rotate_refresh_token(&user.id, &presented, &refresh_token)
            .await?;
        if !rotated {
            return Err(ServiceError::forbidden("Refresh token is no longer valid"));
        }

        Ok(RefreshResponse {
            access_token,
            refresh_token,
            expires_in: self.jwt_utils.access_expires_in_seconds(),
            remember_me: user.remember_me,
        })
    }

    /// Close the session by clearing the stored refresh token. Idempotent.
    pub async fn logout(&self, user_id: &str) -> ServiceResult<()> {
        let repo = UserRepository::new(self.pool);
        repo.clear_refresh_token(user_id).await?;
        tracing::info!(user_id = %user_id, "session closed");
        Ok(())
    }
}
