//! Password recovery business logic.
//!
//! Three independently callable steps: request a one-time code, verify it,
//! and reset the password. Verification does not consume the challenge;
//! only the reset does, and it does so unconditionally. A code is
//! meaningful only while its expiry is in the future, and issuing a new one
//! overwrites any outstanding challenge.

use crate::auth::models::{
    ForgotPasswordRequest, ForgotPasswordResponse, ResetPasswordRequest, UserInfo,
    VerifyOtpRequest,
};
use crate::config::Config;
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::user_repository::UserRepository;
use crate::services::email_service::{EmailService, OtpMailer};
use crate::utils::otp::{OtpGenerator, RandomOtp};
use crate::utils::password::hash_password;
use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

pub struct RecoveryService<'a> {
    /// Shared database connection pool
    pool: &'a SqlitePool,
    /// Source of one-time codes
    otp_generator: Box<dyn OtpGenerator>,
    /// Email collaborator; recovery still works when dispatch is unavailable
    mailer: Option<Box<dyn OtpMailer>>,
}

impl<'a> RecoveryService<'a> {
    /// Creates a new RecoveryService instance.
    ///
    /// # Arguments
    /// * `pool` - Reference to SQLite connection pool
    /// * `config` - Application configuration (SMTP block optional)
    pub fn new(pool: &'a SqlitePool, config: &Config) -> Self {
        let mailer: Option<Box<dyn OtpMailer>> = match config.email_config() {
            Some(email_config) => match EmailService::new(email_config) {
                Ok(service) => Some(Box::new(service)),
                Err(e) => {
                    tracing::warn!(
                        "Failed to initialize email service: {}. Recovery emails will be disabled.",
                        e
                    );
                    None
                }
            },
            None => {
                tracing::warn!(
                    "Email configuration not found. Recovery emails will be disabled."
                );
                None
            }
        };

        Self {
            pool,
            otp_generator: Box::new(RandomOtp),
            mailer,
        }
    }

    /// Creates a RecoveryService with explicit collaborators, for tests.
    pub fn with_parts(
        pool: &'a SqlitePool,
        otp_generator: Box<dyn OtpGenerator>,
        mailer: Option<Box<dyn OtpMailer>>,
    ) -> Self {
        Self {
            pool,
            otp_generator,
            mailer,
        }
    }

    /// Issue a recovery challenge for the account behind an email.
    ///
    /// Overwrites any prior outstanding challenge. A failed email dispatch
    /// is logged but does not roll back the stored challenge; the code is
    /// also returned in the response payload.
    pub async fn request_reset(
        &self,
        request: ForgotPasswordRequest,
    ) -> ServiceResult<ForgotPasswordResponse> {
        request
            .validate()
            .map_err(ServiceError::from_validation_errors)?;

        let repo = UserRepository::new(self.pool);
        let user = repo
            .get_user_by_email(&request.email)
            .await?
            .ok_or_else(|| ServiceError::not_found("No account found for this email"))?;

        let challenge = self.otp_generator.generate();
        repo.set_recovery_otp(&user.id, challenge.code as i64, challenge.expires_at)
            .await?;

        match &self.mailer {
            Some(mailer) => {
                if let Err(e) = mailer
                    .send_otp_email(&user.email, &user.username, challenge.code, challenge.expires_at)
                    .await
                {
                    // The challenge stays valid; the caller already has the code.
                    tracing::warn!(user_id = %user.id, error = %e, "failed to send recovery email");
                }
            }
            None => {
                tracing::warn!(user_id = %user.id, "recovery email skipped, mailer disabled");
            }
        }

        Ok(ForgotPasswordResponse {
            user: UserInfo::from(&user),
            otp: challenge.code,
            otp_expiry_time: challenge.expires_at,
        })
    }

    /// Check a submitted code against the outstanding challenge.
    ///
    /// Equality is checked before expiry: a wrong code always gets the
    /// generic message, while a correct-but-expired code reports the expiry
    /// instant. Success does not consume the challenge.
    pub async fn verify_otp(&self, request: VerifyOtpRequest) -> ServiceResult<UserInfo> {
        request
            .validate()
            .map_err(ServiceError::from_validation_errors)?;

        let repo = UserRepository::new(self.pool);
        let user = repo
            .get_user_by_email(&request.email)
            .await?
            .ok_or_else(|| ServiceError::not_found("No account found for this email"))?;

        let stored_code = user
            .forgot_password_otp
            .ok_or_else(|| ServiceError::validation("Invalid OTP"))?;

        let submitted = request
            .otp
            .trim()
            .parse::<i64>()
            .map_err(|_| ServiceError::validation("Invalid OTP"))?;

        if submitted != stored_code {
            return Err(ServiceError::validation("Invalid OTP"));
        }

        let expires_at = user
            .forgot_password_otp_expiry
            .ok_or_else(|| ServiceError::validation("Invalid OTP"))?;

        if Utc::now() > expires_at {
            return Err(ServiceError::validation(format!(
                "OTP expired at {}",
                expires_at.to_rfc3339()
            )));
        }

        Ok(UserInfo::from(&user))
    }

    /// Replace the account password and invalidate the challenge.
    ///
    /// Both OTP columns are cleared regardless of their prior state. The
    /// calling surface is expected to have required a successful
    /// verification first; this operation does not re-check it.
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> ServiceResult<UserInfo> {
        request
            .validate()
            .map_err(ServiceError::from_validation_errors)?;

        if request.new_password != request.confirm_password {
            return Err(ServiceError::validation("Passwords do not match"));
        }

        let repo = UserRepository::new(self.pool);
        let user = repo
            .get_user_by_email(&request.email)
            .await?
            .ok_or_else(|| ServiceError::not_found("No account found for this email"))?;

        let password_hash = hash_password(&request.new_password)?;
        repo.update_password_and_clear_otp(&user.id, &password_hash)
            .await?;

        tracing::info!(user_id = %user.id, "password reset completed");

        let updated = repo
            .get_user_by_id(&user.id)
            .await?
            .ok_or_else(|| ServiceError::internal("User disappeared during password reset"))?;

        Ok(UserInfo::from(&updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::{LoginRequest, RegisterRequest};
    use crate::auth::service::AuthService;
    use crate::database::test_pool;
    use crate::utils::otp::FixedOtp;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};

    /// Mailer that records nothing and always succeeds.
    struct NullMailer;

    #[async_trait]
    impl OtpMailer for NullMailer {
        async fn send_otp_email(
            &self,
            _recipient_email: &str,
            _recipient_name: &str,
            _code: u32,
            _expires_at: DateTime<Utc>,
        ) -> ServiceResult<()> {
            Ok(())
        }
    }

    /// Mailer that always fails, to prove dispatch errors are swallowed.
    struct BrokenMailer;

    #[async_trait]
    impl OtpMailer for BrokenMailer {
        async fn send_otp_email(
            &self,
            _recipient_email: &str,
            _recipient_name: &str,
            _code: u32,
            _expires_at: DateTime<Utc>,
        ) -> ServiceResult<()> {
            Err(ServiceError::external_service("SMTP unreachable"))
        }
    }

    async fn register_alice(pool: &SqlitePool) {
        let auth = AuthService::with_config(pool, Config::test_defaults());
        auth.register(RegisterRequest {
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            phone: "0501234567".to_string(),
            password: "secret1".to_string(),
            terms_accepted: true,
        })
        .await
        .expect("register");
    }

    fn fixed_service<'a>(pool: &'a SqlitePool, code: u32, expires_at: DateTime<Utc>) -> RecoveryService<'a> {
        RecoveryService::with_parts(
            pool,
            Box::new(FixedOtp { code, expires_at }),
            Some(Box::new(NullMailer)),
        )
    }

    fn forgot(email: &str) -> ForgotPasswordRequest {
        ForgotPasswordRequest {
            email: email.to_string(),
        }
    }

    fn verify(email: &str, otp: &str) -> VerifyOtpRequest {
        VerifyOtpRequest {
            email: email.to_string(),
            otp: otp.to_string(),
        }
    }

    fn reset(email: &str, new: &str, confirm: &str) -> ResetPasswordRequest {
        ResetPasswordRequest {
            email: email.to_string(),
            new_password: new.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[tokio::test]
    async fn full_recovery_flow_replaces_password() {
        let pool = test_pool().await;
        register_alice(&pool).await;
        let expires_at = Utc::now() + Duration::hours(1);
        let service = fixed_service(&pool, 123_456, expires_at);

        let response = service
            .request_reset(forgot("alice@x.com"))
            .await
            .expect("request reset");
        assert_eq!(response.otp, 123_456);
        assert_eq!(response.otp_expiry_time, expires_at);

        service
            .verify_otp(verify("alice@x.com", "123456"))
            .await
            .expect("verify otp");

        service
            .reset_password(reset("alice@x.com", "newpass", "newpass"))
            .await
            .expect("reset password");

        // Old credentials no longer work, new ones do.
        let auth = AuthService::with_config(&pool, Config::test_defaults());
        let err = auth
            .login(LoginRequest {
                email: "alice@x.com".to_string(),
                password: "secret1".to_string(),
                remember_me: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden { .. }));

        auth.login(LoginRequest {
            email: "alice@x.com".to_string(),
            password: "newpass".to_string(),
            remember_me: false,
        })
        .await
        .expect("login with new password");
    }

    #[tokio::test]
    async fn unknown_email_is_not_found_at_every_step() {
        let pool = test_pool().await;
        let service = fixed_service(&pool, 123_456, Utc::now() + Duration::hours(1));

        assert!(matches!(
            service.request_reset(forgot("nobody@x.com")).await.unwrap_err(),
            ServiceError::NotFound { .. }
        ));
        assert!(matches!(
            service.verify_otp(verify("nobody@x.com", "123456")).await.unwrap_err(),
            ServiceError::NotFound { .. }
        ));
        assert!(matches!(
            service
                .reset_password(reset("nobody@x.com", "newpass", "newpass"))
                .await
                .unwrap_err(),
            ServiceError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn wrong_code_gets_generic_message_even_when_expired() {
        let pool = test_pool().await;
        register_alice(&pool).await;
        let service = fixed_service(&pool, 123_456, Utc::now() - Duration::minutes(5));
        service
            .request_reset(forgot("alice@x.com"))
            .await
            .expect("request reset");

        let err = service
            .verify_otp(verify("alice@x.com", "654321"))
            .await
            .unwrap_err();
        let ServiceError::Validation { message } = err else {
            panic!("expected Validation, got {err:?}");
        };
        assert_eq!(message, "Invalid OTP");
    }

    #[tokio::test]
    async fn correct_but_expired_code_reports_expiry_instant() {
        let pool = test_pool().await;
        register_alice(&pool).await;
        let expires_at = Utc::now() - Duration::minutes(5);
        let service = fixed_service(&pool, 123_456, expires_at);
        service
            .request_reset(forgot("alice@x.com"))
            .await
            .expect("request reset");

        let err = service
            .verify_otp(verify("alice@x.com", "123456"))
            .await
            .unwrap_err();
        let ServiceError::Validation { message } = err else {
            panic!("expected Validation, got {err:?}");
        };
        assert!(message.starts_with("OTP expired at"));
        assert!(message.contains(&expires_at.to_rfc3339()));
    }

    #[tokio::test]
    async fn verification_does_not_consume_the_challenge() {
        let pool = test_pool().await;
        register_alice(&pool).await;
        let service = fixed_service(&pool, 123_456, Utc::now() + Duration::hours(1));
        service
            .request_reset(forgot("alice@x.com"))
            .await
            .expect("request reset");

        service
            .verify_otp(verify("alice@x.com", "123456"))
            .await
            .expect("first verification");
        service
            .verify_otp(verify("alice@x.com", "123456"))
            .await
            .expect("second verification within the window");
    }

    #[tokio::test]
    async fn reset_clears_otp_state_regardless_of_prior_state() {
        let pool = test_pool().await;
        register_alice(&pool).await;
        let service = fixed_service(&pool, 123_456, Utc::now() + Duration::hours(1));
        service
            .request_reset(forgot("alice@x.com"))
            .await
            .expect("request reset");

        service
            .reset_password(reset("alice@x.com", "newpass", "newpass"))
            .await
            .expect("reset password");

        let user = UserRepository::new(&pool)
            .get_user_by_email("alice@x.com")
            .await
            .expect("query")
            .expect("user exists");
        assert!(user.forgot_password_otp.is_none());
        assert!(user.forgot_password_otp_expiry.is_none());

        // The consumed challenge cannot be verified again.
        let err = service
            .verify_otp(verify("alice@x.com", "123456"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn mismatched_confirmation_is_rejected_before_any_write() {
        let pool = test_pool().await;
        register_alice(&pool).await;
        let service = fixed_service(&pool, 123_456, Utc::now() + Duration::hours(1));
        service
            .request_reset(forgot("alice@x.com"))
            .await
            .expect("request reset");

        let err = service
            .reset_password(reset("alice@x.com", "newpass", "different"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));

        // Challenge untouched by the failed attempt.
        let user = UserRepository::new(&pool)
            .get_user_by_email("alice@x.com")
            .await
            .expect("query")
            .expect("user exists");
        assert_eq!(user.forgot_password_otp, Some(123_456));
    }

    #[tokio::test]
    async fn new_request_supersedes_outstanding_challenge() {
        let pool = test_pool().await;
        register_alice(&pool).await;
        let first = fixed_service(&pool, 111_111, Utc::now() + Duration::hours(1));
        first
            .request_reset(forgot("alice@x.com"))
            .await
            .expect("first request");

        let second = fixed_service(&pool, 222_222, Utc::now() + Duration::hours(1));
        second
            .request_reset(forgot("alice@x.com"))
            .await
            .expect("second request");

        assert!(matches!(
            second.verify_otp(verify("alice@x.com", "111111")).await.unwrap_err(),
            ServiceError::Validation { .. }
        ));
        second
            .verify_otp(verify("alice@x.com", "222222"))
            .await
            .expect("latest challenge verifies");
    }

    #[tokio::test]
    async fn failed_email_dispatch_keeps_the_challenge() {
        let pool = test_pool().await;
        register_alice(&pool).await;
        let service = RecoveryService::with_parts(
            &pool,
            Box::new(FixedOtp {
                code: 123_456,
                expires_at: Utc::now() + Duration::hours(1),
            }),
            Some(Box::new(BrokenMailer)),
        );

        let response = service
            .request_reset(forgot("alice@x.com"))
            .await
            .expect("request succeeds despite mailer failure");
        assert_eq!(response.otp, 123_456);

        service
            .verify_otp(verify("alice@x.com", "123456"))
            .await
            .expect("challenge remains valid");
    }
}
