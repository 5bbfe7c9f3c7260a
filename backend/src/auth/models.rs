//! Data structures for authentication-related entities.
//!
//! This module defines the request and response payloads for the session
//! and recovery flows. Every response carries the sanitized identity only;
//! password and refresh-token fields never appear here.

use crate::database::models::{Role, User};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

lazy_static! {
    /// Regional mobile numbering plan: ten digits with an 05 prefix.
    static ref PHONE_RE: Regex = Regex::new(r"^05\d{8}$").unwrap();
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        let mut error = ValidationError::new("phone");
        error.message = Some("Must be a valid mobile number".into());
        Err(error)
    }
}

/// Registration request payload
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 3, message = "Username must be at least 3 characters"))]
    pub username: String,

    #[validate(email(message = "Must be a valid email"))]
    pub email: String,

    #[validate(custom(function = validate_phone))]
    pub phone: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[serde(default)]
    pub terms_accepted: bool,
}

/// Login request payload
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[serde(default)]
    pub remember_me: bool,
}

/// Login response containing tokens and user info
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserInfo,
    /// Signed access-token lifetime in seconds
    pub expires_in: u64,
}

/// Token refresh response; both cookies are re-set alongside this payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    /// Cookie-lifetime selector for the transport layer; not part of the payload.
    #[serde(skip)]
    pub remember_me: bool,
}

/// Forgot-password request payload
#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,
}

/// Forgot-password response. The code is returned in the body in addition
/// to being emailed; an intentional operational trade-off.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub user: UserInfo,
    pub otp: u32,
    pub otp_expiry_time: DateTime<Utc>,
}

/// OTP verification request payload
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "OTP is required"))]
    pub otp: String,
}

/// Password reset request payload
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,

    #[validate(length(min = 1, message = "Password confirmation is required"))]
    pub confirm_password: String,
}

/// Operator status-change request payload
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1, message = "User id is required"))]
    pub user_id: String,

    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

/// Sanitized identity returned by every endpoint and attached by the gate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub status: Option<String>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        UserInfo {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role,
            status: user.status.clone(),
        }
    }
}
