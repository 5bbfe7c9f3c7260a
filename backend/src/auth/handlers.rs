//! Handler functions for authentication-related API endpoints.
//!
//! These functions process incoming HTTP requests for the session lifecycle
//! (register, login, refresh, logout) and the password recovery flow, parse
//! request data, and interact with the `auth::service` and
//! `services::recovery_service` for core business logic. The token pair is
//! returned both in the JSON payload and as hardened cookies.

use crate::api::common::{ApiResponse, service_error_to_http};
use crate::auth::models::*;
use crate::auth::service::AuthService;
use crate::config::Config;
use crate::services::recovery_service::RecoveryService;
use crate::utils::cookies::{
    ACCESS_COOKIE, REFRESH_COOKIE, SessionCookie, cookie_lifetime_seconds, read_bearer,
    read_cookie,
};
use axum::{
    extract::{Extension, Json},
    http::{HeaderMap, HeaderName, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, Json as ResponseJson},
};
use sqlx::SqlitePool;

type CookieHeaders = AppendHeaders<[(HeaderName, String); 2]>;

/// Both session cookies for a freshly minted token pair.
fn session_cookies(access_token: &str, refresh_token: &str, remember_me: bool) -> CookieHeaders {
    let max_age = cookie_lifetime_seconds(remember_me);
    AppendHeaders([
        (
            SET_COOKIE,
            SessionCookie::new(ACCESS_COOKIE, access_token, max_age).header_value(),
        ),
        (
            SET_COOKIE,
            SessionCookie::new(REFRESH_COOKIE, refresh_token, max_age).header_value(),
        ),
    ])
}

/// Cookie pair instructing the client to drop both tokens.
fn clear_session_cookies() -> CookieHeaders {
    AppendHeaders([
        (SET_COOKIE, SessionCookie::expired(ACCESS_COOKIE).header_value()),
        (SET_COOKIE, SessionCookie::expired(REFRESH_COOKIE).header_value()),
    ])
}

/// Handle user registration request
#[axum::debug_handler]
pub async fn register(
    Extension(pool): Extension<SqlitePool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<UserInfo>>), (StatusCode, String)> {
    let auth_service = match AuthService::new(&pool) {
        Ok(service) => service,
        Err(error) => return Err(service_error_to_http(error)),
    };

    match auth_service.register(payload).await {
        Ok(user) => Ok((
            StatusCode::CREATED,
            ResponseJson(ApiResponse::success(user, "Account created successfully")),
        )),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle user login request
#[axum::debug_handler]
pub async fn login(
    Extension(pool): Extension<SqlitePool>,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieHeaders, ResponseJson<ApiResponse<LoginResponse>>), (StatusCode, String)> {
    let auth_service = match AuthService::new(&pool) {
        Ok(service) => service,
        Err(error) => return Err(service_error_to_http(error)),
    };

    let remember_me = payload.remember_me;
    match auth_service.login(payload).await {
        Ok(response) => {
            let cookies =
                session_cookies(&response.access_token, &response.refresh_token, remember_me);
            Ok((
                cookies,
                ResponseJson(ApiResponse::success(response, "Logged in successfully")),
            ))
        }
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle token refresh request.
///
/// The refresh token is read from the cookie or the bearer header; both
/// cookies are re-set with the new pair.
#[axum::debug_handler]
pub async fn refresh_token(
    Extension(pool): Extension<SqlitePool>,
    headers: HeaderMap,
) -> Result<(CookieHeaders, ResponseJson<ApiResponse<RefreshResponse>>), (StatusCode, String)> {
    let auth_service = match AuthService::new(&pool) {
        Ok(service) => service,
        Err(error) => return Err(service_error_to_http(error)),
    };

    let presented = read_cookie(&headers, REFRESH_COOKIE).or_else(|| read_bearer(&headers));

    match auth_service.refresh(presented).await {
        Ok(response) => {
            let cookies = session_cookies(
                &response.access_token,
                &response.refresh_token,
                response.remember_me,
            );
            Ok((
                cookies,
                ResponseJson(ApiResponse::success(response, "Tokens refreshed")),
            ))
        }
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle logout request; requires an authenticated identity
#[axum::debug_handler]
pub async fn logout(
    Extension(pool): Extension<SqlitePool>,
    Extension(current_user): Extension<UserInfo>,
) -> Result<(CookieHeaders, ResponseJson<ApiResponse<()>>), (StatusCode, String)> {
    let auth_service = match AuthService::new(&pool) {
        Ok(service) => service,
        Err(error) => return Err(service_error_to_http(error)),
    };

    match auth_service.logout(&current_user.id).await {
        Ok(()) => Ok((
            clear_session_cookies(),
            ResponseJson(ApiResponse::success((), "Logged out successfully")),
        )),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Get current user information from the attached identity
#[axum::debug_handler]
pub async fn me(
    Extension(current_user): Extension<UserInfo>,
) -> ResponseJson<ApiResponse<UserInfo>> {
    ResponseJson(ApiResponse::ok(current_user))
}

/// Handle forgot-password request
#[axum::debug_handler]
pub async fn forgot_password(
    Extension(pool): Extension<SqlitePool>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<ResponseJson<ApiResponse<ForgotPasswordResponse>>, (StatusCode, String)> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Config error: {}", e);
            return Err(service_error_to_http(
                crate::errors::ServiceError::internal("Configuration unavailable"),
            ));
        }
    };

    let recovery_service = RecoveryService::new(&pool, &config);
    match recovery_service.request_reset(payload).await {
        Ok(response) => Ok(ResponseJson(ApiResponse::success(
            response,
            "Password reset code issued",
        ))),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle OTP verification request
#[axum::debug_handler]
pub async fn verify_otp(
    Extension(pool): Extension<SqlitePool>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<ResponseJson<ApiResponse<UserInfo>>, (StatusCode, String)> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Config error: {}", e);
            return Err(service_error_to_http(
                crate::errors::ServiceError::internal("Configuration unavailable"),
            ));
        }
    };

    let recovery_service = RecoveryService::new(&pool, &config);
    match recovery_service.verify_otp(payload).await {
        Ok(user) => Ok(ResponseJson(ApiResponse::success(user, "OTP verified"))),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle password reset request
#[axum::debug_handler]
pub async fn reset_password(
    Extension(pool): Extension<SqlitePool>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<ResponseJson<ApiResponse<UserInfo>>, (StatusCode, String)> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Config error: {}", e);
            return Err(service_error_to_http(
                crate::errors::ServiceError::internal("Configuration unavailable"),
            ));
        }
    };

    let recovery_service = RecoveryService::new(&pool, &config);
    match recovery_service.reset_password(payload).await {
        Ok(user) => Ok(ResponseJson(ApiResponse::success(
            user,
            "Password reset successfully",
        ))),
        Err(error) => Err(service_error_to_http(error)),
    }
}
