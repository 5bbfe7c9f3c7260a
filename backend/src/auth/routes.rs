//! Defines the HTTP routes specifically for authentication.
//!
//! These routes handle the session lifecycle and the password recovery
//! flow. They are designed to be integrated into the main Axum router.

use crate::auth::handlers::*;
use crate::auth::middleware::*;
use axum::{
    Router, middleware,
    routing::{get, post},
};

/// Creates the authentication router with all auth-related routes
pub fn auth_router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh_token))
        .route(
            "/logout",
            post(logout).layer(middleware::from_fn(access_gate)),
        )
        .route("/me", get(me).layer(middleware::from_fn(access_gate)))
        .route("/forgot-password", post(forgot_password))
        .route("/verify-otp", post(verify_otp))
        .route("/reset-password", post(reset_password))
}
