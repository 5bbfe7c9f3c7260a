//! Defines the HTTP routes for user management.

use crate::api::user::handlers::*;
use crate::auth::middleware::access_gate;
use axum::{Router, middleware, routing::patch};

/// Creates the user management router
pub fn user_router() -> Router {
    Router::new()
        .route("/status", patch(update_status))
        .layer(middleware::from_fn(access_gate))
}
