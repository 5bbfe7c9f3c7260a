//! Collection of general utility functions and common traits.
//!
//! This module serves as a repository for small, reusable helpers that do
//! not fit into other specific domain modules.

pub mod cookies;
pub mod jwt;
pub mod otp;
pub mod password;
