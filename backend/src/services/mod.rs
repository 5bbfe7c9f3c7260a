//! Module for core business logic services.
//!
//! This module encapsulates services that perform specific business
//! operations and orchestrate interactions between different parts of the
//! application, such as the password recovery flow and email dispatch.

pub mod email_service;
pub mod recovery_service;
