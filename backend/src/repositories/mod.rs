//! Persistence layer: repositories abstracting database access per entity.

pub mod user_repository;
