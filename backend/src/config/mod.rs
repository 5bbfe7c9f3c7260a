//! Central module for application-wide configuration settings.
//!
//! This module handles loading and managing configuration parameters such as
//! the database URL, server port, token secrets and expiries, the
//! administrator email allow-list, and the optional SMTP block.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub server_port: u16,
    pub access_token_secret: String,
    pub access_token_expires_in_seconds: u64,
    pub refresh_token_secret: String,
    pub refresh_token_expires_in_seconds: u64,
    /// Emails permitted to authenticate with the `admin` role.
    pub admin_emails: HashSet<String>,
    email: Option<EmailConfig>,
}

/// SMTP settings for the outbound email collaborator.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_name: String,
    pub from_email: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a valid number")?;

        let acquire_timeout_seconds = env::var("DB_ACQUIRE_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<u64>()
            .context("DB_ACQUIRE_TIMEOUT_SECONDS must be a valid number")?;

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("SERVER_PORT must be a valid number")?;

        let access_token_secret =
            env::var("ACCESS_TOKEN_SECRET").context("ACCESS_TOKEN_SECRET not set")?;

        let access_token_expires_in_seconds = env::var("ACCESS_TOKEN_EXPIRES_IN_SECONDS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse::<u64>()
            .context("ACCESS_TOKEN_EXPIRES_IN_SECONDS must be a valid number")?;

        let refresh_token_secret =
            env::var("REFRESH_TOKEN_SECRET").context("REFRESH_TOKEN_SECRET not set")?;

        let refresh_token_expires_in_seconds = env::var("REFRESH_TOKEN_EXPIRES_IN_SECONDS")
            .unwrap_or_else(|_| "604800".to_string())
            .parse::<u64>()
            .context("REFRESH_TOKEN_EXPIRES_IN_SECONDS must be a valid number")?;

        let admin_emails = env::var("ADMIN_EMAILS")
            .unwrap_or_default()
            .split(',')
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();

        let email = Self::email_config_from_env();

        Ok(Config {
            database_url,
            max_connections,
            acquire_timeout_seconds,
            server_port,
            access_token_secret,
            access_token_expires_in_seconds,
            refresh_token_secret,
            refresh_token_expires_in_seconds,
            admin_emails,
            email,
        })
    }

    /// Returns the SMTP configuration if the full block is present.
    pub fn email_config(&self) -> Option<EmailConfig> {
        self.email.clone()
    }

    /// Checks whether an email is on the administrator allow-list.
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.contains(&email.to_lowercase())
    }

    fn email_config_from_env() -> Option<EmailConfig> {
        let smtp_host = env::var("SMTP_HOST").ok()?;
        let smtp_port = env::var("SMTP_PORT").ok()?.parse::<u16>().ok()?;
        let smtp_username = env::var("SMTP_USERNAME").ok()?;
        let smtp_password = env::var("SMTP_PASSWORD").ok()?;
        let from_name = env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "Wayfarer".to_string());
        let from_email = env::var("EMAIL_FROM_ADDRESS").ok()?;

        Some(EmailConfig {
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            from_name,
            from_email,
        })
    }
}

#[cfg(test)]
impl Config {
    /// A fixed configuration for tests, independent of the environment.
    pub fn test_defaults() -> Self {
        Config {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout_seconds: 3,
            server_port: 0,
            access_token_secret: "access-test-secret".to_string(),
            access_token_expires_in_seconds: 3600,
            refresh_token_secret: "refresh-test-secret".to_string(),
            refresh_token_expires_in_seconds: 604800,
            admin_emails: ["admin@wayfarer.test".to_string()].into_iter().collect(),
            email: None,
        }
    }
}
