//! Outbound email collaborator.
//!
//! Renders and dispatches the password-recovery message over SMTP. The
//! recovery service talks to it through the [`OtpMailer`] trait so tests can
//! swap in a no-op transport.

use crate::config::EmailConfig;
use crate::errors::{ServiceError, ServiceResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::str::FromStr;

/// Dispatches a rendered recovery message to a destination address.
#[async_trait]
pub trait OtpMailer: Send + Sync {
    async fn send_otp_email(
        &self,
        recipient_email: &str,
        recipient_name: &str,
        code: u32,
        expires_at: DateTime<Utc>,
    ) -> ServiceResult<()>;
}

pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    config: EmailConfig,
}

impl EmailService {
    /// Creates a new EmailService instance
    pub fn new(config: EmailConfig) -> ServiceResult<Self> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| ServiceError::external_service(format!("Invalid SMTP host: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self { mailer, config })
    }

    /// Sends a generic multipart email
    pub async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> ServiceResult<()> {
        let from_mailbox = Mailbox::from_str(&format!(
            "{} <{}>",
            self.config.from_name, self.config.from_email
        ))
        .map_err(|e| ServiceError::external_service(format!("Invalid from email: {e}")))?;

        let to_mailbox = Mailbox::from_str(to_email)
            .map_err(|e| ServiceError::external_service(format!("Invalid recipient email: {e}")))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_content.to_string()),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_content.to_string()),
                    ),
            )
            .map_err(|e| ServiceError::external_service(format!("Failed to build email: {e}")))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| ServiceError::external_service(format!("Failed to send email: {e}")))?;

        Ok(())
    }

    fn build_otp_html(&self, recipient_name: &str, code: u32, expires_at: DateTime<Utc>) -> String {
        format!(
            r#"
            <!DOCTYPE html>
            <html>
            <head>
                <meta charset="UTF-8">
                <title>Your password reset code</title>
            </head>
            <body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
                <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
                    <h2 style="color: #2c3e50;">Password reset requested</h2>

                    <p>Hi {},</p>

                    <p>Use the code below to reset your password:</p>

                    <div style="text-align: center; margin: 30px 0;">
                        <span style="font-size: 32px; letter-spacing: 8px; font-weight: bold;">{}</span>
                    </div>

                    <p>This code expires at {}.</p>

                    <hr style="border: none; border-top: 1px solid #ecf0f1; margin: 30px 0;">

                    <p style="font-size: 12px; color: #7f8c8d;">
                        If you didn't request a password reset, you can safely ignore this email.
                    </p>
                </div>
            </body>
            </html>
            "#,
            recipient_name,
            code,
            expires_at.to_rfc2822()
        )
    }

    fn build_otp_text(&self, recipient_name: &str, code: u32, expires_at: DateTime<Utc>) -> String {
        format!(
            r#"Password reset requested

Hi {},

Use the code below to reset your password:

{}

This code expires at {}. If you didn't request a password reset, you can safely ignore this email.
            "#,
            recipient_name,
            code,
            expires_at.to_rfc2822()
        )
    }
}

#[async_trait]
impl OtpMailer for EmailService {
    async fn send_otp_email(
        &self,
        recipient_email: &str,
        recipient_name: &str,
        code: u32,
        expires_at: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let subject = "Your password reset code";
        let html_content = self.build_otp_html(recipient_name, code, expires_at);
        let text_content = self.build_otp_text(recipient_name, code, expires_at);

        self.send_email(recipient_email, subject, &html_content, &text_content)
            .await
    }
}
