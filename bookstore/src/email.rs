use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::model::GenericError;
use common::config::EmailConfig;

/// How long a password-reset link stays usable.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 15;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_reset_password(
        &self,
        to: &str,
        name: &str,
        reset_url: &str,
    ) -> Result<(), GenericError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, GenericError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        // STARTTLS on the submission port, like the original deployment.
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();
        let from: Mailbox = config.from.parse()?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_reset_password(
        &self,
        to: &str,
        name: &str,
        reset_url: &str,
    ) -> Result<(), GenericError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject("Reset your password")
            .header(ContentType::TEXT_HTML)
            .body(build_reset_password_body(name, reset_url))?;

        self.transport.send(message).await?;
        tracing::info!(to, "sent password reset email");
        Ok(())
    }
}

pub fn build_reset_password_body(name: &str, reset_url: &str) -> String {
    let name = if name.is_empty() { "there" } else { name };
    format!(
        "<html><body>\
         <h2>Reset your password</h2>\
         <p>Hi {name},</p>\
         <p>We received a request to reset the password for your account. \
         Click the link below to choose a new password.</p>\
         <p><a href=\"{reset_url}\">Reset password</a></p>\
         <p>This link is valid for {ttl} minutes. If you didn't request this, \
         you can safely ignore this email.</p>\
         <p>If the link doesn't work, copy and paste this address into your \
         browser:<br>{reset_url}</p>\
         </body></html>",
        name = name,
        reset_url = reset_url,
        ttl = RESET_TOKEN_TTL_MINUTES,
    )
}
