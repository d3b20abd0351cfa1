//! Email service for transactional notifications.
//!
//! Uses SMTP via lettre for delivery. All messages are plain text; the
//! recipients are store operators and back-office staff, not a marketing
//! audience.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use machiya_core::Email;

use crate::config::EmailConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    review_inbox: String,
    base_url: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_owned(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            review_inbox: config.review_inbox.clone(),
            base_url: config.base_url.clone(),
        })
    }

    /// Acknowledge a newly submitted edit request to the applicant.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or sent.
    pub async fn send_request_receipt(
        &self,
        to: &Email,
        store_name: &str,
    ) -> Result<(), EmailError> {
        let body = format!(
            "We received your listing request for \"{store_name}\".\n\
             \n\
             Our team will review the submitted documents and get back to you.\n\
             You do not need to do anything right now.\n\
             \n\
             Machiya"
        );
        self.send_text_email(to.as_str(), "We received your listing request", &body)
            .await
    }

    /// Alert the review inbox that a new request is waiting.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or sent.
    pub async fn send_review_alert(
        &self,
        request_id: i32,
        store_name: &str,
    ) -> Result<(), EmailError> {
        let body = format!(
            "A new listing request is waiting for review.\n\
             \n\
             Request: #{request_id}\n\
             Store:   {store_name}\n\
             \n\
             {base_url}/requests/{request_id}",
            base_url = self.base_url,
        );
        let to = self.review_inbox.clone();
        self.send_text_email(&to, &format!("New listing request #{request_id}"), &body)
            .await
    }

    /// Send the generated owner credentials after approval.
    ///
    /// `password_note` is either the freshly generated password or a note
    /// that an existing account is being reused.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or sent.
    pub async fn send_approval_credentials(
        &self,
        to: &Email,
        store_name: &str,
        login_id: &str,
        password_note: &str,
    ) -> Result<(), EmailError> {
        let body = format!(
            "Your listing request for \"{store_name}\" has been approved.\n\
             \n\
             You can now sign in to manage your store:\n\
             \n\
             Login ID: {login_id}\n\
             Password: {password_note}\n\
             \n\
             {base_url}/login\n\
             \n\
             Please change your password after your first sign-in.\n\
             \n\
             Machiya",
            base_url = self.base_url,
        );
        self.send_text_email(to.as_str(), "Your listing has been approved", &body)
            .await
    }

    /// Notify an account holder that their account is locked, with a
    /// single-use unlock link.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or sent.
    pub async fn send_account_locked(
        &self,
        to: &Email,
        lockout_minutes: i64,
        unlock_token: &str,
    ) -> Result<(), EmailError> {
        let body = format!(
            "Your account has been locked after too many failed sign-in\n\
             attempts. It will unlock automatically in {lockout_minutes} minutes.\n\
             \n\
             To unlock it right away, use this link (valid once):\n\
             \n\
             {base_url}/unlock?token={unlock_token}\n\
             \n\
             If this wasn't you, please contact support.\n\
             \n\
             Machiya",
            base_url = self.base_url,
        );
        self.send_text_email(to.as_str(), "Your account has been locked", &body)
            .await
    }

    /// Confirm that an account has been unlocked.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or sent.
    pub async fn send_account_unlocked(&self, to: &Email) -> Result<(), EmailError> {
        let body = "Your account has been unlocked. You can sign in again.\n\
                    \n\
                    Machiya"
            .to_owned();
        self.send_text_email(to.as_str(), "Your account has been unlocked", &body)
            .await
    }

    /// Send a plain text email.
    async fn send_text_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_owned()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_owned())?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}
