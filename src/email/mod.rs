//! Email jobs
//!
//! The core never talks to an email provider: it enqueues an [`EmailJob`] on
//! the `email` queue. The email queue consumer renders it and hands it to an
//! [`EmailSender`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::token::TokenPurpose;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailTemplate {
    Register,
    Login,
    TransactionVerify,
    EmailVerified,
    ForgotPassword,
    ResetPassword,
    CardVerify,
}

impl EmailTemplate {
    pub fn subject(&self) -> &'static str {
        match self {
            EmailTemplate::Register => "Verify Your Email to Continue",
            EmailTemplate::Login => "New Login to Your Account",
            EmailTemplate::TransactionVerify => "Confirm Your Transaction",
            EmailTemplate::EmailVerified => "Email Verified",
            EmailTemplate::ForgotPassword => "Forgot Password",
            EmailTemplate::ResetPassword => "Password Changed",
            EmailTemplate::CardVerify => "Confirm Your Card Request",
        }
    }
}

/// Payload of the `email` queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    pub recipient: String,
    pub recipient_name: String,
    pub template: EmailTemplate,
    /// Verification link carrying the plaintext token, when the template needs one
    pub link: Option<String>,
    /// Free-form line rendered under the greeting (amounts, counterparty)
    pub detail: Option<String>,
}

impl EmailJob {
    pub fn new(recipient: impl Into<String>, name: impl Into<String>, template: EmailTemplate) -> Self {
        Self {
            recipient: recipient.into(),
            recipient_name: name.into(),
            template,
            link: None,
            detail: None,
        }
    }

    pub fn with_link(mut self, link: String) -> Self {
        self.link = Some(link);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn render(&self) -> RenderedEmail {
        let mut body = format!("Hi {},\n\n", self.recipient_name);
        if let Some(detail) = &self.detail {
            body.push_str(detail);
            body.push_str("\n\n");
        }
        match (&self.template, &self.link) {
            (EmailTemplate::Register, Some(link)) => {
                body.push_str(&format!("Verify your email address: {}\n", link))
            }
            (EmailTemplate::TransactionVerify, Some(link)) => body.push_str(&format!(
                "Confirm this transaction within 20 minutes: {}\n",
                link
            )),
            (EmailTemplate::ForgotPassword, Some(link)) => {
                body.push_str(&format!("Reset your password: {}\n", link))
            }
            (EmailTemplate::CardVerify, Some(link)) => {
                body.push_str(&format!("Activate your new card: {}\n", link))
            }
            (_, Some(link)) => body.push_str(&format!("{}\n", link)),
            (_, None) => {}
        }
        body.push_str("\nIf this wasn't you, contact support immediately.\n");

        RenderedEmail {
            to: self.recipient.clone(),
            subject: self.template.subject().to_string(),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// `{base}/{path}/{token}` for the verification flow of `purpose`
pub fn verification_url(base_url: &str, purpose: TokenPurpose, plaintext: &str) -> String {
    let path = match purpose {
        TokenPurpose::TransactionVerify => "transactions/verify",
        TokenPurpose::EmailVerify => "users/verify",
        TokenPurpose::PasswordReset => "users/reset-password",
        TokenPurpose::CardVerify => "cards/verify",
    };
    format!("{}/{}/{}", base_url.trim_end_matches('/'), path, plaintext)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// Provider unreachable or rate limited
    #[error("Email provider unavailable: {0}")]
    Unavailable(String),

    #[error("Email rejected: {0}")]
    Rejected(String),
}

/// Delivery collaborator
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &RenderedEmail) -> Result<(), EmailError>;
}

/// Writes emails to the log instead of sending them (dev / tests)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: &RenderedEmail) -> Result<(), EmailError> {
        info!(to = %email.to, subject = %email.subject, "Email sent (log transport)");
        debug!(to = %email.to, body = %email.body, "Email body");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_urls() {
        let token = "a".repeat(40);
        assert_eq!(
            verification_url("http://localhost:8080/api/v1/", TokenPurpose::TransactionVerify, &token),
            format!("http://localhost:8080/api/v1/transactions/verify/{}", token)
        );
        assert_eq!(
            verification_url("https://x/api/v1", TokenPurpose::EmailVerify, "t"),
            "https://x/api/v1/users/verify/t"
        );
        assert_eq!(
            verification_url("https://x/api/v1", TokenPurpose::PasswordReset, "t"),
            "https://x/api/v1/users/reset-password/t"
        );
        assert_eq!(
            verification_url("https://x/api/v1", TokenPurpose::CardVerify, "t"),
            "https://x/api/v1/cards/verify/t"
        );
    }

    #[test]
    fn test_render_includes_link_and_detail() {
        let job = EmailJob::new("a@example.com", "Alice", EmailTemplate::TransactionVerify)
            .with_link("https://x/transactions/verify/abc".into())
            .with_detail("You are sending 300.00 to bob@example.com.");
        let email = job.render();

        assert_eq!(email.to, "a@example.com");
        assert_eq!(email.subject, "Confirm Your Transaction");
        assert!(email.body.contains("Hi Alice"));
        assert!(email.body.contains("https://x/transactions/verify/abc"));
        assert!(email.body.contains("300.00"));
    }

    #[test]
    fn test_template_json() {
        let json = serde_json::to_string(&EmailTemplate::ForgotPassword).unwrap();
        assert_eq!(json, "\"FORGOT_PASSWORD\"");
    }

    #[tokio::test]
    async fn test_log_sender_accepts() {
        let email = EmailJob::new("a@example.com", "Alice", EmailTemplate::EmailVerified).render();
        assert!(LogEmailSender.send(&email).await.is_ok());
    }
}
