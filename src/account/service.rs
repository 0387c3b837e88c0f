//! Account service: registration, email verification, login, password reset
//!
//! Passwords are hashed with Argon2; access tokens are HS256 JWTs whose `sub`
//! is the account id. Email-verification and password-reset tokens come from
//! the same `TokenService` as transaction tokens and are consumed with one
//! conditional write at the store.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::core_types::{AccountId, Clock};
use crate::email::{EmailJob, EmailTemplate, verification_url};
use crate::notification::{NewNotification, NotificationStatus, NotificationType};
use crate::queue::{Job, JobQueue};
use crate::token::{TokenPurpose, TokenService};

use super::error::AccountError;
use super::models::{AccountProfile, AccountRecord, NewAccount};
use super::store::CredentialStore;
use super::validation::{
    ForgotPasswordRequest, LoginRequest, RegisterRequest, ResendVerificationRequest,
    ResetPasswordRequest, check_user_name, normalize_email, validate_request,
};

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // account id
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn account_id(&self) -> Option<AccountId> {
        self.sub.parse().ok()
    }
}

/// Login result
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub profile: AccountProfile,
}

/// Settings the service takes from `AppConfig`
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub jwt_ttl: chrono::Duration,
    pub base_url: String,
}

impl AuthSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            jwt_ttl: chrono::Duration::hours(config.jwt_ttl_hours),
            base_url: config.public_base_url.clone(),
        }
    }
}

pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    tokens: TokenService,
    queue: Arc<dyn JobQueue>,
    clock: Arc<dyn Clock>,
    settings: AuthSettings,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: TokenService,
        queue: Arc<dyn JobQueue>,
        clock: Arc<dyn Clock>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            tokens,
            queue,
            clock,
            settings,
        }
    }

    /// Create an unverified account and email its verification link.
    ///
    /// The email job is queued before the row is written, so a broker outage
    /// leaves no half-registered account behind. Registering an email that
    /// exists but was never verified re-sends the link with a fresh token;
    /// the stored password and names stay as they were.
    pub async fn register(&self, req: RegisterRequest) -> Result<AccountProfile, AccountError> {
        validate_request(&req)?;
        check_user_name(&req.user_name)?;
        let email = normalize_email(&req.email);

        if let Some(existing) = self.store.find_by_email(&email).await? {
            if existing.verified {
                return Err(AccountError::Conflict("Email already registered".into()));
            }
            self.reissue_email_token(&existing).await?;
            return Ok(AccountProfile::from(&existing));
        }

        let password_hash = hash_password(&req.password)?;
        let issued = self.tokens.issue();
        let link = verification_url(&self.settings.base_url, TokenPurpose::EmailVerify, &issued.plaintext);
        let job = EmailJob::new(email.clone(), req.first_name.clone(), EmailTemplate::Register).with_link(link);
        if let Err(e) = self.queue.enqueue(Job::Email(job)).await {
            error!(email = %email, error = %e, "Registration email enqueue failed");
            return Err(e.into());
        }

        let record = self
            .store
            .insert_account(
                NewAccount {
                    first_name: req.first_name.trim().to_string(),
                    last_name: req.last_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                    user_name: req.user_name,
                    email,
                    password_hash,
                    email_token: issued.stored,
                },
                self.clock.now(),
            )
            .await?;

        info!(user_id = record.id, "Account registered");
        Ok(AccountProfile::from(&record))
    }

    pub async fn verify_email(&self, plaintext: &str) -> Result<AccountProfile, AccountError> {
        let hash = self
            .tokens
            .verify(plaintext)
            .map_err(|_| AccountError::InvalidToken)?;
        let record = self
            .store
            .consume_email_token(&hash, self.clock.now())
            .await?
            .ok_or(AccountError::InvalidToken)?;

        info!(user_id = record.id, "Email verified");
        self.best_effort_email(&record, EmailTemplate::EmailVerified).await;
        Ok(AccountProfile::from(&record))
    }

    /// Fresh verification link for an unverified account. Unknown and
    /// already-verified emails succeed silently.
    pub async fn resend_email_verification(
        &self,
        req: ResendVerificationRequest,
    ) -> Result<(), AccountError> {
        validate_request(&req)?;
        let email = normalize_email(&req.email);

        match self.store.find_by_email(&email).await? {
            Some(record) if !record.verified => self.reissue_email_token(&record).await,
            _ => {
                debug!("Verification resend for unknown or verified email");
                Ok(())
            }
        }
    }

    /// Overwrite the email token, then queue the REGISTER email. The old link
    /// stops working even if the enqueue fails; the caller gets a 503 and can
    /// retry.
    async fn reissue_email_token(&self, record: &AccountRecord) -> Result<(), AccountError> {
        let issued = self.tokens.issue();
        if !self
            .store
            .set_email_token(record.id, issued.stored, self.clock.now())
            .await?
        {
            // verified concurrently
            return Err(AccountError::Conflict("Email already registered".into()));
        }

        let link = verification_url(&self.settings.base_url, TokenPurpose::EmailVerify, &issued.plaintext);
        let job = EmailJob::new(record.email.clone(), record.first_name.clone(), EmailTemplate::Register)
            .with_link(link);
        if let Err(e) = self.queue.enqueue(Job::Email(job)).await {
            error!(user_id = record.id, error = %e, "Verification email enqueue failed");
            return Err(e.into());
        }

        info!(user_id = record.id, "Email verification token re-issued");
        Ok(())
    }

    /// Only verified accounts may log in
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AccountError> {
        validate_request(&req)?;
        let email = normalize_email(&req.email);

        let record = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;
        if !verify_password(&req.password, &record.password_hash) {
            debug!(user_id = record.id, "Password mismatch");
            return Err(AccountError::InvalidCredentials);
        }
        if !record.verified {
            return Err(AccountError::NotVerified);
        }

        let token = self.issue_access_token(record.id)?;
        info!(user_id = record.id, "Login");

        self.best_effort_email(&record, EmailTemplate::Login).await;
        let notification = NewNotification::new(
            record.id,
            NotificationType::Login,
            NotificationStatus::Created,
            "New login to your account",
        );
        if let Err(e) = self.queue.enqueue(Job::Notification(notification)).await {
            warn!(user_id = record.id, error = %e, "Notification enqueue failed");
        }

        Ok(AuthResponse {
            token,
            profile: AccountProfile::from(&record),
        })
    }

    /// Unknown emails succeed silently so the endpoint never reveals which accounts exist
    pub async fn forgot_password(&self, req: ForgotPasswordRequest) -> Result<(), AccountError> {
        validate_request(&req)?;
        let email = normalize_email(&req.email);

        let Some(record) = self.store.find_by_email(&email).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let issued = self.tokens.issue();
        self.store
            .set_reset_token(record.id, issued.stored, self.clock.now())
            .await?;

        let link = verification_url(&self.settings.base_url, TokenPurpose::PasswordReset, &issued.plaintext);
        let job = EmailJob::new(record.email.clone(), record.first_name.clone(), EmailTemplate::ForgotPassword)
            .with_link(link);
        if let Err(e) = self.queue.enqueue(Job::Email(job)).await {
            error!(user_id = record.id, error = %e, "Password reset email enqueue failed");
            return Err(e.into());
        }

        info!(user_id = record.id, "Password reset token issued");
        Ok(())
    }

    pub async fn reset_password(
        &self,
        plaintext: &str,
        req: ResetPasswordRequest,
    ) -> Result<(), AccountError> {
        let hash = self
            .tokens
            .verify(plaintext)
            .map_err(|_| AccountError::InvalidToken)?;
        validate_request(&req)?;

        let password_hash = hash_password(&req.password)?;
        let record = self
            .store
            .consume_reset_token(&hash, password_hash, self.clock.now())
            .await?
            .ok_or(AccountError::InvalidToken)?;

        info!(user_id = record.id, "Password reset");
        self.best_effort_email(&record, EmailTemplate::ResetPassword).await;
        Ok(())
    }

    pub async fn profile(&self, account_id: AccountId) -> Result<AccountProfile, AccountError> {
        let record = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(AccountError::Unauthorized)?;
        Ok(AccountProfile::from(&record))
    }

    pub fn issue_access_token(&self, account_id: AccountId) -> Result<String, AccountError> {
        let now = self.clock.now();
        let claims = Claims {
            sub: account_id.to_string(),
            exp: (now + self.settings.jwt_ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.settings.jwt_secret.as_bytes()),
        )
        .map_err(|e| AccountError::SystemError(format!("Failed to generate token: {}", e)))
    }

    /// Verify JWT token
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AccountError> {
        let decoding_key = DecodingKey::from_secret(self.settings.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AccountError::Unauthorized)
    }

    async fn best_effort_email(&self, record: &AccountRecord, template: EmailTemplate) {
        let job = EmailJob::new(record.email.clone(), record.first_name.clone(), template);
        if let Err(e) = self.queue.enqueue(Job::Email(job)).await {
            warn!(user_id = record.id, template = ?template, error = %e, "Email enqueue failed");
        }
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AccountError::SystemError(format!("Hashing failed: {}", e)))
}

fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::ManualClock;
    use crate::queue::QueueName;
    use crate::queue::mock::RecordingQueue;
    use crate::transaction::MemoryLedger;
    use chrono::Utc;

    struct Harness {
        service: AccountService,
        ledger: Arc<MemoryLedger>,
        queue: Arc<RecordingQueue>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(MemoryLedger::new());
        let queue = Arc::new(RecordingQueue::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = AccountService::new(
            ledger.clone(),
            TokenService::with_default_ttl(clock.clone()),
            queue.clone(),
            clock.clone(),
            AuthSettings {
                jwt_secret: "test-secret".into(),
                jwt_ttl: chrono::Duration::hours(1),
                base_url: "https://bank.test/api/v1".into(),
            },
        );
        Harness {
            service,
            ledger,
            queue,
            clock,
        }
    }

    fn register_req(email: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "Ada".into(),
            last_name: Some("Lovelace".into()),
            user_name: "ada".into(),
            email: email.into(),
            password: "analytical engine".into(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Plaintext token from the last emailed link
    fn last_link_token(queue: &RecordingQueue) -> String {
        let emails = queue.emails();
        let link = emails
            .iter()
            .rev()
            .find_map(|e| e.link.clone())
            .expect("an email with a link");
        link.rsplit('/').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_register_verify_login() {
        let h = harness();
        let profile = h.service.register(register_req("Ada@Example.com")).await.unwrap();
        assert_eq!(profile.email, "ada@example.com");
        assert!(!profile.verified);

        let emails = h.queue.emails();
        assert_eq!(emails[0].template, EmailTemplate::Register);
        assert!(
            emails[0]
                .link
                .as_deref()
                .unwrap()
                .starts_with("https://bank.test/api/v1/users/verify/")
        );

        let err = h
            .service
            .login(login_req("ada@example.com", "analytical engine"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::NotVerified));

        let token = last_link_token(&h.queue);
        let verified = h.service.verify_email(&token).await.unwrap();
        assert!(verified.verified);
        assert!(matches!(
            h.service.verify_email(&token).await,
            Err(AccountError::InvalidToken)
        ));

        let auth = h
            .service
            .login(login_req("ada@example.com", "analytical engine"))
            .await
            .unwrap();
        let claims = h.service.verify_access_token(&auth.token).unwrap();
        assert_eq!(claims.account_id(), Some(profile.id));
        assert_eq!(h.queue.jobs_on(QueueName::Notification).len(), 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let h = harness();
        h.service.register(register_req("ada@example.com")).await.unwrap();
        h.service.verify_email(&last_link_token(&h.queue)).await.unwrap();
        let mut second = register_req("ADA@example.com");
        second.user_name = "ada2".into();
        let err = h.service.register(second).await.unwrap_err();
        assert!(matches!(err, AccountError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_email_unavailable_creates_nothing() {
        let h = harness();
        h.queue.fail(QueueName::Email, true);
        let err = h.service.register(register_req("ada@example.com")).await.unwrap_err();
        assert_eq!(err.http_status(), 503);
        assert!(
            h.ledger
                .find_by_email("ada@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let h = harness();
        h.service.register(register_req("ada@example.com")).await.unwrap();
        let err = h
            .service
            .login(login_req("ada@example.com", "difference engine"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));

        let err = h
            .service
            .login(login_req("nobody@example.com", "whatever"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_verification_token_expires() {
        let h = harness();
        h.service.register(register_req("ada@example.com")).await.unwrap();
        let token = last_link_token(&h.queue);
        h.clock.advance(chrono::Duration::minutes(21));
        assert!(matches!(
            h.service.verify_email(&token).await,
            Err(AccountError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_register_again_after_expiry_sends_fresh_link() {
        let h = harness();
        let first = h.service.register(register_req("ada@example.com")).await.unwrap();
        let expired = last_link_token(&h.queue);
        h.clock.advance(chrono::Duration::minutes(21));

        let mut again = register_req("ADA@example.com");
        again.password = "another password".into();
        let second = h.service.register(again).await.unwrap();
        assert_eq!(second.id, first.id);

        let fresh = last_link_token(&h.queue);
        assert_ne!(fresh, expired);
        assert_eq!(h.queue.emails().len(), 2);
        assert!(h.service.verify_email(&fresh).await.unwrap().verified);

        // the original password still applies
        assert!(
            h.service
                .login(login_req("ada@example.com", "analytical engine"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_resend_verification_overwrites_token() {
        let h = harness();
        h.service.register(register_req("ada@example.com")).await.unwrap();
        let first = last_link_token(&h.queue);

        h.service
            .resend_email_verification(ResendVerificationRequest {
                email: "ada@example.com".into(),
            })
            .await
            .unwrap();
        let second = last_link_token(&h.queue);
        assert!(matches!(
            h.service.verify_email(&first).await,
            Err(AccountError::InvalidToken)
        ));
        h.service.verify_email(&second).await.unwrap();

        // verified and unknown emails queue nothing
        let before = h.queue.emails().len();
        for email in ["ada@example.com", "ghost@example.com"] {
            h.service
                .resend_email_verification(ResendVerificationRequest { email: email.into() })
                .await
                .unwrap();
        }
        assert_eq!(h.queue.emails().len(), before);
    }

    #[tokio::test]
    async fn test_profile_reads_balance_and_flags() {
        let h = harness();
        let id = h.ledger.seed_account("grace@example.com", 12_345, true);
        let profile = h.service.profile(id).await.unwrap();
        assert_eq!(profile.email, "grace@example.com");
        assert_eq!(profile.balance, "123.45");
        assert!(profile.verified);
        assert!(matches!(h.service.profile(999).await, Err(AccountError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_forgot_and_reset_password() {
        let h = harness();
        h.service.register(register_req("ada@example.com")).await.unwrap();
        h.service.verify_email(&last_link_token(&h.queue)).await.unwrap();

        h.service
            .forgot_password(ForgotPasswordRequest {
                email: "ada@example.com".into(),
            })
            .await
            .unwrap();
        let first = last_link_token(&h.queue);
        // a second request overwrites the first token
        h.service
            .forgot_password(ForgotPasswordRequest {
                email: "ada@example.com".into(),
            })
            .await
            .unwrap();
        let second = last_link_token(&h.queue);
        assert_ne!(first, second);

        let new_password = ResetPasswordRequest {
            password: "difference engine".into(),
        };
        assert!(matches!(
            h.service.reset_password(&first, new_password.clone()).await,
            Err(AccountError::InvalidToken)
        ));
        h.service.reset_password(&second, new_password).await.unwrap();

        assert!(
            h.service
                .login(login_req("ada@example.com", "difference engine"))
                .await
                .is_ok()
        );
        assert!(
            h.queue
                .emails()
                .iter()
                .any(|e| e.template == EmailTemplate::ResetPassword)
        );
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email_is_silent() {
        let h = harness();
        h.service
            .forgot_password(ForgotPasswordRequest {
                email: "ghost@example.com".into(),
            })
            .await
            .unwrap();
        assert!(h.queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_tokens_rejected() {
        let h = harness();
        assert!(matches!(
            h.service.verify_email("not-a-token").await,
            Err(AccountError::InvalidToken)
        ));
        assert!(matches!(
            h.service.verify_access_token("garbage"),
            Err(AccountError::Unauthorized)
        ));
    }
}
