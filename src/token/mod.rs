//! Verification Token Service
//!
//! Issues and verifies single-use, time-limited tokens without ever storing
//! the plaintext.
//!
//! # Lifecycle
//!
//! ```text
//! issue() ──► plaintext (emailed) + SHA-256 hash + expiry (persisted on the aggregate)
//!                 │
//! verify(plain) ──► hash ──► conditional update on the aggregate:
//!                            match hash AND expiry > now AND not consumed
//!                            → clear hash/expiry in the same write
//! ```
//!
//! The service itself is stateless: consumption is the owning aggregate's
//! job, done in the same persistence operation that changes its status.
//! Issuing a new token for an aggregate overwrites the previous pair, so at
//! most one live token exists per aggregate and purpose.

use std::fmt;
use std::sync::Arc;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core_types::{Clock, Timestamp};

/// Random bytes per token
pub const TOKEN_BYTES: usize = 20;

/// Length of the hex-encoded plaintext accepted at the boundary
pub const TOKEN_HEX_LEN: usize = TOKEN_BYTES * 2;

/// Default token lifetime in minutes
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 20;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Verification token must be exactly {TOKEN_HEX_LEN} hex characters")]
    Malformed,
}

/// What a token authorizes. Used for logging and link construction only;
/// the hash itself is purpose-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenPurpose {
    TransactionVerify,
    EmailVerify,
    PasswordReset,
    CardVerify,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::TransactionVerify => "TRANSACTION_VERIFY",
            TokenPurpose::EmailVerify => "EMAIL_VERIFY",
            TokenPurpose::PasswordReset => "PASSWORD_RESET",
            TokenPurpose::CardVerify => "CARD_VERIFY",
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SHA-256 of a plaintext token, hex encoded (64 chars).
///
/// This is the only form that is ever persisted or compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenHash(String);

impl TokenHash {
    /// Wrap a hash loaded from storage
    pub fn from_stored(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The persisted half of a token: attached to whichever aggregate it verifies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub hash: TokenHash,
    pub expires_at: Timestamp,
}

impl StoredToken {
    /// Valid iff the hash matches and the token has not expired.
    /// A consumed token no longer exists (the aggregate field is `None`).
    pub fn is_live_match(&self, presented: &TokenHash, now: Timestamp) -> bool {
        self.hash == *presented && now < self.expires_at
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// Result of [`TokenService::issue`]
#[derive(Clone)]
pub struct IssuedToken {
    /// Delivered out-of-band (email); never persisted
    pub plaintext: String,
    pub stored: StoredToken,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("plaintext", &"<redacted>")
            .field("stored", &self.stored)
            .finish()
    }
}

/// Token issuer/verifier
pub struct TokenService {
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(ttl: chrono::Duration, clock: Arc<dyn Clock>) -> Self {
        Self { ttl, clock }
    }

    pub fn with_default_ttl(clock: Arc<dyn Clock>) -> Self {
        Self::new(chrono::Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES), clock)
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Generate a fresh token: 20 bytes from the OS CSPRNG, hex encoded.
    pub fn issue(&self) -> IssuedToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let plaintext = hex::encode(bytes);
        let hash = Self::hash(&plaintext);

        IssuedToken {
            plaintext,
            stored: StoredToken {
                hash,
                expires_at: self.clock.now() + self.ttl,
            },
        }
    }

    /// Re-derive the lookup hash from a presented plaintext.
    ///
    /// Rejects anything that is not exactly 40 hex characters so that
    /// malformed input never reaches the store.
    pub fn verify(&self, plaintext: &str) -> Result<TokenHash, TokenError> {
        if !Self::is_well_formed(plaintext) {
            return Err(TokenError::Malformed);
        }
        Ok(Self::hash(plaintext))
    }

    /// Pure one-way hash (SHA-256, lowercase hex)
    pub fn hash(plaintext: &str) -> TokenHash {
        let digest = Sha256::digest(plaintext.as_bytes());
        TokenHash(hex::encode(digest))
    }

    pub fn is_well_formed(plaintext: &str) -> bool {
        plaintext.len() == TOKEN_HEX_LEN && plaintext.bytes().all(|b| b.is_ascii_hexdigit())
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::ManualClock;
    use chrono::Utc;
    use std::collections::HashSet;

    fn service() -> (TokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (TokenService::with_default_ttl(clock.clone()), clock)
    }

    #[test]
    fn test_issue_shape() {
        let (svc, clock) = service();
        let token = svc.issue();

        assert_eq!(token.plaintext.len(), TOKEN_HEX_LEN);
        assert!(TokenService::is_well_formed(&token.plaintext));
        assert_eq!(token.stored.hash.as_str().len(), 64);
        assert_eq!(
            token.stored.expires_at,
            clock.now() + chrono::Duration::minutes(20)
        );
    }

    #[test]
    fn test_hash_is_deterministic_and_not_plaintext() {
        let (svc, _) = service();
        let token = svc.issue();
        let rederived = svc.verify(&token.plaintext).unwrap();

        assert_eq!(rederived, token.stored.hash);
        assert_ne!(rederived.as_str(), token.plaintext);
    }

    #[test]
    fn test_known_vector() {
        // sha256("abc")
        assert_eq!(
            TokenService::hash("abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_tokens_are_unique() {
        let (svc, _) = service();
        let seen: HashSet<String> = (0..256).map(|_| svc.issue().plaintext).collect();
        assert_eq!(seen.len(), 256);
    }

    #[test]
    fn test_verify_rejects_malformed() {
        let (svc, _) = service();
        assert_eq!(svc.verify("short"), Err(TokenError::Malformed));
        assert_eq!(svc.verify(&"g".repeat(40)), Err(TokenError::Malformed));
        assert_eq!(svc.verify(&"a".repeat(41)), Err(TokenError::Malformed));
        assert!(svc.verify(&"a".repeat(40)).is_ok());
    }

    #[test]
    fn test_live_match_respects_expiry() {
        let (svc, clock) = service();
        let token = svc.issue();
        let presented = svc.verify(&token.plaintext).unwrap();

        assert!(token.stored.is_live_match(&presented, clock.now()));

        clock.advance(chrono::Duration::minutes(21));
        assert!(!token.stored.is_live_match(&presented, clock.now()));
        assert!(token.stored.is_expired(clock.now()));
    }

    #[test]
    fn test_live_match_rejects_other_token() {
        let (svc, clock) = service();
        let first = svc.issue();
        let second = svc.issue();
        let presented = svc.verify(&second.plaintext).unwrap();

        assert!(!first.stored.is_live_match(&presented, clock.now()));
    }

    #[test]
    fn test_debug_redacts_plaintext() {
        let (svc, _) = service();
        let token = svc.issue();
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains(&token.plaintext));
    }
}
