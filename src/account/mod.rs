//! Account management module
//!
//! Registration, email verification, login and password reset. Accounts share
//! the ledger's storage: `MemoryLedger` and `accounts_tb` back both the
//! credential store and the balance store.

pub mod db;
pub mod error;
mod memory;
pub mod models;
pub mod service;
pub mod store;
pub mod validation;

pub use db::PgCredentialStore;
pub use error::AccountError;
pub use models::{AccountProfile, AccountRecord, NewAccount};
pub use service::{AccountService, AuthResponse, AuthSettings, Claims};
pub use store::CredentialStore;
pub use validation::{
    ForgotPasswordRequest, LoginRequest, RegisterRequest, ResendVerificationRequest,
    ResetPasswordRequest,
};
