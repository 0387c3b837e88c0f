//! HTTP handlers, one submodule per resource

pub mod auth;
pub mod cards;
pub mod health;
#[cfg(feature = "mock-api")]
pub mod mock;
pub mod notifications;
pub mod transactions;

pub use auth::{
    MessageData, forgot_password, login, me, register, resend_email_verification, reset_password,
    verify_email,
};
pub use cards::{get_card, request_card, verify_card};
pub use health::{HealthResponse, health_check};
pub use notifications::{list_notifications, mark_read};
pub use transactions::{
    approve_request, get_transaction, list_completed, list_requested, reject_request,
    request_money, resend_verification, send_money, verify_transfer,
};
