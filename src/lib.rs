//! Bankly - peer-to-peer banking backend
//!
//! Accounts, email-verified transfers and money requests, asynchronous
//! settlement through job queues, and live notifications over WebSocket.
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (AccountId, MinorUnits, Clock)
//! - [`money`] - Client amount parsing and formatting
//! - [`token`] - Verification token issue/verify
//! - [`transaction`] - Transaction state machine, ledger stores, recovery sweep
//! - [`account`] - Registration, login (JWT), email verification, password reset
//! - [`card`] - Card requests confirmed by emailed link
//! - [`cache`] - TTL cache for per-user transaction lists
//! - [`queue`] - Job queues, consumer workers, job handlers
//! - [`email`] - Email jobs and the sender collaborator
//! - [`notification`] - Notification records, dispatcher, session registry
//! - [`websocket`] - Authenticated push endpoint
//! - [`gateway`] - HTTP API (axum)
//! - [`bootstrap`] - Service wiring

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod db;
pub mod logging;
pub mod money;

// Domain
pub mod account;
pub mod cache;
pub mod card;
pub mod email;
pub mod notification;
pub mod queue;
pub mod token;
pub mod transaction;

// Surfaces
pub mod bootstrap;
pub mod gateway;
pub mod websocket;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use core_types::{AccountId, Clock, MinorUnits, SystemClock, Timestamp};
pub use transaction::{
    Transaction, TransactionCoordinator, TransactionError, TransactionId, TransactionStatus,
    TransactionType,
};
