//! Transaction State Machine
//!
//! Peer-to-peer transfers and money requests, verified out-of-band with a
//! single-use emailed token and settled asynchronously by a queue consumer.
//!
//! # State Machine
//!
//! ```text
//! PENDING → QUEUED → COMPLETED
//!    ↓         ↓
//! FAILED    FAILED
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Single consumption**: token lookup and PENDING→QUEUED happen in one
//!    conditional update; a second presentation finds nothing
//! 2. **No overdraw**: the balance check and both balance writes run inside
//!    one per-account critical section
//! 3. **Idempotent settlement**: only QUEUED rows are settled, so redelivery
//!    is a no-op
//! 4. **Delete, never refresh**: cached lists are invalidated after each
//!    committed write

pub mod api;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod memory;
pub mod state;
pub mod store;
pub mod types;
pub mod worker;


pub use api::{
    DepositRequest, RequestMoneyRequest, SendMoneyRequest, TransactionAccepted, TransactionView,
};
pub use coordinator::TransactionCoordinator;
pub use db::PgLedgerStore;
pub use error::TransactionError;
pub use memory::MemoryLedger;
pub use state::{FailureReason, TransactionStatus, TransactionType};
pub use store::{LedgerStore, StoreError};
pub use types::{Account, AccountLookup, ListQuery, Transaction, TransactionId};
pub use worker::{RecoveryReport, RecoveryWorker, WorkerConfig};
