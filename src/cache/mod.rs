//! Cache Layer
//!
//! A key-value contract with TTL ([`CacheStore`]), a process-local
//! implementation ([`MemoryCache`]), and the transaction-list policy built
//! on top of it ([`TransactionListCache`]).
//!
//! The state machine only ever deletes entries on write. It never updates
//! them in place.

pub mod lists;
pub mod memory;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core_types::AccountId;

pub use lists::TransactionListCache;
pub use memory::MemoryCache;

/// Default entry lifetime: 6 hours
pub const DEFAULT_TTL: Duration = Duration::from_secs(21_600);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cache value could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn del(&self, key: &str) -> Result<(), CacheError>;
}

/// Cache namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    CompletedTransactions,
    RequestedTransactions,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::CompletedTransactions => "completed-transactions",
            CacheNamespace::RequestedTransactions => "requested-transactions",
        }
    }

    pub const ALL: [CacheNamespace; 2] = [
        CacheNamespace::CompletedTransactions,
        CacheNamespace::RequestedTransactions,
    ];
}

/// `{namespace}:{user_id}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: CacheNamespace,
    pub user_id: AccountId,
}

impl CacheKey {
    pub fn new(namespace: CacheNamespace, user_id: AccountId) -> Self {
        Self { namespace, user_id }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace.as_str(), self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(
            CacheKey::new(CacheNamespace::CompletedTransactions, 42).to_string(),
            "completed-transactions:42"
        );
        assert_eq!(
            CacheKey::new(CacheNamespace::RequestedTransactions, 7).to_string(),
            "requested-transactions:7"
        );
    }

    #[test]
    fn test_default_ttl_is_six_hours() {
        assert_eq!(DEFAULT_TTL.as_secs(), 6 * 60 * 60);
    }
}
