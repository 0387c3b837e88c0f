//! Read-through cache of per-user transaction lists
//!
//! Failure policy:
//! - read path: any cache error (or undecodable value) is a miss, the caller
//!   falls through to the ledger store
//! - write path: a failed invalidation is logged at `warn` and swallowed

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core_types::AccountId;
use crate::transaction::types::{ListQuery, Transaction};

use super::{CacheKey, CacheNamespace, CacheStore};

pub struct TransactionListCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl TransactionListCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn key_for(query: ListQuery) -> CacheKey {
        match query {
            ListQuery::Completed(user) => CacheKey::new(CacheNamespace::CompletedTransactions, user),
            ListQuery::Requested(user) => CacheKey::new(CacheNamespace::RequestedTransactions, user),
        }
    }

    /// Cached list, or `None` on miss / cache outage / corrupt entry
    pub async fn get(&self, query: ListQuery) -> Option<Vec<Transaction>> {
        let key = Self::key_for(query).to_string();
        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(list) => {
                    debug!(key = %key, "transaction list cache hit");
                    Some(list)
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Dropping undecodable cache entry");
                    if let Err(e) = self.store.del(&key).await {
                        warn!(key = %key, error = %e, "Failed to drop cache entry");
                    }
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, falling back to store");
                None
            }
        }
    }

    /// Populate after a miss. Errors are logged only.
    pub async fn put(&self, query: ListQuery, list: &[Transaction]) {
        let key = Self::key_for(query).to_string();
        let raw = match serde_json::to_string(list) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode transaction list");
                return;
            }
        };
        if let Err(e) = self.store.set(&key, raw, self.ttl).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    /// Delete every list view of `user`. Never fails the caller.
    pub async fn invalidate_user(&self, user: AccountId) {
        for namespace in CacheNamespace::ALL {
            let key = CacheKey::new(namespace, user).to_string();
            if let Err(e) = self.store.del(&key).await {
                warn!(
                    key = %key,
                    error = %e,
                    "Cache invalidation failed; entry may be stale until TTL"
                );
            }
        }
    }

    /// Invalidate both parties of a transaction
    pub async fn invalidate_parties(&self, tx: &Transaction) {
        self.invalidate_user(tx.from).await;
        if tx.to != tx.from {
            self.invalidate_user(tx.to).await;
        }
    }
}
