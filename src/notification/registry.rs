//! Session registry
//!
//! Maps a user to their live WebSocket sessions. Populated on connect,
//! cleaned on disconnect. Behind a trait so a multi-instance deployment can
//! swap in a shared implementation.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::core_types::AccountId;
use crate::websocket::messages::WsMessage;

pub type SessionSender = mpsc::UnboundedSender<WsMessage>;

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    pub users: usize,
    pub sessions: usize,
}

pub trait SessionRegistry: Send + Sync {
    fn register(&self, user_id: AccountId, sender: SessionSender) -> SessionId;

    fn unregister(&self, user_id: AccountId, session_id: SessionId);

    /// Deliver to every live session of the user; returns how many accepted it
    fn push(&self, user_id: AccountId, message: &WsMessage) -> usize;

    fn stats(&self) -> RegistryStats;
}

/// Process-local registry. Supports several sessions per user (web + mobile).
pub struct LocalSessionRegistry {
    sessions: DashMap<AccountId, Vec<(SessionId, SessionSender)>>,
    next_id: AtomicU64,
}

impl LocalSessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for LocalSessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry for LocalSessionRegistry {
    fn register(&self, user_id: AccountId, sender: SessionSender) -> SessionId {
        let session_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut entry = self.sessions.entry(user_id).or_default();
        entry.push((session_id, sender));
        tracing::info!(user_id, session_id, user_sessions = entry.len(), "Session registered");
        session_id
    }

    fn unregister(&self, user_id: AccountId, session_id: SessionId) {
        let now_empty = match self.sessions.get_mut(&user_id) {
            Some(mut senders) => {
                senders.retain(|(id, _)| *id != session_id);
                senders.is_empty()
            }
            None => return,
        };
        if now_empty {
            self.sessions.remove_if(&user_id, |_, senders| senders.is_empty());
        }
        tracing::info!(user_id, session_id, "Session unregistered");
    }

    fn push(&self, user_id: AccountId, message: &WsMessage) -> usize {
        let Some(senders) = self.sessions.get(&user_id) else {
            return 0;
        };
        let delivered = senders
            .iter()
            .filter(|(_, tx)| tx.send(message.clone()).is_ok())
            .count();
        if delivered < senders.len() {
            // closed sessions are removed by the socket task on exit
            tracing::debug!(user_id, delivered, total = senders.len(), "Some sessions already closed");
        }
        delivered
    }

    fn stats(&self) -> RegistryStats {
        RegistryStats {
            users: self.sessions.len(),
            sessions: self.sessions.iter().map(|e| e.value().len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_unregister() {
        let registry = LocalSessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let id = registry.register(1001, tx);
        assert_eq!(registry.stats(), RegistryStats { users: 1, sessions: 1 });

        registry.unregister(1001, id);
        assert_eq!(registry.stats(), RegistryStats::default());
    }

    #[test]
    fn test_multiple_sessions_per_user() {
        let registry = LocalSessionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();

        let first = registry.register(1001, tx1);
        registry.register(1001, tx2);
        assert_eq!(registry.stats().sessions, 2);

        assert_eq!(registry.push(1001, &WsMessage::Pong), 2);
        assert_eq!(rx1.try_recv().unwrap(), WsMessage::Pong);
        assert_eq!(rx2.try_recv().unwrap(), WsMessage::Pong);

        registry.unregister(1001, first);
        assert_eq!(registry.stats(), RegistryStats { users: 1, sessions: 1 });
    }

    #[test]
    fn test_push_to_offline_user() {
        let registry = LocalSessionRegistry::new();
        assert_eq!(registry.push(42, &WsMessage::Pong), 0);
    }

    #[test]
    fn test_push_skips_closed_session() {
        let registry = LocalSessionRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(5, tx);
        drop(rx);
        assert_eq!(registry.push(5, &WsMessage::Pong), 0);
    }
}
