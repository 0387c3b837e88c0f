//! Notifications
//!
//! Records are produced by the core as `notification` queue jobs, persisted
//! by the queue consumer through [`NotificationDispatcher`] and pushed to live
//! WebSocket sessions through the [`SessionRegistry`].

pub mod dispatcher;
pub mod models;
pub mod registry;
pub mod store;

pub use dispatcher::NotificationDispatcher;
pub use models::{
    NewNotification, Notification, NotificationId, NotificationStatus, NotificationType,
};
pub use registry::{LocalSessionRegistry, RegistryStats, SessionRegistry};
pub use store::{MemoryNotificationStore, NotificationStore, PgNotificationStore};
