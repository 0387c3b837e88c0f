//! WebSocket module for real-time push notifications
//!
//! Authenticated sessions are registered with the notification
//! `SessionRegistry`; the notification dispatcher pushes through it.

pub mod handler;
pub mod messages;

pub use handler::ws_handler;
pub use messages::{ClientMessage, WsMessage};
