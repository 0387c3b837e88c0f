//! Card issuance
//!
//! A verified account requests a card with a PIN; the card stays PENDING
//! until the emailed link is opened, which assigns the number, dates and a
//! one-time CVV.

pub mod error;
pub mod models;
pub mod service;
pub mod store;

pub use error::CardError;
pub use models::{CardRequest, CardStatus, CardView, IssuedCard};
pub use service::CardService;
pub use store::{CardStore, MemoryCardStore, PgCardStore};
