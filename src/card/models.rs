//! Card records and their API views

use chrono::Datelike;
use rand::Rng;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::core_types::{AccountId, Timestamp};
use crate::token::StoredToken;

/// Digits in a generated card number
pub const CARD_NUMBER_LEN: usize = 12;

/// Years a card stays valid after issue
pub const CARD_VALIDITY_YEARS: i32 = 3;

pub const PIN_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardStatus {
    /// Requested, waiting for the emailed confirmation
    Pending,
    Active,
}

impl CardStatus {
    pub fn id(&self) -> i16 {
        match self {
            CardStatus::Pending => 0,
            CardStatus::Active => 1,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(CardStatus::Pending),
            1 => Some(CardStatus::Active),
            _ => None,
        }
    }
}

/// One card per account. Number and dates are assigned on activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRecord {
    pub holder: AccountId,
    pub status: CardStatus,
    pub number: Option<String>,
    /// `MM/YY`
    pub issue_date: Option<String>,
    /// `MM/YYYY`
    pub expiry_date: Option<String>,
    pub pin_hash: String,
    pub verification: Option<StoredToken>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Number and dates drawn at activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardNumbers {
    pub number: String,
    pub issue_date: String,
    pub expiry_date: String,
}

impl CardNumbers {
    pub fn generate(now: Timestamp) -> Self {
        let mut rng = OsRng;
        let number: String = (0..CARD_NUMBER_LEN)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        Self {
            number,
            issue_date: format!("{:02}/{:02}", now.month(), now.year() % 100),
            expiry_date: format!("{:02}/{}", now.month(), now.year() + CARD_VALIDITY_YEARS),
        }
    }
}

/// Three digits, shown once at activation and never stored
pub fn generate_cvv() -> String {
    OsRng.gen_range(100..1000u16).to_string()
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CardRequest {
    /// Four-digit card PIN
    #[validate(length(equal = 4, message = "must be 4 digits"))]
    #[schema(example = "4821")]
    pub pin: String,
}

impl CardRequest {
    pub fn pin_is_numeric(&self) -> bool {
        self.pin.len() == PIN_LEN && self.pin.bytes().all(|b| b.is_ascii_digit())
    }
}

/// Stored card with the number masked
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CardView {
    pub holder: AccountId,
    pub status: CardStatus,
    #[schema(example = "********4821")]
    pub number: Option<String>,
    #[schema(example = "03/26")]
    pub issue_date: Option<String>,
    #[schema(example = "03/2029")]
    pub expiry_date: Option<String>,
}

impl From<&CardRecord> for CardView {
    fn from(card: &CardRecord) -> Self {
        Self {
            holder: card.holder,
            status: card.status,
            number: card.number.as_deref().map(mask_number),
            issue_date: card.issue_date.clone(),
            expiry_date: card.expiry_date.clone(),
        }
    }
}

/// Full details, returned only by the activation link
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssuedCard {
    pub holder: AccountId,
    #[schema(example = "407316554821")]
    pub number: String,
    pub issue_date: String,
    pub expiry_date: String,
    #[schema(example = "318")]
    pub cvv: String,
}

fn mask_number(number: &str) -> String {
    let visible = number.len().saturating_sub(4);
    format!("{}{}", "*".repeat(visible), &number[visible..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generated_numbers() {
        let now = chrono::Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        let card = CardNumbers::generate(now);
        assert_eq!(card.number.len(), CARD_NUMBER_LEN);
        assert!(card.number.bytes().all(|b| b.is_ascii_digit()));
        assert_eq!(card.issue_date, "03/26");
        assert_eq!(card.expiry_date, "03/2029");

        let cvv: u16 = generate_cvv().parse().unwrap();
        assert!((100..1000).contains(&cvv));
    }

    #[test]
    fn test_view_masks_number() {
        let now = chrono::Utc::now();
        let record = CardRecord {
            holder: 1,
            status: CardStatus::Active,
            number: Some("407316554821".into()),
            issue_date: Some("03/26".into()),
            expiry_date: Some("03/2029".into()),
            pin_hash: String::new(),
            verification: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(CardView::from(&record).number.as_deref(), Some("********4821"));
    }

    #[test]
    fn test_pin_must_be_digits() {
        assert!(CardRequest { pin: "0420".into() }.pin_is_numeric());
        assert!(!CardRequest { pin: "04a0".into() }.pin_is_numeric());
        assert!(!CardRequest { pin: "04200".into() }.pin_is_numeric());
    }
}
