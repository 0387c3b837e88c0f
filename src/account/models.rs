//! Data models for user accounts

use serde::Serialize;
use utoipa::ToSchema;

use crate::core_types::{AccountId, CURRENCY_DECIMALS, MinorUnits, Timestamp};
use crate::money::format_amount;
use crate::token::StoredToken;
use crate::transaction::Account;

/// Full account row: credentials, ledger balance and pending tokens
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: AccountId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub user_name: String,
    pub email: String,
    /// Argon2 PHC string; empty for seeded accounts that cannot log in
    pub password_hash: String,
    pub balance: MinorUnits,
    pub verified: bool,
    pub email_token: Option<StoredToken>,
    pub reset_token: Option<StoredToken>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AccountRecord {
    /// The subset the transaction state machine works with
    pub fn ledger_view(&self) -> Account {
        Account {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            balance: self.balance,
            verified: self.verified,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: Option<String>,
    pub user_name: String,
    pub email: String,
    pub password_hash: String,
    pub email_token: StoredToken,
}

/// Public profile returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountProfile {
    pub id: AccountId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub user_name: String,
    pub email: String,
    /// Decimal string, 2 places
    #[schema(example = "120.50")]
    pub balance: String,
    pub verified: bool,
}

impl From<&AccountRecord> for AccountProfile {
    fn from(record: &AccountRecord) -> Self {
        Self {
            id: record.id,
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            user_name: record.user_name.clone(),
            email: record.email.clone(),
            balance: format_amount(record.balance, CURRENCY_DECIMALS),
            verified: record.verified,
        }
    }
}
