//! Notification records

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core_types::{AccountId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Login,
    Transaction,
    Mpin,
    Card,
    Payment,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Login => "LOGIN",
            NotificationType::Transaction => "TRANSACTION",
            NotificationType::Mpin => "MPIN",
            NotificationType::Card => "CARD",
            NotificationType::Payment => "PAYMENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOGIN" => Some(NotificationType::Login),
            "TRANSACTION" => Some(NotificationType::Transaction),
            "MPIN" => Some(NotificationType::Mpin),
            "CARD" => Some(NotificationType::Card),
            "PAYMENT" => Some(NotificationType::Payment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Completed,
    Queued,
    Failed,
    Received,
    Created,
    Freeze,
    Unfreeze,
    Requested,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Completed => "COMPLETED",
            NotificationStatus::Queued => "QUEUED",
            NotificationStatus::Failed => "FAILED",
            NotificationStatus::Received => "RECEIVED",
            NotificationStatus::Created => "CREATED",
            NotificationStatus::Freeze => "FREEZE",
            NotificationStatus::Unfreeze => "UNFREEZE",
            NotificationStatus::Requested => "REQUESTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COMPLETED" => Some(NotificationStatus::Completed),
            "QUEUED" => Some(NotificationStatus::Queued),
            "FAILED" => Some(NotificationStatus::Failed),
            "RECEIVED" => Some(NotificationStatus::Received),
            "CREATED" => Some(NotificationStatus::Created),
            "FREEZE" => Some(NotificationStatus::Freeze),
            "UNFREEZE" => Some(NotificationStatus::Unfreeze),
            "REQUESTED" => Some(NotificationStatus::Requested),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(ulid::Ulid);

impl NotificationId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NotificationId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// Payload of the `notification` queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: AccountId,
    pub from: Option<AccountId>,
    pub to: Option<AccountId>,
    pub kind: NotificationType,
    pub status: NotificationStatus,
    pub message: String,
}

impl NewNotification {
    pub fn new(
        user_id: AccountId,
        kind: NotificationType,
        status: NotificationStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            from: None,
            to: None,
            kind,
            status,
            message: message.into(),
        }
    }

    pub fn between(mut self, from: AccountId, to: AccountId) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    #[schema(value_type = String, example = "01HZX3J8Q5M6V7N8P9R0S1T2U3")]
    pub id: NotificationId,
    pub user_id: AccountId,
    pub from: Option<AccountId>,
    pub to: Option<AccountId>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub status: NotificationStatus,
    pub message: String,
    pub read: bool,
    #[schema(value_type = String)]
    pub created_at: Timestamp,
}

impl Notification {
    pub fn from_new(new: NewNotification, created_at: Timestamp) -> Self {
        Self {
            id: NotificationId::new(),
            user_id: new.user_id,
            from: new.from,
            to: new.to,
            kind: new.kind,
            status: new.status,
            message: new.message,
            read: false,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_strings_parse_back() {
        for kind in [
            NotificationType::Login,
            NotificationType::Transaction,
            NotificationType::Payment,
        ] {
            assert_eq!(NotificationType::parse(kind.as_str()), Some(kind));
        }
        for status in [
            NotificationStatus::Requested,
            NotificationStatus::Received,
            NotificationStatus::Unfreeze,
        ] {
            assert_eq!(NotificationStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_wire_shape() {
        let n = Notification::from_new(
            NewNotification::new(
                1,
                NotificationType::Transaction,
                NotificationStatus::Completed,
                "Sent 3.00",
            )
            .between(1, 2),
            chrono::Utc::now(),
        );
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "TRANSACTION");
        assert_eq!(json["status"], "COMPLETED");
        assert_eq!(json["read"], false);
        assert_eq!(json["to"], 2);
    }
}
