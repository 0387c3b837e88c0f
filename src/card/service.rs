//! Card issuance: request with a PIN, confirm through the emailed link
//!
//! The card token follows the same rules as every other token: requesting
//! again while PENDING overwrites it, and activation consumes it in the
//! write that assigns the card number.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::account::CredentialStore;
use crate::account::service::hash_password;
use crate::account::validation::validate_request;
use crate::core_types::{AccountId, Clock};
use crate::email::{EmailJob, EmailTemplate, verification_url};
use crate::notification::{NewNotification, NotificationStatus, NotificationType};
use crate::queue::{Job, JobQueue};
use crate::token::{TokenPurpose, TokenService};
use crate::transaction::StoreError;

use super::error::CardError;
use super::models::{CardNumbers, CardRequest, CardStatus, CardView, IssuedCard, generate_cvv};
use super::store::CardStore;

/// Fresh numbers drawn when the first collides with an issued card
const NUMBER_ATTEMPTS: usize = 5;

pub struct CardService {
    cards: Arc<dyn CardStore>,
    accounts: Arc<dyn CredentialStore>,
    tokens: TokenService,
    queue: Arc<dyn JobQueue>,
    clock: Arc<dyn Clock>,
    base_url: String,
}

impl CardService {
    pub fn new(
        cards: Arc<dyn CardStore>,
        accounts: Arc<dyn CredentialStore>,
        tokens: TokenService,
        queue: Arc<dyn JobQueue>,
        clock: Arc<dyn Clock>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            cards,
            accounts,
            tokens,
            queue,
            clock,
            base_url: base_url.into(),
        }
    }

    /// Store a PENDING card and email the activation link
    pub async fn request_card(&self, holder: AccountId, req: CardRequest) -> Result<CardView, CardError> {
        validate_request(&req)?;
        if !req.pin_is_numeric() {
            return Err(CardError::Validation("pin: must be 4 digits".into()));
        }
        let account = self
            .accounts
            .find_by_id(holder)
            .await?
            .ok_or(CardError::Unauthorized)?;
        if let Some(card) = self.cards.find_by_holder(holder).await?
            && card.status == CardStatus::Active
        {
            return Err(CardError::AlreadyIssued);
        }

        let pin_hash = hash_password(&req.pin)?;
        let issued = self.tokens.issue();
        let card = self
            .cards
            .upsert_application(holder, pin_hash, issued.stored, self.clock.now())
            .await?;

        let link = verification_url(&self.base_url, TokenPurpose::CardVerify, &issued.plaintext);
        let job = EmailJob::new(account.email, account.first_name, EmailTemplate::CardVerify).with_link(link);
        if let Err(e) = self.queue.enqueue(Job::Email(job)).await {
            // the stored token is unusable without its email; requesting again replaces it
            error!(holder, error = %e, "Card email enqueue failed");
            return Err(e.into());
        }

        info!(holder, "Card requested");
        Ok(CardView::from(&card))
    }

    /// Consume the activation token and assign number, dates and CVV
    pub async fn verify_card(&self, plaintext: &str) -> Result<IssuedCard, CardError> {
        let hash = self
            .tokens
            .verify(plaintext)
            .map_err(|_| CardError::InvalidToken)?;

        let mut attempt = 0;
        let card = loop {
            attempt += 1;
            let now = self.clock.now();
            match self.cards.activate(&hash, &CardNumbers::generate(now), now).await {
                Ok(Some(card)) => break card,
                Ok(None) => return Err(CardError::InvalidToken),
                Err(StoreError::Conflict(_)) if attempt < NUMBER_ATTEMPTS => {
                    warn!(attempt, "Card number collision, drawing again");
                }
                Err(StoreError::Conflict(msg)) => return Err(CardError::SystemError(msg)),
                Err(e) => return Err(e.into()),
            }
        };

        let (Some(number), Some(issue_date), Some(expiry_date)) =
            (card.number, card.issue_date, card.expiry_date)
        else {
            return Err(CardError::SystemError("activated card without number".into()));
        };

        info!(holder = card.holder, "Card activated");
        let notification = NewNotification::new(
            card.holder,
            NotificationType::Card,
            NotificationStatus::Created,
            format!("Your card ending in {} is active", &number[number.len().saturating_sub(4)..]),
        );
        if let Err(e) = self.queue.enqueue(Job::Notification(notification)).await {
            warn!(holder = card.holder, error = %e, "Notification enqueue failed");
        }

        Ok(IssuedCard {
            holder: card.holder,
            number,
            issue_date,
            expiry_date,
            cvv: generate_cvv(),
        })
    }

    pub async fn get_card(&self, holder: AccountId) -> Result<CardView, CardError> {
        self.cards
            .find_by_holder(holder)
            .await?
            .map(|card| CardView::from(&card))
            .ok_or(CardError::NotFound)
    }
}
