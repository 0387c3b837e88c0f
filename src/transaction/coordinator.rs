//! Transaction Coordinator
//!
//! Drives the transaction state machine:
//!
//! ```text
//! PENDING ──verify──▶ QUEUED ──settle──▶ COMPLETED
//!    │                  │
//!    │                  └──precondition failed──▶ FAILED
//!    └──reject / token expired / email unavailable──▶ FAILED
//! ```
//!
//! Every transition is a conditional update at the store, so concurrent
//! callers racing on the same transaction see exactly one winner. Caches are
//! invalidated only after the write commits.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::account::validation::normalize_email;
use crate::cache::TransactionListCache;
use crate::core_types::{AccountId, CURRENCY_DECIMALS, Clock, MinorUnits, Timestamp};
use crate::email::{EmailJob, EmailTemplate, verification_url};
use crate::money::format_amount;
use crate::notification::{NewNotification, NotificationStatus, NotificationType};
use crate::queue::{Job, JobQueue};
use crate::token::{IssuedToken, TokenPurpose, TokenService};

use super::error::TransactionError;
use super::state::{FailureReason, TransactionStatus, TransactionType};
use super::store::LedgerStore;
use super::types::{
    Account, AccountLookup, ListQuery, MIN_DESCRIPTION_LEN, NewTransaction, SettlementOutcome,
    Transaction, TransactionId, TransactionPatch,
};

pub struct TransactionCoordinator {
    store: Arc<dyn LedgerStore>,
    tokens: TokenService,
    lists: TransactionListCache,
    queue: Arc<dyn JobQueue>,
    clock: Arc<dyn Clock>,
    base_url: String,
}

impl TransactionCoordinator {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        tokens: TokenService,
        lists: TransactionListCache,
        queue: Arc<dyn JobQueue>,
        clock: Arc<dyn Clock>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            tokens,
            lists,
            queue,
            clock,
            base_url: base_url.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    // ========================================================================
    // Transfers
    // ========================================================================

    /// Create a PENDING transfer and email its verification link to the sender.
    ///
    /// Returns once the email job is queued; delivery is not awaited. No
    /// balance check happens here: the balance is checked at settlement.
    pub async fn initiate_transfer(
        &self,
        sender_id: AccountId,
        receiver_email: &str,
        amount: MinorUnits,
        description: Option<String>,
    ) -> Result<Transaction, TransactionError> {
        if amount == 0 {
            return Err(TransactionError::InvalidAmount);
        }
        let description = normalize_description(description)?;

        let sender = self.verified_caller(sender_id).await?;
        let receiver = self.verified_counterparty(receiver_email).await?;
        if sender.id == receiver.id {
            return Err(TransactionError::SameAccount);
        }

        let issued = self.tokens.issue();
        let tx = self
            .store
            .create_transaction(
                NewTransaction {
                    from: sender.id,
                    to: receiver.id,
                    amount,
                    description,
                    tx_type: TransactionType::Transfer,
                    status: TransactionStatus::Pending,
                    verification: Some(issued.stored.clone()),
                },
                self.clock.now(),
            )
            .await?;

        let detail = format!(
            "You are sending {} to {}.",
            format_amount(amount, CURRENCY_DECIMALS),
            receiver.email
        );
        if let Err(e) = self.send_verification_email(&sender, &issued, detail).await {
            error!(transaction_id = %tx.id, error = %e, "Verification email enqueue failed");
            // Nobody can ever learn the token: close the transaction
            self.store
                .update_transaction(
                    tx.id,
                    TransactionPatch::fail(FailureReason::EmailUnavailable),
                    Some(TransactionStatus::Pending),
                    self.clock.now(),
                )
                .await?;
            return Err(e);
        }

        info!(
            transaction_id = %tx.id,
            from = sender.id,
            to = receiver.id,
            amount,
            "Transfer initiated"
        );

        self.notify(
            NewNotification::new(
                sender.id,
                NotificationType::Transaction,
                NotificationStatus::Created,
                format!(
                    "Transfer of {} to {} is waiting for email confirmation",
                    format_amount(amount, CURRENCY_DECIMALS),
                    receiver.first_name
                ),
            )
            .between(sender.id, receiver.id),
        )
        .await;

        Ok(tx)
    }

    /// Consume a verification token and hand the transaction to settlement.
    ///
    /// Unknown, expired and already-used tokens are all `TransactionNotFound`.
    pub async fn verify_transfer(&self, plaintext: &str) -> Result<Transaction, TransactionError> {
        let hash = self
            .tokens
            .verify(plaintext)
            .map_err(|_| TransactionError::TransactionNotFound)?;

        let consumed = self
            .store
            .consume_verification(&hash, self.clock.now())
            .await?
            .ok_or(TransactionError::TransactionNotFound)?;
        let tx = consumed.transaction;

        let job = Job::Settlement {
            transaction_id: tx.id,
        };
        if let Err(e) = self.queue.enqueue(job).await {
            error!(transaction_id = %tx.id, error = %e, "Settlement enqueue failed, restoring PENDING");
            let restored = self
                .store
                .update_transaction(
                    tx.id,
                    TransactionPatch::status(TransactionStatus::Pending).with_token(consumed.token),
                    Some(TransactionStatus::Queued),
                    self.clock.now(),
                )
                .await;
            match restored {
                Ok(Some(_)) => {}
                // The recovery sweep re-enqueues anything left in QUEUED
                Ok(None) => warn!(transaction_id = %tx.id, "Compensation found no QUEUED row"),
                Err(store_err) => {
                    error!(transaction_id = %tx.id, error = %store_err, "Compensation failed")
                }
            }
            return Err(e.into());
        }

        info!(transaction_id = %tx.id, "Transaction verified and queued for settlement");
        self.lists.invalidate_parties(&tx).await;
        Ok(tx)
    }

    /// Queue consumer entry point. Safe under redelivery: anything not in
    /// QUEUED is left untouched.
    pub async fn settle_transaction(
        &self,
        id: TransactionId,
    ) -> Result<TransactionStatus, TransactionError> {
        let outcome = self
            .store
            .apply_settlement(id, self.clock.now())
            .await?
            .ok_or(TransactionError::TransactionNotFound)?;

        let tx = match outcome {
            SettlementOutcome::Skipped(tx) => {
                debug!(transaction_id = %id, status = %tx.status, "Settlement skipped, not QUEUED");
                return Ok(tx.status);
            }
            SettlementOutcome::Completed(tx) => {
                info!(transaction_id = %id, from = tx.from, to = tx.to, amount = tx.amount, "Transaction completed");
                let amount = format_amount(tx.amount, CURRENCY_DECIMALS);
                self.notify(
                    NewNotification::new(
                        tx.from,
                        NotificationType::Transaction,
                        NotificationStatus::Completed,
                        format!("You sent {}", amount),
                    )
                    .between(tx.from, tx.to),
                )
                .await;
                self.notify(
                    NewNotification::new(
                        tx.to,
                        NotificationType::Transaction,
                        NotificationStatus::Received,
                        format!("You received {}", amount),
                    )
                    .between(tx.from, tx.to),
                )
                .await;
                tx
            }
            SettlementOutcome::Failed(tx) => {
                let reason = tx.failure_reason.map(|r| r.as_str()).unwrap_or("UNKNOWN");
                warn!(transaction_id = %id, reason, "Transaction failed at settlement");
                self.notify(
                    NewNotification::new(
                        tx.from,
                        NotificationType::Transaction,
                        NotificationStatus::Failed,
                        format!(
                            "Transfer of {} failed: {}",
                            format_amount(tx.amount, CURRENCY_DECIMALS),
                            reason
                        ),
                    )
                    .between(tx.from, tx.to),
                )
                .await;
                tx
            }
        };

        self.lists.invalidate_parties(&tx).await;
        Ok(tx.status)
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Record that `requester_id` asks `counterparty_email` for money.
    ///
    /// Creates a PENDING REQUEST with `from = counterparty`, `to = requester`
    /// and no token; a token is issued only on approval.
    pub async fn request_money(
        &self,
        requester_id: AccountId,
        counterparty_email: &str,
        amount: MinorUnits,
        description: Option<String>,
    ) -> Result<Transaction, TransactionError> {
        if amount == 0 {
            return Err(TransactionError::InvalidAmount);
        }
        let description = normalize_description(description)?;

        let requester = self.verified_caller(requester_id).await?;
        let counterparty = self.verified_counterparty(counterparty_email).await?;
        if requester.id == counterparty.id {
            return Err(TransactionError::SameAccount);
        }

        let tx = self
            .store
            .create_transaction(
                NewTransaction {
                    from: counterparty.id,
                    to: requester.id,
                    amount,
                    description,
                    tx_type: TransactionType::Request,
                    status: TransactionStatus::Pending,
                    verification: None,
                },
                self.clock.now(),
            )
            .await?;

        info!(transaction_id = %tx.id, from = tx.from, to = tx.to, amount, "Money requested");
        self.lists.invalidate_user(requester.id).await;

        self.notify(
            NewNotification::new(
                counterparty.id,
                NotificationType::Payment,
                NotificationStatus::Requested,
                format!(
                    "{} requested {}",
                    requester.first_name,
                    format_amount(amount, CURRENCY_DECIMALS)
                ),
            )
            .between(tx.from, tx.to),
        )
        .await;

        Ok(tx)
    }

    /// Approve a PENDING request: issue a token and email it to the payer.
    ///
    /// Approving again re-issues the token (the previous one stops working).
    pub async fn approve_request(
        &self,
        id: TransactionId,
        approver_id: AccountId,
    ) -> Result<Transaction, TransactionError> {
        let tx = self.pending_request_for(id, approver_id).await?;
        let payer = self
            .store
            .find_account(AccountLookup::Id(tx.from))
            .await?
            .ok_or(TransactionError::AccountNotFound)?;

        let issued = self.tokens.issue();
        let tx = self
            .store
            .update_transaction(
                id,
                TransactionPatch::default().with_token(issued.stored.clone()),
                Some(TransactionStatus::Pending),
                self.clock.now(),
            )
            .await?
            .ok_or(TransactionError::TransactionNotFound)?;
        self.lists.invalidate_parties(&tx).await;

        let detail = format!(
            "You are paying {} requested by account {}.",
            format_amount(tx.amount, CURRENCY_DECIMALS),
            tx.to
        );
        if let Err(e) = self.send_verification_email(&payer, &issued, detail).await {
            error!(transaction_id = %id, error = %e, "Verification email enqueue failed");
            // Back to "not yet approved" so the request can be approved again
            let mut revert = TransactionPatch::default();
            revert.verification = Some(None);
            self.store
                .update_transaction(id, revert, Some(TransactionStatus::Pending), self.clock.now())
                .await?;
            self.lists.invalidate_parties(&tx).await;
            return Err(e);
        }

        info!(transaction_id = %id, approver = approver_id, "Request approved");

        self.notify(
            NewNotification::new(
                payer.id,
                NotificationType::Payment,
                NotificationStatus::Queued,
                format!(
                    "Confirm the payment of {} from your email",
                    format_amount(tx.amount, CURRENCY_DECIMALS)
                ),
            )
            .between(tx.from, tx.to),
        )
        .await;

        Ok(tx)
    }

    /// Reject a PENDING request. No token, no settlement.
    pub async fn reject_request(
        &self,
        id: TransactionId,
        approver_id: AccountId,
    ) -> Result<Transaction, TransactionError> {
        self.pending_request_for(id, approver_id).await?;

        let tx = self
            .store
            .update_transaction(
                id,
                TransactionPatch::fail(FailureReason::Rejected),
                Some(TransactionStatus::Pending),
                self.clock.now(),
            )
            .await?
            .ok_or(TransactionError::TransactionNotFound)?;

        info!(transaction_id = %id, approver = approver_id, "Request rejected");
        self.lists.invalidate_parties(&tx).await;

        self.notify(
            NewNotification::new(
                tx.from,
                NotificationType::Payment,
                NotificationStatus::Failed,
                format!(
                    "Request for {} was rejected",
                    format_amount(tx.amount, CURRENCY_DECIMALS)
                ),
            )
            .between(tx.from, tx.to),
        )
        .await;

        Ok(tx)
    }

    /// Re-issue the verification token of a PENDING transaction that already
    /// had one, overwriting it.
    pub async fn resend_verification(
        &self,
        id: TransactionId,
        owner_id: AccountId,
    ) -> Result<Transaction, TransactionError> {
        let tx = self
            .store
            .find_transaction(id)
            .await?
            .filter(|tx| {
                tx.initiator() == owner_id
                    && tx.status == TransactionStatus::Pending
                    && tx.verification.is_some()
            })
            .ok_or(TransactionError::TransactionNotFound)?;

        let payer = self
            .store
            .find_account(AccountLookup::Id(tx.from))
            .await?
            .ok_or(TransactionError::AccountNotFound)?;

        let issued = self.tokens.issue();
        let tx = self
            .store
            .update_transaction(
                id,
                TransactionPatch::default().with_token(issued.stored.clone()),
                Some(TransactionStatus::Pending),
                self.clock.now(),
            )
            .await?
            .ok_or(TransactionError::TransactionNotFound)?;

        let detail = format!(
            "A new confirmation link for {}.",
            format_amount(tx.amount, CURRENCY_DECIMALS)
        );
        self.send_verification_email(&payer, &issued, detail).await?;

        info!(transaction_id = %id, "Verification token re-issued");
        Ok(tx)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_transaction(
        &self,
        id: TransactionId,
        user_id: AccountId,
    ) -> Result<Transaction, TransactionError> {
        self.store
            .find_transaction(id)
            .await?
            .filter(|tx| tx.involves(user_id))
            .ok_or(TransactionError::TransactionNotFound)
    }

    pub async fn list_completed(&self, user_id: AccountId) -> Result<Vec<Transaction>, TransactionError> {
        self.read_through(ListQuery::Completed(user_id)).await
    }

    pub async fn list_requested(&self, user_id: AccountId) -> Result<Vec<Transaction>, TransactionError> {
        self.read_through(ListQuery::Requested(user_id)).await
    }

    async fn read_through(&self, query: ListQuery) -> Result<Vec<Transaction>, TransactionError> {
        if let Some(hit) = self.lists.get(query).await {
            return Ok(hit);
        }
        let list = self.store.list_transactions(query).await?;
        self.lists.put(query, &list).await;
        Ok(list)
    }

    // ========================================================================
    // Deposit (mock funding)
    // ========================================================================

    /// Credit an account directly and record a COMPLETED DEPOSIT.
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: MinorUnits,
    ) -> Result<Transaction, TransactionError> {
        if amount == 0 {
            return Err(TransactionError::InvalidAmount);
        }
        let tx = self
            .store
            .record_deposit(account_id, amount, self.clock.now())
            .await?;

        info!(transaction_id = %tx.id, account_id, amount, "Deposit recorded");
        self.lists.invalidate_user(account_id).await;
        Ok(tx)
    }

    // ========================================================================
    // Recovery
    // ========================================================================

    /// Re-enqueue settlement for transactions stuck in QUEUED for longer
    /// than `stale_after`. Returns how many were re-enqueued.
    pub async fn requeue_stale(
        &self,
        stale_after: chrono::Duration,
        limit: usize,
    ) -> Result<usize, TransactionError> {
        let older_than: Timestamp = self.clock.now() - stale_after;
        let stale = self.store.find_stale_queued(older_than, limit).await?;
        let mut requeued = 0;

        for tx in stale {
            // Touch updated_at so the next sweep does not pick it up again at once
            let touched = self
                .store
                .update_transaction(
                    tx.id,
                    TransactionPatch::default(),
                    Some(TransactionStatus::Queued),
                    self.clock.now(),
                )
                .await?;
            if touched.is_none() {
                continue;
            }

            match self
                .queue
                .enqueue(Job::Settlement {
                    transaction_id: tx.id,
                })
                .await
            {
                Ok(_) => {
                    warn!(transaction_id = %tx.id, "Re-enqueued stale QUEUED transaction");
                    requeued += 1;
                }
                Err(e) => {
                    error!(transaction_id = %tx.id, error = %e, "Re-enqueue failed");
                    return Err(e.into());
                }
            }
        }

        Ok(requeued)
    }

    /// Fail PENDING transactions whose verification token has expired.
    pub async fn expire_pending(&self, limit: usize) -> Result<usize, TransactionError> {
        let now = self.clock.now();
        let expired = self.store.find_expired_pending(now, limit).await?;
        let mut failed = 0;

        for candidate in expired {
            let Some(tx) = self
                .store
                .update_transaction(
                    candidate.id,
                    TransactionPatch::fail(FailureReason::TokenExpired),
                    Some(TransactionStatus::Pending),
                    now,
                )
                .await?
            else {
                continue;
            };

            info!(transaction_id = %tx.id, "Verification expired, transaction failed");
            failed += 1;
            self.lists.invalidate_parties(&tx).await;
            self.notify(
                NewNotification::new(
                    tx.initiator(),
                    NotificationType::Transaction,
                    NotificationStatus::Failed,
                    format!(
                        "Confirmation of {} expired",
                        format_amount(tx.amount, CURRENCY_DECIMALS)
                    ),
                )
                .between(tx.from, tx.to),
            )
            .await;
        }

        Ok(failed)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn verified_caller(&self, id: AccountId) -> Result<Account, TransactionError> {
        self.store
            .find_account(AccountLookup::Id(id))
            .await?
            .filter(|a| a.verified)
            .ok_or(TransactionError::Unauthorized)
    }

    async fn verified_counterparty(&self, email: &str) -> Result<Account, TransactionError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(TransactionError::Validation("email is required".into()));
        }
        self.store
            .find_account(AccountLookup::Email(&email))
            .await?
            .filter(|a| a.verified)
            .ok_or(TransactionError::AccountNotFound)
    }

    async fn pending_request_for(
        &self,
        id: TransactionId,
        approver_id: AccountId,
    ) -> Result<Transaction, TransactionError> {
        self.store
            .find_transaction(id)
            .await?
            .filter(|tx| {
                tx.to == approver_id
                    && tx.tx_type == TransactionType::Request
                    && tx.status == TransactionStatus::Pending
            })
            .ok_or(TransactionError::TransactionNotFound)
    }

    async fn send_verification_email(
        &self,
        recipient: &Account,
        issued: &IssuedToken,
        detail: String,
    ) -> Result<(), TransactionError> {
        let link = verification_url(&self.base_url, TokenPurpose::TransactionVerify, &issued.plaintext);
        let job = EmailJob::new(
            recipient.email.clone(),
            recipient.first_name.clone(),
            EmailTemplate::TransactionVerify,
        )
        .with_link(link)
        .with_detail(detail);
        self.queue.enqueue(Job::Email(job)).await?;
        Ok(())
    }

    /// Notifications are informational: a failed enqueue is logged only.
    async fn notify(&self, notification: NewNotification) {
        let user_id = notification.user_id;
        if let Err(e) = self.queue.enqueue(Job::Notification(notification)).await {
            warn!(user_id, error = %e, "Notification enqueue failed");
        }
    }
}

fn normalize_description(description: Option<String>) -> Result<Option<String>, TransactionError> {
    match description.map(|d| d.trim().to_string()) {
        None => Ok(None),
        Some(d) if d.is_empty() => Ok(None),
        Some(d) if d.chars().count() < MIN_DESCRIPTION_LEN => {
            Err(TransactionError::DescriptionTooShort {
                min: MIN_DESCRIPTION_LEN,
            })
        }
        Some(d) => Ok(Some(d)),
    }
}
