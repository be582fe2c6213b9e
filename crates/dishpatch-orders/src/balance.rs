//! # Balance Ledger
//!
//! Moves money between accounts and records every movement.
//!
//! ## Double Entry
//! ```text
//! transfer(from = customer, to = owner, 50)
//!
//!   users                      ledger_entries (transfer_id = t)
//!   ─────────────────────      ─────────────────────────────────────────
//!   customer  100 → 50         payment  -50  subject=customer object=owner
//!   owner       0 → 50         receive  +50  subject=owner    object=customer
//!                                       ───
//!                                         0
//!
//! refund: the same shape from owner to customer, is_refund = true,
//!         and no balance check on the payer.
//! ```
//!
//! Every method takes the caller's transaction; nothing here commits.

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use dishpatch_core::validation::validate_recharge_amount;
use dishpatch_core::{LedgerAction, LedgerEntry, Money, ValidationError};
use dishpatch_db::{Database, Tx};

use crate::error::{OrderError, OrderResult};

/// One requested movement of money.
#[derive(Debug, Clone, Copy)]
pub struct Transfer<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub amount: Money,
    pub order_id: Option<&'a str>,
    /// Refunds reverse an earlier valid transfer and skip the balance check.
    pub is_refund: bool,
}

/// The two rows written for a transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub transfer_id: String,
    pub payment: LedgerEntry,
    pub receive: LedgerEntry,
}

#[derive(Debug, Clone)]
pub struct BalanceLedger {
    db: Database,
}

impl BalanceLedger {
    pub fn new(db: Database) -> Self {
        BalanceLedger { db }
    }

    /// Moves `amount` from `from` to `to` and appends the ledger pair.
    ///
    /// ## Errors
    /// * `InsufficientBalance` - non-refund and the payer cannot cover it
    /// * `NotFound` - either account is missing
    /// * `Validation` - negative amount
    pub async fn transfer(&self, tx: &mut Tx, t: Transfer<'_>) -> OrderResult<TransferReceipt> {
        if t.amount.is_negative() {
            return Err(ValidationError::MustBePositive {
                field: "amount".to_string(),
            }
            .into());
        }

        let users = self.db.users();
        let amount = t.amount.units();

        if t.is_refund {
            users.debit_unchecked(tx, t.from, amount).await?;
        } else if !users.debit(tx, t.from, amount).await? {
            let payer = users
                .get_by_id_tx(tx, t.from)
                .await?
                .ok_or_else(|| OrderError::not_found("User", t.from))?;
            warn!(
                user_id = %t.from,
                available = payer.balance,
                required = amount,
                "Transfer rejected, insufficient balance"
            );
            return Err(OrderError::InsufficientBalance {
                user_id: t.from.to_string(),
                available: payer.balance(),
                required: t.amount,
            });
        }

        users.credit(tx, t.to, amount).await?;

        let transfer_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let row = |action, amount: Money, subject: &str, object: &str| LedgerEntry {
            id: Uuid::new_v4().to_string(),
            transfer_id: transfer_id.clone(),
            order_id: t.order_id.map(str::to_string),
            action,
            amount: amount.units(),
            subject_user_id: subject.to_string(),
            object_user_id: object.to_string(),
            is_refund: t.is_refund,
            created_at: now,
        };

        let payment = row(LedgerAction::Payment, -t.amount, t.from, t.to);
        let receive = row(LedgerAction::Receive, t.amount, t.to, t.from);

        let ledger = self.db.ledger();
        ledger.insert(tx, &payment).await?;
        ledger.insert(tx, &receive).await?;

        debug!(
            transfer_id = %transfer_id,
            from = %t.from,
            to = %t.to,
            amount,
            is_refund = t.is_refund,
            "Transfer recorded"
        );

        Ok(TransferReceipt {
            transfer_id,
            payment,
            receive,
        })
    }

    /// Tops up a balance and appends one `recharge` row (subject and
    /// object are both the user).
    pub async fn recharge(&self, tx: &mut Tx, user_id: &str, amount: Money) -> OrderResult<LedgerEntry> {
        validate_recharge_amount(amount.units())?;

        self.db.users().credit(tx, user_id, amount.units()).await?;

        let entry = LedgerEntry {
            id: Uuid::new_v4().to_string(),
            transfer_id: Uuid::new_v4().to_string(),
            order_id: None,
            action: LedgerAction::Recharge,
            amount: amount.units(),
            subject_user_id: user_id.to_string(),
            object_user_id: user_id.to_string(),
            is_refund: false,
            created_at: Utc::now(),
        };
        self.db.ledger().insert(tx, &entry).await?;

        debug!(user_id = %user_id, amount = amount.units(), "Recharge recorded");
        Ok(entry)
    }
}
