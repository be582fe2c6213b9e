//! # Ledger Repository
//!
//! Append-only monetary history. Rows are inserted, never updated or
//! deleted.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::pool::Tx;
use dishpatch_core::{LedgerEntry, LedgerLine};

const SELECT_ENTRY: &str = r#"
    SELECT
        id, transfer_id, order_id, action, amount,
        subject_user_id, object_user_id, is_refund, created_at
    FROM ledger_entries
"#;

/// Subject's rows joined with the counterparty's name.
const SELECT_LINE: &str = r#"
    SELECT
        l.id, l.transfer_id, l.order_id, l.action, l.amount,
        l.subject_user_id, l.object_user_id, l.is_refund, l.created_at,
        u.name AS counterparty_name
    FROM ledger_entries l
    JOIN users u ON u.id = l.object_user_id
"#;

#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Appends one row.
    pub async fn insert(&self, tx: &mut Tx, entry: &LedgerEntry) -> DbResult<()> {
        debug!(
            transfer_id = %entry.transfer_id,
            action = ?entry.action,
            amount = entry.amount,
            "Appending ledger entry"
        );

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id, transfer_id, order_id, action, amount,
                subject_user_id, object_user_id, is_refund, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.transfer_id)
        .bind(entry.order_id.as_deref())
        .bind(entry.action)
        .bind(entry.amount)
        .bind(&entry.subject_user_id)
        .bind(&entry.object_user_id)
        .bind(entry.is_refund)
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// A user's own rows (where they are the subject), newest first.
    pub async fn list_by_user(&self, user_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "{SELECT_ENTRY} WHERE subject_user_id = ?1 ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Like [`list_by_user`](Self::list_by_user), with the other party's
    /// name on each row. Recharges name the user themself.
    pub async fn history_for_user(&self, user_id: &str) -> DbResult<Vec<LedgerLine>> {
        let lines = sqlx::query_as::<_, LedgerLine>(&format!(
            "{SELECT_LINE} WHERE l.subject_user_id = ?1 ORDER BY l.created_at DESC, l.rowid DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Every row tied to an order, oldest first.
    pub async fn list_by_order(&self, order_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "{SELECT_ENTRY} WHERE order_id = ?1 ORDER BY created_at, rowid"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Both rows of one transfer.
    pub async fn list_by_transfer(&self, transfer_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "{SELECT_ENTRY} WHERE transfer_id = ?1 ORDER BY rowid"
        ))
        .bind(transfer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Net of a user's rows. Matches their balance when every balance
    /// change went through the ledger.
    pub async fn net_for_user(&self, user_id: &str) -> DbResult<i64> {
        let net: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE subject_user_id = ?1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(net)
    }
}
