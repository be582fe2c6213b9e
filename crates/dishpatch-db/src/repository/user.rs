//! # User Repository
//!
//! Accounts and their balances.
//!
//! ## Balance Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Balances only move inside a transaction, through two statements:   │
//! │                                                                     │
//! │  debit   UPDATE users SET balance = balance - ?                     │
//! │          WHERE id = ? AND balance >= ?     ← 0 rows: cannot afford  │
//! │                                                                     │
//! │  credit  UPDATE users SET balance = balance + ?                     │
//! │          WHERE id = ?                      ← 0 rows: no such user   │
//! │                                                                     │
//! │  The guard lives in the WHERE clause, so two concurrent debits      │
//! │  can never both pass on the same funds. Refund debits skip the      │
//! │  guard and may leave a balance negative.                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::Tx;
use dishpatch_core::{User, UserRole};

const SELECT_USER: &str = r#"
    SELECT id, name, balance, latitude, longitude, role, created_at
    FROM users
"#;

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Gets a user by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Gets a user by ID inside a transaction.
    pub async fn get_by_id_tx(&self, tx: &mut Tx, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(user)
    }

    /// Inserts a new user.
    pub async fn insert(&self, user: &User) -> DbResult<User> {
        debug!(id = %user.id, name = %user.name, "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (id, name, balance, latitude, longitude, role, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(user.balance)
        .bind(user.latitude)
        .bind(user.longitude)
        .bind(user.role)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(user.clone())
    }

    /// Sets a user's location.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - User doesn't exist
    pub async fn update_location(&self, id: &str, latitude: f64, longitude: f64) -> DbResult<()> {
        debug!(id = %id, latitude, longitude, "Updating user location");

        let result = sqlx::query("UPDATE users SET latitude = ?2, longitude = ?3 WHERE id = ?1")
            .bind(id)
            .bind(latitude)
            .bind(longitude)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Subtracts `amount` if the balance covers it.
    ///
    /// ## Returns
    /// * `Ok(true)` - Debited
    /// * `Ok(false)` - Balance too low, or no such user; nothing changed
    pub async fn debit(&self, tx: &mut Tx, id: &str, amount: i64) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET balance = balance - ?2 WHERE id = ?1 AND balance >= ?2",
        )
        .bind(id)
        .bind(amount)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Subtracts `amount` with no balance guard. Refunds only.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - User doesn't exist
    pub async fn debit_unchecked(&self, tx: &mut Tx, id: &str, amount: i64) -> DbResult<()> {
        self.credit(tx, id, -amount).await
    }

    /// Adds `amount` to a balance.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - User doesn't exist
    pub async fn credit(&self, tx: &mut Tx, id: &str, amount: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET balance = balance + ?2 WHERE id = ?1")
            .bind(id)
            .bind(amount)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Current balance, or `None` for an unknown user.
    pub async fn balance(&self, id: &str) -> DbResult<Option<i64>> {
        let balance: Option<i64> = sqlx::query_scalar("SELECT balance FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(balance)
    }

    /// Sum of every balance. Conserved by transfers and refunds.
    pub async fn total_balance(&self) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(balance), 0) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }
}

/// Builds a new user with a fresh ID and zero balance.
pub fn new_user(name: impl Into<String>, role: UserRole, latitude: f64, longitude: f64) -> User {
    User {
        id: Uuid::new_v4().to_string(),
        name: name.into(),
        balance: 0,
        latitude,
        longitude,
        role,
        created_at: Utc::now(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn setup() -> (Database, User) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut user = new_user("Ada", UserRole::Customer, 24.78, 120.99);
        user.balance = 100;
        db.users().insert(&user).await.unwrap();
        (db, user)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let (db, user) = setup().await;

        let found = db.users().get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Ada");
        assert_eq!(found.balance, 100);
        assert_eq!(found.role, UserRole::Customer);

        assert!(db.users().get_by_id("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_debit_guards_balance() {
        let (db, user) = setup().await;
        let users = db.users();

        let mut tx = db.begin().await.unwrap();
        assert!(!users.debit(&mut tx, &user.id, 101).await.unwrap());
        assert!(users.debit(&mut tx, &user.id, 100).await.unwrap());
        assert!(!users.debit(&mut tx, &user.id, 1).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(users.balance(&user.id).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_credit_unknown_user() {
        let (db, _) = setup().await;

        let mut tx = db.begin().await.unwrap();
        let err = db.users().credit(&mut tx, "nobody", 5).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_unchecked_debit_can_go_negative() {
        let (db, user) = setup().await;

        let mut tx = db.begin().await.unwrap();
        db.users().debit_unchecked(&mut tx, &user.id, 130).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(db.users().balance(&user.id).await.unwrap(), Some(-30));
    }

    #[tokio::test]
    async fn test_update_location() {
        let (db, user) = setup().await;

        db.users().update_location(&user.id, 25.0, 121.5).await.unwrap();
        let found = db.users().get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(found.latitude, 25.0);
        assert_eq!(found.longitude, 121.5);

        assert!(db.users().update_location("nobody", 0.0, 0.0).await.is_err());
    }
}
