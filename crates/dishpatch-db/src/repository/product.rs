//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Catalog reads, single and batched
//! - Owner edits (price, stock, name) and hard delete
//! - Guarded stock movements inside a transaction
//!
//! ## Stock Movements
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                            │
//! │                                                                     │
//! │  ❌ WRONG: read, check in Rust, write absolute value               │
//! │     SELECT quantity ...  → 3                                        │
//! │     UPDATE products SET quantity = 1 WHERE id = ?                   │
//! │     (two orders read 3 at once, both write 1, one unit oversold)    │
//! │                                                                     │
//! │  ✅ CORRECT: delta with the guard in the WHERE clause               │
//! │     UPDATE products SET quantity = quantity - 2                     │
//! │     WHERE id = ? AND quantity >= 2                                  │
//! │     (0 rows affected → not enough stock, caller rolls back)         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::Tx;
use dishpatch_core::Product;

const SELECT_PRODUCT: &str = r#"
    SELECT id, shop_id, owner_id, name, price, quantity, created_at, updated_at
    FROM products
"#;

/// Owner-editable product fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub quantity: Option<i64>,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.get_by_id("uuid-here").await?;
/// let menu = repo.list_by_shop(&shop_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets every product whose ID is in `ids`. Unknown IDs are skipped.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        fetch_many(&self.pool, ids).await
    }

    /// Like [`get_many`](Self::get_many), inside a transaction.
    pub async fn get_many_tx(&self, tx: &mut Tx, ids: &[String]) -> DbResult<Vec<Product>> {
        fetch_many(&mut **tx, ids).await
    }

    /// A shop's menu, by name.
    pub async fn list_by_shop(&self, shop_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "{SELECT_PRODUCT} WHERE shop_id = ?1 ORDER BY name"
        ))
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, shop_id, owner_id, name, price, quantity, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.shop_id)
        .bind(&product.owner_id)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.quantity)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Applies owner edits and returns the updated product.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update(&self, id: &str, changes: &ProductChanges) -> DbResult<Product> {
        debug!(id = %id, ?changes, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = COALESCE(?2, name),
                price = COALESCE(?3, price),
                quantity = COALESCE(?4, quantity),
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.price)
        .bind(changes.quantity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Removes a product for good.
    ///
    /// Orders keep their own snapshot of the line, so history survives.
    ///
    /// ## Returns
    /// * `Ok(true)` - Deleted
    /// * `Ok(false)` - No such product
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Takes `quantity` units out of stock if that many are there.
    ///
    /// ## Returns
    /// * `Ok(true)` - Decremented
    /// * `Ok(false)` - Not enough stock, or no such product; nothing changed
    pub async fn decrement_stock(&self, tx: &mut Tx, id: &str, quantity: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET quantity = quantity - ?2, updated_at = ?3
            WHERE id = ?1 AND quantity >= ?2
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Puts `quantity` units back.
    ///
    /// ## Returns
    /// * `Ok(false)` - The product has been deleted since; nothing to restore
    pub async fn restore_stock(&self, tx: &mut Tx, id: &str, quantity: i64) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET quantity = quantity + ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Current stock, or `None` for an unknown product.
    pub async fn stock(&self, id: &str) -> DbResult<Option<i64>> {
        let quantity: Option<i64> = sqlx::query_scalar("SELECT quantity FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(quantity)
    }
}

async fn fetch_many<'e, E>(executor: E, ids: &[String]) -> DbResult<Vec<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_PRODUCT);
    qb.push(" WHERE id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(")");

    let products = qb.build_query_as::<Product>().fetch_all(executor).await?;
    Ok(products)
}

/// Builds a new product with a fresh ID.
pub fn new_product(
    shop_id: impl Into<String>,
    owner_id: impl Into<String>,
    name: impl Into<String>,
    price: i64,
    quantity: i64,
) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4().to_string(),
        shop_id: shop_id.into(),
        owner_id: owner_id.into(),
        name: name.into(),
        price,
        quantity,
        created_at: now,
        updated_at: now,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::shop::new_shop;
    use crate::repository::user::new_user;
    use dishpatch_core::{Shop, UserRole};

    async fn setup() -> (Database, Shop) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let owner = new_user("Bo", UserRole::Owner, 0.0, 0.0);
        db.users().insert(&owner).await.unwrap();
        let shop = new_shop(&owner.id, "Noodle Bar", 0.0, 0.0);
        db.shops().insert(&shop).await.unwrap();
        (db, shop)
    }

    #[tokio::test]
    async fn test_get_many_skips_unknown() {
        let (db, shop) = setup().await;
        let a = new_product(&shop.id, &shop.owner_id, "Dumplings", 10, 5);
        let b = new_product(&shop.id, &shop.owner_id, "Tea", 4, 9);
        db.products().insert(&a).await.unwrap();
        db.products().insert(&b).await.unwrap();

        let ids = vec![a.id.clone(), "ghost".to_string(), b.id.clone()];
        let found = db.products().get_many(&ids).await.unwrap();
        assert_eq!(found.len(), 2);

        assert!(db.products().get_many(&[]).await.unwrap().is_empty());
        assert_eq!(db.products().list_by_shop(&shop.id).await.unwrap()[0].name, "Dumplings");
    }

    #[tokio::test]
    async fn test_decrement_never_goes_negative() {
        let (db, shop) = setup().await;
        let p = new_product(&shop.id, &shop.owner_id, "Dumplings", 10, 2);
        db.products().insert(&p).await.unwrap();
        let repo = db.products();

        let mut tx = db.begin().await.unwrap();
        assert!(!repo.decrement_stock(&mut tx, &p.id, 3).await.unwrap());
        assert!(repo.decrement_stock(&mut tx, &p.id, 2).await.unwrap());
        assert!(!repo.decrement_stock(&mut tx, &p.id, 1).await.unwrap());
        assert!(repo.restore_stock(&mut tx, &p.id, 1).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(repo.stock(&p.id).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (db, shop) = setup().await;
        let p = new_product(&shop.id, &shop.owner_id, "Dumplings", 10, 2);
        db.products().insert(&p).await.unwrap();

        let changes = ProductChanges {
            price: Some(12),
            ..Default::default()
        };
        let updated = db.products().update(&p.id, &changes).await.unwrap();
        assert_eq!(updated.price, 12);
        assert_eq!(updated.quantity, 2);
        assert_eq!(updated.name, "Dumplings");

        assert!(db.products().delete(&p.id).await.unwrap());
        assert!(!db.products().delete(&p.id).await.unwrap());

        let mut tx = db.begin().await.unwrap();
        assert!(!db.products().restore_stock(&mut tx, &p.id, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_constraint_rejects_negative_stock() {
        let (db, shop) = setup().await;
        let p = new_product(&shop.id, &shop.owner_id, "Dumplings", 10, -1);

        let err = db.products().insert(&p).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
