//! # Order Repository
//!
//! Persists orders and their line-item snapshot.
//!
//! ## Storage Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  orders row                                                         │
//! │  ├── scalar columns: status, charges, timestamps, ...              │
//! │  └── line_items TEXT: JSON array of LineSnapshot                   │
//! │        [{"product_id": "...", "name": "Dumplings",                  │
//! │          "unit_price": 10, "quantity": 3}]                          │
//! │                                                                     │
//! │  The snapshot is written once, at insert. Status changes only       │
//! │  touch the status and timestamp columns.                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::pool::Tx;
use dishpatch_core::{CancelInitiator, DeliveryType, LineSnapshot, Order, OrderStatus, OrderSummary};

const SELECT_ORDER: &str = r#"
    SELECT
        id, customer_id, shop_id, owner_id, status, delivery_type, distance_km,
        subtotal, delivery_fee, total, line_items, canceled_by,
        created_at, completed_at, canceled_at
    FROM orders
"#;

/// Listing query: the order plus both parties' names.
const SELECT_SUMMARY: &str = r#"
    SELECT
        o.id, o.customer_id, o.shop_id, o.owner_id, o.status, o.delivery_type,
        o.distance_km, o.subtotal, o.delivery_fee, o.total, o.line_items,
        o.canceled_by, o.created_at, o.completed_at, o.canceled_at,
        s.name AS shop_name, c.name AS customer_name
    FROM orders o
    JOIN shops s ON s.id = o.shop_id
    JOIN users c ON c.id = o.customer_id
"#;

/// Raw `orders` row, before the snapshot is parsed.
#[derive(Debug, sqlx::FromRow)]
struct OrderRecord {
    id: String,
    customer_id: String,
    shop_id: String,
    owner_id: String,
    status: OrderStatus,
    delivery_type: DeliveryType,
    distance_km: f64,
    subtotal: i64,
    delivery_fee: i64,
    total: i64,
    line_items: String,
    canceled_by: Option<CancelInitiator>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    canceled_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRecord> for Order {
    type Error = DbError;

    fn try_from(row: OrderRecord) -> DbResult<Self> {
        let line_items: Vec<LineSnapshot> = serde_json::from_str(&row.line_items)?;

        Ok(Order {
            id: row.id,
            customer_id: row.customer_id,
            shop_id: row.shop_id,
            owner_id: row.owner_id,
            status: row.status,
            delivery_type: row.delivery_type,
            distance_km: row.distance_km,
            subtotal: row.subtotal,
            delivery_fee: row.delivery_fee,
            total: row.total,
            line_items,
            canceled_by: row.canceled_by,
            created_at: row.created_at,
            completed_at: row.completed_at,
            canceled_at: row.canceled_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRecord {
    #[sqlx(flatten)]
    order: OrderRecord,
    shop_name: String,
    customer_name: String,
}

impl TryFrom<SummaryRecord> for OrderSummary {
    type Error = DbError;

    fn try_from(row: SummaryRecord) -> DbResult<Self> {
        Ok(OrderSummary {
            order: row.order.try_into()?,
            shop_name: row.shop_name,
            customer_name: row.customer_name,
        })
    }
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRecord>(&format!("{SELECT_ORDER} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Order::try_from).transpose()
    }

    /// Gets an order by ID inside a transaction.
    pub async fn get_by_id_tx(&self, tx: &mut Tx, id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRecord>(&format!("{SELECT_ORDER} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        row.map(Order::try_from).transpose()
    }

    /// Inserts a new order with its snapshot.
    pub async fn insert(&self, tx: &mut Tx, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, total = order.total, "Inserting order");

        let line_items = serde_json::to_string(&order.line_items)?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, customer_id, shop_id, owner_id, status, delivery_type, distance_km,
                subtotal, delivery_fee, total, line_items, canceled_by,
                created_at, completed_at, canceled_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&order.id)
        .bind(&order.customer_id)
        .bind(&order.shop_id)
        .bind(&order.owner_id)
        .bind(order.status)
        .bind(order.delivery_type)
        .bind(order.distance_km)
        .bind(order.subtotal)
        .bind(order.delivery_fee)
        .bind(order.total)
        .bind(line_items)
        .bind(order.canceled_by)
        .bind(order.created_at)
        .bind(order.completed_at)
        .bind(order.canceled_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Writes a status change made with [`Order::complete`] or
    /// [`Order::cancel`], but only if the stored row is still pending.
    ///
    /// ## Returns
    /// * `Ok(true)` - This call moved the order out of `pending`
    /// * `Ok(false)` - Someone else got there first; nothing changed
    pub async fn save_transition(&self, tx: &mut Tx, order: &Order) -> DbResult<bool> {
        debug!(id = %order.id, status = %order.status, "Saving order transition");

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?2, canceled_by = ?3, completed_at = ?4, canceled_at = ?5
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(&order.id)
        .bind(order.status)
        .bind(order.canceled_by)
        .bind(order.completed_at)
        .bind(order.canceled_at)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// A customer's orders, newest first, optionally filtered by status.
    pub async fn list_by_customer(
        &self,
        customer_id: &str,
        status: Option<OrderStatus>,
    ) -> DbResult<Vec<OrderSummary>> {
        self.list_where("o.customer_id", customer_id, status).await
    }

    /// A shop's orders, newest first, optionally filtered by status.
    pub async fn list_by_shop(
        &self,
        shop_id: &str,
        status: Option<OrderStatus>,
    ) -> DbResult<Vec<OrderSummary>> {
        self.list_where("o.shop_id", shop_id, status).await
    }

    async fn list_where(
        &self,
        column: &'static str,
        value: &str,
        status: Option<OrderStatus>,
    ) -> DbResult<Vec<OrderSummary>> {
        let sql = format!(
            "{SELECT_SUMMARY} WHERE {column} = ?1 AND (?2 IS NULL OR o.status = ?2) \
             ORDER BY o.created_at DESC, o.id"
        );

        let rows = sqlx::query_as::<_, SummaryRecord>(&sql)
            .bind(value)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(OrderSummary::try_from).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
