//! # Order Coordinator
//!
//! Runs every order operation as one atomic unit over the store.
//!
//! ## Create Order Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         create_order                                    │
//! │                                                                         │
//! │  validate + merge lines                      (no I/O)                   │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  BEGIN ─────────────────────────────────────────────────────────────┐   │
//! │  │ customer, shop, owner         NotFound                           │   │
//! │  │ reserve lines in shop         NotFound / InsufficientInventory   │   │
//! │  │ quote (distance, fee, total)                                     │   │
//! │  │ balance >= total ?            InsufficientBalance                │   │
//! │  │ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ mutations below ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─  │   │
//! │  │ decrement stock               WHERE quantity >= n                │   │
//! │  │ insert order + snapshot                                          │   │
//! │  │ transfer customer → owner     WHERE balance >= total             │   │
//! │  └ COMMIT ──────────── any error: ROLLBACK, nothing observable ─────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Complete and cancel follow the same shape; their status change is
//! guarded by `WHERE status = 'pending'`, so of two racing requests only
//! the first to commit wins and the other gets `Conflict`.

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use dishpatch_core::validation::{
    validate_location, validate_order_lines, validate_price, validate_stock,
};
use dishpatch_core::{
    CancelInitiator, DeliveryType, GeoPoint, LedgerEntry, LedgerLine, Money, Order, OrderDetail,
    OrderLine, OrderQuote, OrderStatus, OrderSummary, PricingEngine, PricingPolicy, Product,
    ValidationError,
};
use dishpatch_db::{Database, DbError, ProductChanges, Tx};

use crate::balance::{BalanceLedger, Transfer};
use crate::config::ServiceConfig;
use crate::error::{OrderError, OrderResult};
use crate::inventory::InventoryLedger;

/// A request to place an order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub customer_id: String,
    pub shop_id: String,
    pub delivery_type: DeliveryType,
    pub lines: Vec<OrderLine>,
}

/// Entry point for order operations.
///
/// ## Usage
/// ```rust,ignore
/// let coordinator = OrderCoordinator::new(db, PricingPolicy::default());
///
/// let order = coordinator
///     .create_order(CreateOrder {
///         customer_id,
///         shop_id,
///         delivery_type: DeliveryType::Delivery,
///         lines: vec![OrderLine::new(&product_id, 3)],
///     })
///     .await?;
///
/// coordinator.complete_order(&order.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OrderCoordinator {
    db: Database,
    pricing: PricingEngine,
    inventory: InventoryLedger,
    balances: BalanceLedger,
}

impl OrderCoordinator {
    pub fn new(db: Database, policy: PricingPolicy) -> Self {
        OrderCoordinator {
            pricing: PricingEngine::new(policy),
            inventory: InventoryLedger::new(db.clone()),
            balances: BalanceLedger::new(db.clone()),
            db,
        }
    }

    /// Opens the configured database and builds a coordinator over it.
    pub async fn connect(config: &ServiceConfig) -> OrderResult<Self> {
        let db = Database::new(config.db_config()).await?;
        Ok(Self::new(db, config.pricing))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    // =========================================================================
    // Order Lifecycle
    // =========================================================================

    /// Places an order and charges the customer.
    ///
    /// ## Errors
    /// * `Validation` - empty or malformed lines, or the customer owns the shop
    /// * `NotFound` - customer, shop or a product (in this shop) is missing
    /// * `InsufficientInventory` - names every product that is short
    /// * `InsufficientBalance` - the customer cannot cover the total
    /// * `TransactionFailure` - storage failed; nothing was written
    pub async fn create_order(&self, request: CreateOrder) -> OrderResult<Order> {
        let lines = validate_order_lines(&request.lines)?;

        let mut tx = self.db.begin().await?;
        match self.create_in(&mut tx, &request, &lines).await {
            Ok(order) => {
                tx.commit().await.map_err(DbError::from)?;
                info!(
                    order_id = %order.id,
                    customer_id = %order.customer_id,
                    shop_id = %order.shop_id,
                    total = order.total,
                    "Order created"
                );
                Ok(order)
            }
            Err(e) => {
                rollback(tx, "create_order").await;
                warn!(customer_id = %request.customer_id, error = %e, "Order rejected");
                Err(e)
            }
        }
    }

    async fn create_in(
        &self,
        tx: &mut Tx,
        request: &CreateOrder,
        lines: &[OrderLine],
    ) -> OrderResult<Order> {
        let customer = self
            .db
            .users()
            .get_by_id_tx(tx, &request.customer_id)
            .await?
            .ok_or_else(|| OrderError::not_found("User", &request.customer_id))?;

        let shop = self
            .db
            .shops()
            .get_by_id_tx(tx, &request.shop_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Shop", &request.shop_id))?;

        if shop.owner_id == customer.id {
            return Err(ValidationError::InvalidFormat {
                field: "customer_id".to_string(),
                reason: "cannot order from own shop".to_string(),
            }
            .into());
        }

        let snapshot = self
            .inventory
            .reserve_in(tx, lines, Some(shop.id.as_str()))
            .await?;

        let quote = self.pricing.quote(
            snapshot,
            request.delivery_type,
            customer.location(),
            shop.location(),
        )?;

        if !customer.can_afford(quote.total()) {
            return Err(OrderError::InsufficientBalance {
                available: customer.balance(),
                required: quote.total(),
                user_id: customer.id,
            });
        }

        let order = Order {
            id: Uuid::new_v4().to_string(),
            customer_id: customer.id.clone(),
            shop_id: shop.id.clone(),
            owner_id: shop.owner_id.clone(),
            status: OrderStatus::Pending,
            delivery_type: quote.delivery_type,
            distance_km: quote.distance_km,
            subtotal: quote.subtotal,
            delivery_fee: quote.delivery_fee,
            total: quote.total,
            line_items: quote.lines,
            canceled_by: None,
            created_at: Utc::now(),
            completed_at: None,
            canceled_at: None,
        };

        self.inventory.commit(tx, &order.line_items).await?;
        self.db.orders().insert(tx, &order).await?;
        self.balances
            .transfer(
                tx,
                Transfer {
                    from: &customer.id,
                    to: &shop.owner_id,
                    amount: order.total(),
                    order_id: Some(order.id.as_str()),
                    is_refund: false,
                },
            )
            .await?;

        Ok(order)
    }

    /// Prices `lines` between two points without writing anything.
    ///
    /// Products are looked up in the whole catalog; use
    /// [`preview_for`](Self::preview_for) to restrict them to one shop.
    pub async fn preview_order(
        &self,
        lines: &[OrderLine],
        delivery_type: DeliveryType,
        customer_location: GeoPoint,
        shop_location: GeoPoint,
    ) -> OrderResult<OrderQuote> {
        let lines = validate_order_lines(lines)?;
        let snapshot = self.inventory.reserve(&lines, None).await?;

        Ok(self
            .pricing
            .quote(snapshot, delivery_type, customer_location, shop_location)?)
    }

    /// Like [`preview_order`](Self::preview_order), with both locations and
    /// the product scope taken from stored records.
    pub async fn preview_for(
        &self,
        customer_id: &str,
        shop_id: &str,
        delivery_type: DeliveryType,
        lines: &[OrderLine],
    ) -> OrderResult<OrderQuote> {
        let lines = validate_order_lines(lines)?;

        let customer = self
            .db
            .users()
            .get_by_id(customer_id)
            .await?
            .ok_or_else(|| OrderError::not_found("User", customer_id))?;
        let shop = self
            .db
            .shops()
            .get_by_id(shop_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Shop", shop_id))?;

        let snapshot = self.inventory.reserve(&lines, Some(shop_id)).await?;

        Ok(self
            .pricing
            .quote(snapshot, delivery_type, customer.location(), shop.location())?)
    }

    /// Marks a pending order as completed.
    pub async fn complete_order(&self, order_id: &str) -> OrderResult<Order> {
        let mut tx = self.db.begin().await?;
        match self.complete_in(&mut tx, order_id).await {
            Ok(order) => {
                tx.commit().await.map_err(DbError::from)?;
                info!(order_id = %order_id, "Order completed");
                Ok(order)
            }
            Err(e) => {
                rollback(tx, "complete_order").await;
                Err(e)
            }
        }
    }

    async fn complete_in(&self, tx: &mut Tx, order_id: &str) -> OrderResult<Order> {
        let mut order = self.load_order(tx, order_id).await?;
        order.complete(Utc::now())?;
        self.save_transition(tx, &order).await?;
        Ok(order)
    }

    /// Cancels a pending order, refunds the customer and puts stock back.
    ///
    /// The refund and restock come from the order's snapshot, so later
    /// catalog edits or deletions do not change what is returned.
    pub async fn cancel_order(
        &self,
        order_id: &str,
        initiator: CancelInitiator,
    ) -> OrderResult<Order> {
        let mut tx = self.db.begin().await?;
        match self.cancel_in(&mut tx, order_id, initiator).await {
            Ok(order) => {
                tx.commit().await.map_err(DbError::from)?;
                info!(
                    order_id = %order_id,
                    initiator = ?initiator,
                    refunded = order.total,
                    "Order canceled"
                );
                Ok(order)
            }
            Err(e) => {
                rollback(tx, "cancel_order").await;
                Err(e)
            }
        }
    }

    async fn cancel_in(
        &self,
        tx: &mut Tx,
        order_id: &str,
        initiator: CancelInitiator,
    ) -> OrderResult<Order> {
        let mut order = self.load_order(tx, order_id).await?;
        order.cancel(initiator, Utc::now())?;
        self.save_transition(tx, &order).await?;

        self.balances
            .transfer(
                tx,
                Transfer {
                    from: &order.owner_id,
                    to: &order.customer_id,
                    amount: order.total(),
                    order_id: Some(order.id.as_str()),
                    is_refund: true,
                },
            )
            .await?;
        self.inventory.restore(tx, &order.line_items).await?;

        Ok(order)
    }

    async fn load_order(&self, tx: &mut Tx, order_id: &str) -> OrderResult<Order> {
        self.db
            .orders()
            .get_by_id_tx(tx, order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Order", order_id))
    }

    /// Writes the status change; a miss means another request got there first.
    async fn save_transition(&self, tx: &mut Tx, order: &Order) -> OrderResult<()> {
        if self.db.orders().save_transition(tx, order).await? {
            return Ok(());
        }

        let current = self
            .db
            .orders()
            .get_by_id_tx(tx, &order.id)
            .await?
            .map(|o| o.status)
            .unwrap_or(order.status);

        Err(OrderError::Conflict {
            order_id: order.id.clone(),
            status: current,
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Line items and charges as stored at creation.
    pub async fn get_order_detail(&self, order_id: &str) -> OrderResult<OrderDetail> {
        self.get_order(order_id).await.map(|o| o.detail())
    }

    pub async fn get_order(&self, order_id: &str) -> OrderResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Order", order_id))
    }

    /// A customer's orders, newest first, each naming the shop.
    pub async fn list_customer_orders(
        &self,
        customer_id: &str,
        status: Option<OrderStatus>,
    ) -> OrderResult<Vec<OrderSummary>> {
        Ok(self.db.orders().list_by_customer(customer_id, status).await?)
    }

    /// A shop's orders, newest first, each naming the customer.
    pub async fn list_shop_orders(
        &self,
        shop_id: &str,
        status: Option<OrderStatus>,
    ) -> OrderResult<Vec<OrderSummary>> {
        Ok(self.db.orders().list_by_shop(shop_id, status).await?)
    }

    /// Ledger rows where the user is the subject, newest first, each with
    /// the counterparty's name.
    pub async fn ledger_history(&self, user_id: &str) -> OrderResult<Vec<LedgerLine>> {
        if self.db.users().get_by_id(user_id).await?.is_none() {
            return Err(OrderError::not_found("User", user_id));
        }

        Ok(self.db.ledger().history_for_user(user_id).await?)
    }

    // =========================================================================
    // Accounts and Catalog
    // =========================================================================

    /// Adds `amount` to a user's balance.
    pub async fn recharge(&self, user_id: &str, amount: Money) -> OrderResult<LedgerEntry> {
        let mut tx = self.db.begin().await?;
        match self.balances.recharge(&mut tx, user_id, amount).await {
            Ok(entry) => {
                tx.commit().await.map_err(DbError::from)?;
                info!(user_id = %user_id, amount = amount.units(), "Balance recharged");
                Ok(entry)
            }
            Err(e) => {
                rollback(tx, "recharge").await;
                Err(e)
            }
        }
    }

    pub async fn update_location(
        &self,
        user_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> OrderResult<()> {
        validate_location(latitude, longitude)?;
        self.db
            .users()
            .update_location(user_id, latitude, longitude)
            .await?;
        Ok(())
    }

    /// Owner edit of a product. Existing orders keep their snapshot.
    pub async fn update_product(
        &self,
        product_id: &str,
        changes: ProductChanges,
    ) -> OrderResult<Product> {
        if let Some(price) = changes.price {
            validate_price(price)?;
        }
        if let Some(quantity) = changes.quantity {
            validate_stock(quantity)?;
        }
        if matches!(changes.name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(ValidationError::Required {
                field: "name".to_string(),
            }
            .into());
        }

        Ok(self.db.products().update(product_id, &changes).await?)
    }

    pub async fn delete_product(&self, product_id: &str) -> OrderResult<()> {
        if !self.db.products().delete(product_id).await? {
            return Err(OrderError::not_found("Product", product_id));
        }

        info!(product_id = %product_id, "Product deleted");
        Ok(())
    }
}

async fn rollback(tx: Tx, operation: &'static str) {
    if let Err(e) = tx.rollback().await {
        error!(operation, error = %e, "Rollback failed");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use dishpatch_core::pricing::EARTH_RADIUS_KM;
    use dishpatch_core::{LedgerAction, Shop, User, UserRole};
    use dishpatch_db::{new_product, new_shop, new_user, DbConfig};
    use tempfile::TempDir;

    struct Fixture {
        coordinator: OrderCoordinator,
        db: Database,
        customer: User,
        owner: User,
        shop: Shop,
        dumplings: Product,
    }

    /// Customer 2 km north of the shop with balance 100; dumplings cost 10.
    async fn setup(stock: i64) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed(db, stock).await
    }

    /// Same shape as [`setup`] over a file with a real pool, so
    /// transactions run on separate connections and can overlap.
    async fn setup_on_disk(stock: i64) -> (TempDir, Fixture) {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("orders.db")).max_connections(8);
        let db = Database::new(config).await.unwrap();
        (dir, seed(db, stock).await)
    }

    async fn seed(db: Database, stock: i64) -> Fixture {
        let mut customer = new_user(
            "Ada",
            UserRole::Customer,
            (2.0 / EARTH_RADIUS_KM).to_degrees(),
            0.0,
        );
        customer.balance = 100;
        let owner = new_user("Bo", UserRole::Owner, 0.0, 0.0);
        db.users().insert(&customer).await.unwrap();
        db.users().insert(&owner).await.unwrap();

        let shop = new_shop(&owner.id, "Noodle Bar", 0.0, 0.0);
        db.shops().insert(&shop).await.unwrap();

        let dumplings = new_product(&shop.id, &owner.id, "Dumplings", 10, stock);
        db.products().insert(&dumplings).await.unwrap();

        Fixture {
            coordinator: OrderCoordinator::new(db.clone(), PricingPolicy::default()),
            db,
            customer,
            owner,
            shop,
            dumplings,
        }
    }

    impl Fixture {
        fn request(&self, quantity: i64) -> CreateOrder {
            CreateOrder {
                customer_id: self.customer.id.clone(),
                shop_id: self.shop.id.clone(),
                delivery_type: DeliveryType::Delivery,
                lines: vec![OrderLine::new(&self.dumplings.id, quantity)],
            }
        }

        async fn balance(&self, user: &User) -> i64 {
            self.db.users().balance(&user.id).await.unwrap().unwrap()
        }

        async fn stock(&self) -> i64 {
            self.db
                .products()
                .stock(&self.dumplings.id)
                .await
                .unwrap()
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_create_order_charges_and_decrements() {
        let f = setup(10).await;

        let order = f.coordinator.create_order(f.request(3)).await.unwrap();

        assert_eq!(order.subtotal, 30);
        assert_eq!(order.delivery_fee, 20);
        assert_eq!(order.total, 50);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(f.balance(&f.customer).await, 50);
        assert_eq!(f.balance(&f.owner).await, 50);
        assert_eq!(f.stock().await, 7);

        let entries = f.db.ledger().list_by_order(&order.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.iter().map(|e| e.amount).sum::<i64>(), 0);
    }

    #[tokio::test]
    async fn test_cancel_restores_everything() {
        let f = setup(10).await;
        let order = f.coordinator.create_order(f.request(3)).await.unwrap();

        let canceled = f
            .coordinator
            .cancel_order(&order.id, CancelInitiator::Customer)
            .await
            .unwrap();

        assert_eq!(canceled.status, OrderStatus::Canceled);
        assert_eq!(canceled.canceled_by, Some(CancelInitiator::Customer));
        assert_eq!(f.balance(&f.customer).await, 100);
        assert_eq!(f.balance(&f.owner).await, 0);
        assert_eq!(f.stock().await, 10);

        let stored = f.coordinator.get_order(&order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Canceled);
        assert!(stored.canceled_at.is_some());

        let refunds: Vec<_> = f
            .db
            .ledger()
            .list_by_order(&order.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.is_refund)
            .collect();
        assert_eq!(refunds.len(), 2);
        assert_eq!(refunds.iter().map(|e| e.amount).sum::<i64>(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let f = setup(2).await;

        let err = f.coordinator.create_order(f.request(5)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientInventory);
        assert!(err.to_string().contains("Dumplings"));
        assert_eq!(f.balance(&f.customer).await, 100);
        assert_eq!(f.balance(&f.owner).await, 0);
        assert_eq!(f.stock().await, 2);
        assert!(f
            .coordinator
            .list_customer_orders(&f.customer.id, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_balance_changes_nothing() {
        let f = setup(20).await;

        // 10 x 10 + 20 fee = 120 > 100
        let err = f.coordinator.create_order(f.request(10)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
        assert_eq!(f.balance(&f.customer).await, 100);
        assert_eq!(f.stock().await, 20);
        assert!(f.db.ledger().list_by_user(&f.customer.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let f = setup(5).await;

        let mut request = f.request(1);
        request.shop_id = "no-such-shop".into();
        let err = f.coordinator.create_order(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut request = f.request(1);
        request.lines.push(OrderLine::new("no-such-product", 1));
        let err = f.coordinator.create_order(request).await.unwrap_err();
        assert!(matches!(err, OrderError::ProductsNotFound { .. }));

        let err = f.coordinator.get_order_detail("nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_product_from_other_shop_is_rejected() {
        let f = setup(5).await;
        let other_owner = new_user("Cy", UserRole::Owner, 0.0, 0.0);
        f.db.users().insert(&other_owner).await.unwrap();
        let other_shop = new_shop(&other_owner.id, "Taco Stand", 0.0, 0.0);
        f.db.shops().insert(&other_shop).await.unwrap();

        let mut request = f.request(1);
        request.shop_id = other_shop.id.clone();
        let err = f.coordinator.create_order(request).await.unwrap_err();

        assert!(matches!(err, OrderError::ProductsNotFound { .. }));
        assert_eq!(f.stock().await, 5);
    }

    #[tokio::test]
    async fn test_owner_cannot_order_from_own_shop() {
        let f = setup(5).await;
        let mut request = f.request(1);
        request.customer_id = f.owner.id.clone();

        let err = f.coordinator.create_order(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_merged() {
        let f = setup(4).await;
        let mut request = f.request(2);
        request.lines.push(OrderLine::new(&f.dumplings.id, 3));

        let err = f.coordinator.create_order(request.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientInventory);

        request.lines[1].quantity = 2;
        let order = f.coordinator.create_order(request).await.unwrap();
        assert_eq!(order.line_items.len(), 1);
        assert_eq!(order.line_items[0].quantity, 4);
        assert_eq!(f.stock().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_lines_are_rejected() {
        let f = setup(5).await;

        let mut request = f.request(0);
        let err = f.coordinator.create_order(request.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        request.lines.clear();
        let err = f.coordinator.create_order(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn test_pickup_has_no_fee() {
        let f = setup(5).await;
        let mut request = f.request(3);
        request.delivery_type = DeliveryType::Pickup;

        let order = f.coordinator.create_order(request).await.unwrap();
        assert_eq!(order.delivery_fee, 0);
        assert_eq!(order.total, 30);
        assert_eq!(f.balance(&f.customer).await, 70);
    }

    #[tokio::test]
    async fn test_terminal_orders_conflict() {
        let f = setup(10).await;

        let completed = f.coordinator.create_order(f.request(1)).await.unwrap();
        f.coordinator.complete_order(&completed.id).await.unwrap();

        let err = f
            .coordinator
            .cancel_order(&completed.id, CancelInitiator::Shop)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err = f.coordinator.complete_order(&completed.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let canceled = f.coordinator.create_order(f.request(1)).await.unwrap();
        f.coordinator
            .cancel_order(&canceled.id, CancelInitiator::Shop)
            .await
            .unwrap();

        let balance_after = f.balance(&f.customer).await;
        let stock_after = f.stock().await;

        let err = f
            .coordinator
            .cancel_order(&canceled.id, CancelInitiator::Customer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err = f.coordinator.complete_order(&canceled.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        assert_eq!(f.balance(&f.customer).await, balance_after);
        assert_eq!(f.stock().await, stock_after);

        let stored = f.coordinator.get_order(&canceled.id).await.unwrap();
        assert_eq!(stored.canceled_by, Some(CancelInitiator::Shop));
    }

    #[tokio::test]
    async fn test_preview_is_side_effect_free() {
        let f = setup(10).await;
        let lines = vec![OrderLine::new(&f.dumplings.id, 3)];
        let customer_at = f.customer.location();
        let shop_at = f.shop.location();

        let first = f
            .coordinator
            .preview_order(&lines, DeliveryType::Delivery, customer_at, shop_at)
            .await
            .unwrap();
        let second = f
            .coordinator
            .preview_order(&lines, DeliveryType::Delivery, customer_at, shop_at)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.total, 50);
        assert!((first.distance_km - 2.0).abs() < 1e-9);
        assert_eq!(f.stock().await, 10);
        assert_eq!(f.balance(&f.customer).await, 100);

        let stored = f
            .coordinator
            .preview_for(&f.customer.id, &f.shop.id, DeliveryType::Delivery, &lines)
            .await
            .unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn test_preview_reports_short_stock() {
        let f = setup(2).await;
        let err = f
            .coordinator
            .preview_order(
                &[OrderLine::new(&f.dumplings.id, 5)],
                DeliveryType::Pickup,
                f.customer.location(),
                f.shop.location(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientInventory);
    }

    #[tokio::test]
    async fn test_snapshot_survives_catalog_changes() {
        let f = setup(10).await;
        let order = f.coordinator.create_order(f.request(3)).await.unwrap();

        f.coordinator
            .update_product(
                &f.dumplings.id,
                ProductChanges {
                    name: Some("Pork Dumplings".into()),
                    price: Some(99),
                    quantity: None,
                },
            )
            .await
            .unwrap();

        let detail = f.coordinator.get_order_detail(&order.id).await.unwrap();
        assert_eq!(detail.lines[0].name, "Dumplings");
        assert_eq!(detail.lines[0].unit_price, 10);
        assert_eq!(detail.subtotal, 30);
        assert_eq!(detail.delivery_fee, 20);

        f.coordinator.delete_product(&f.dumplings.id).await.unwrap();
        f.coordinator
            .cancel_order(&order.id, CancelInitiator::Shop)
            .await
            .unwrap();

        assert_eq!(f.balance(&f.customer).await, 100);
        assert_eq!(f.balance(&f.owner).await, 0);
    }

    #[tokio::test]
    async fn test_refund_when_owner_spent_the_money() {
        let f = setup(10).await;
        let order = f.coordinator.create_order(f.request(3)).await.unwrap();

        // Owner spends the 50 elsewhere.
        let mut tx = f.db.begin().await.unwrap();
        f.db.users().debit(&mut tx, &f.owner.id, 50).await.unwrap();
        tx.commit().await.unwrap();

        f.coordinator
            .cancel_order(&order.id, CancelInitiator::Customer)
            .await
            .unwrap();

        assert_eq!(f.balance(&f.customer).await, 100);
        assert_eq!(f.balance(&f.owner).await, -50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_cannot_oversell() {
        let (_dir, f) = setup_on_disk(1).await;

        let mut requests = Vec::new();
        for i in 0..8 {
            let mut buyer = new_user(format!("Buyer {i}"), UserRole::Customer, 0.0, 0.0);
            buyer.balance = 100;
            f.db.users().insert(&buyer).await.unwrap();

            let mut request = f.request(1);
            request.customer_id = buyer.id;
            requests.push(request);
        }
        let start = f.db.users().total_balance().await.unwrap();

        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let coordinator = f.coordinator.clone();
                tokio::spawn(async move { coordinator.create_order(request).await })
            })
            .collect();

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(order) => winners.push(order),
                Err(e) => assert!(
                    e.kind() == ErrorKind::InsufficientInventory || e.is_retryable(),
                    "unexpected error: {e:?}"
                ),
            }
        }

        assert_eq!(winners.len(), 1);
        assert_eq!(f.stock().await, 0);
        assert_eq!(f.balance(&f.owner).await, winners[0].total);
        assert_eq!(f.db.users().total_balance().await.unwrap(), start);

        let orders = f.coordinator.list_shop_orders(&f.shop.id, None).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order.id, winners[0].id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_complete_and_cancel_race() {
        let (_dir, f) = setup_on_disk(10).await;
        let order = f.coordinator.create_order(f.request(3)).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let coordinator = f.coordinator.clone();
                let order_id = order.id.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        coordinator.complete_order(&order_id).await
                    } else {
                        coordinator
                            .cancel_order(&order_id, CancelInitiator::Customer)
                            .await
                    }
                })
            })
            .collect();

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(order) => winners.push(order),
                Err(e) => assert!(
                    e.kind() == ErrorKind::Conflict || e.is_retryable(),
                    "unexpected error: {e:?}"
                ),
            }
        }
        assert_eq!(winners.len(), 1);

        let stored = f.coordinator.get_order(&order.id).await.unwrap();
        assert_eq!(stored.status, winners[0].status);

        // Exactly one outcome applied: never a double refund or restock.
        match stored.status {
            OrderStatus::Completed => {
                assert_eq!(f.balance(&f.customer).await, 100 - order.total);
                assert_eq!(f.balance(&f.owner).await, order.total);
                assert_eq!(f.stock().await, 7);
            }
            OrderStatus::Canceled => {
                assert_eq!(f.balance(&f.customer).await, 100);
                assert_eq!(f.balance(&f.owner).await, 0);
                assert_eq!(f.stock().await, 10);
            }
            other => panic!("order left in {other:?}"),
        }

        let rows = f.db.ledger().list_by_order(&order.id).await.unwrap();
        let expected = if stored.status == OrderStatus::Canceled { 4 } else { 2 };
        assert_eq!(rows.len(), expected);
    }

    #[tokio::test]
    async fn test_money_is_conserved() {
        let f = setup(50).await;
        let start = f.db.users().total_balance().await.unwrap();

        let a = f.coordinator.create_order(f.request(2)).await.unwrap();
        let b = f.coordinator.create_order(f.request(1)).await.unwrap();
        f.coordinator.complete_order(&a.id).await.unwrap();
        f.coordinator
            .cancel_order(&b.id, CancelInitiator::Shop)
            .await
            .unwrap();

        assert_eq!(f.db.users().total_balance().await.unwrap(), start);

        let owner_net = f.db.ledger().net_for_user(&f.owner.id).await.unwrap();
        assert_eq!(owner_net, f.balance(&f.owner).await);
    }

    #[tokio::test]
    async fn test_recharge_and_history() {
        let f = setup(10).await;

        f.coordinator
            .recharge(&f.customer.id, Money::from_units(40))
            .await
            .unwrap();
        f.coordinator.create_order(f.request(3)).await.unwrap();

        assert_eq!(f.balance(&f.customer).await, 90);

        let history = f.coordinator.ledger_history(&f.customer.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].entry.action, LedgerAction::Payment);
        assert_eq!(history[0].counterparty_name, "Bo");
        assert_eq!(history[1].entry.action, LedgerAction::Recharge);
        assert_eq!(history[1].counterparty_name, "Ada");

        let err = f
            .coordinator
            .recharge(&f.customer.id, Money::from_units(-5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = f.coordinator.ledger_history("ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_listings_filter_by_status() {
        let f = setup(10).await;
        let first = f.coordinator.create_order(f.request(1)).await.unwrap();
        let second = f.coordinator.create_order(f.request(1)).await.unwrap();
        f.coordinator.complete_order(&first.id).await.unwrap();

        let all = f
            .coordinator
            .list_customer_orders(&f.customer.id, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|o| o.shop_name == "Noodle Bar"));

        let pending = f
            .coordinator
            .list_shop_orders(&f.shop.id, Some(OrderStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].order.id, second.id);
        assert_eq!(pending[0].customer_name, "Ada");

        let completed = f
            .coordinator
            .list_customer_orders(&f.customer.id, Some(OrderStatus::Completed))
            .await
            .unwrap();
        assert_eq!(completed[0].order.id, first.id);
    }

    #[tokio::test]
    async fn test_location_update_moves_delivery_fee() {
        let f = setup(10).await;

        let err = f
            .coordinator
            .update_location(&f.customer.id, 95.0, 0.0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        f.coordinator
            .update_location(&f.customer.id, 0.0, 0.0)
            .await
            .unwrap();

        // Same spot as the shop: minimum fee applies.
        let order = f.coordinator.create_order(f.request(1)).await.unwrap();
        assert_eq!(order.delivery_fee, 10);
    }

    #[tokio::test]
    async fn test_product_edits_are_validated() {
        let f = setup(10).await;

        let err = f
            .coordinator
            .update_product(
                &f.dumplings.id,
                ProductChanges {
                    price: Some(-1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let updated = f
            .coordinator
            .update_product(
                &f.dumplings.id,
                ProductChanges {
                    quantity: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.quantity, 3);
        assert_eq!(updated.price, 10);

        let err = f.coordinator.delete_product("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_overflowing_price_is_rejected_without_side_effects() {
        let f = setup(10).await;

        // Written straight to the store, skipping the price cap.
        let gold = new_product(&f.shop.id, &f.owner.id, "Gold Leaf", i64::MAX, 10);
        f.db.products().insert(&gold).await.unwrap();

        let mut two = f.request(1);
        two.delivery_type = DeliveryType::Pickup;
        two.lines = vec![OrderLine::new(&gold.id, 2)];
        let err = f.coordinator.create_order(two).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        // One unit fits; the delivery fee on top does not.
        let mut one = f.request(1);
        one.lines = vec![OrderLine::new(&gold.id, 1)];
        let err = f.coordinator.create_order(one).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        assert_eq!(f.db.products().stock(&gold.id).await.unwrap(), Some(10));
        assert_eq!(f.balance(&f.customer).await, 100);
        assert_eq!(f.balance(&f.owner).await, 0);

        let err = f
            .coordinator
            .preview_order(
                &[OrderLine::new(&gold.id, 2)],
                DeliveryType::Pickup,
                f.customer.location(),
                f.shop.location(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = f
            .coordinator
            .update_product(
                &f.dumplings.id,
                ProductChanges {
                    price: Some(i64::MAX),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        let dumplings = f.db.products().get_by_id(&f.dumplings.id).await.unwrap().unwrap();
        assert_eq!(dumplings.price, 10);
    }
}
