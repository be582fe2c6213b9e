//! # Domain Types
//!
//! Core domain types used throughout Dishpatch.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │      Shop       │   │    Product      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  balance        │   │  owner_id (FK)  │   │  shop_id (FK)   │       │
//! │  │  lat / lon      │   │  lat / lon      │   │  price          │       │
//! │  │  role           │   └─────────────────┘   │  quantity ≥ 0   │       │
//! │  └─────────────────┘                         └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Order      │   │  LineSnapshot   │   │  LedgerEntry    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  status         │──►│  product_id     │   │  action         │       │
//! │  │  subtotal / fee │   │  name           │   │  amount (±)     │       │
//! │  │  total          │   │  unit_price     │   │  subject/object │       │
//! │  │  line_items     │   │  quantity       │   │  is_refund      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! An order freezes the name and unit price of every line at creation time.
//! Refunds, cancellations and order details read the snapshot, never the
//! live catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Location
// =============================================================================

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[inline]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        GeoPoint {
            latitude,
            longitude,
        }
    }
}

// =============================================================================
// User
// =============================================================================

/// Whether an account shops, or owns a shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Customer,
    Owner,
}

/// A platform account.
///
/// `balance` is only ever changed by the balance ledger, inside the same
/// transaction that appends the matching ledger rows.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Balance in whole currency units.
    pub balance: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub role: UserRole,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl User {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_units(self.balance)
    }

    #[inline]
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Checks whether the balance covers `amount`.
    #[inline]
    pub fn can_afford(&self, amount: Money) -> bool {
        self.balance() >= amount
    }
}

// =============================================================================
// Shop
// =============================================================================

/// A shop, owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Shop {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Shop {
    #[inline]
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub shop_id: String,
    pub owner_id: String,
    pub name: String,
    /// Unit price in whole currency units.
    pub price: i64,
    /// Units in stock, never negative.
    pub quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_units(self.price)
    }

    /// Checks if current stock covers `quantity`.
    #[inline]
    pub fn can_fulfil(&self, quantity: i64) -> bool {
        self.quantity >= quantity
    }
}

// =============================================================================
// Delivery Type
// =============================================================================

/// How the order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    /// Customer collects at the shop. No fee.
    Pickup,
    /// Shop delivers. Fee depends on distance.
    Delivery,
}

// =============================================================================
// Order Status
// =============================================================================

/// The lifecycle state of an order. See [`crate::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Paid, waiting for the shop.
    #[default]
    Pending,
    /// Handed over. Terminal.
    Completed,
    /// Refunded and restocked. Terminal.
    Canceled,
}

impl OrderStatus {
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Canceled)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who asked for a cancellation. Kept on the order for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CancelInitiator {
    Shop,
    Customer,
}

// =============================================================================
// Order Lines
// =============================================================================

/// A requested line: which product, how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: i64,
}

impl OrderLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        OrderLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A line item frozen at order time.
///
/// This is the persisted snapshot document; the field set is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineSnapshot {
    pub product_id: String,
    /// Product name at time of order (frozen).
    pub name: String,
    /// Unit price at time of order (frozen).
    pub unit_price: i64,
    pub quantity: i64,
}

impl LineSnapshot {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_units(self.unit_price)
    }

    /// `unit_price × quantity`, `None` on overflow.
    #[inline]
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price().checked_mul_quantity(self.quantity)
    }

    /// The stock movement this line stands for.
    pub fn as_order_line(&self) -> OrderLine {
        OrderLine::new(self.product_id.clone(), self.quantity)
    }
}

/// Sums the line totals of a snapshot. `None` if any step overflows.
pub fn subtotal_of(lines: &[LineSnapshot]) -> Option<Money> {
    lines
        .iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line.line_total()?))
}

// =============================================================================
// Order
// =============================================================================

/// An order. Created once, then only moved through the state machine.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub shop_id: String,
    /// Owner of the shop at order time; the payee of the order.
    pub owner_id: String,
    pub status: OrderStatus,
    pub delivery_type: DeliveryType,
    pub distance_km: f64,
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub total: i64,
    pub line_items: Vec<LineSnapshot>,
    pub canceled_by: Option<CancelInitiator>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_units(self.total)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_units(self.subtotal)
    }

    #[inline]
    pub fn delivery_fee(&self) -> Money {
        Money::from_units(self.delivery_fee)
    }

    /// Client-facing view built from the snapshot alone.
    pub fn detail(&self) -> OrderDetail {
        OrderDetail {
            order_id: self.id.clone(),
            status: self.status,
            lines: self.line_items.clone(),
            subtotal: self.subtotal,
            delivery_fee: self.delivery_fee,
            total: self.total,
        }
    }
}

// =============================================================================
// Read Models
// =============================================================================

/// A priced quote for a prospective order. Nothing is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderQuote {
    pub lines: Vec<LineSnapshot>,
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub total: i64,
    pub distance_km: f64,
    pub delivery_type: DeliveryType,
}

impl OrderQuote {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_units(self.total)
    }
}

/// Line items and charges of a stored order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDetail {
    pub order_id: String,
    pub status: OrderStatus,
    pub lines: Vec<LineSnapshot>,
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub total: i64,
}

/// An order as listed to either party, with both names resolved.
///
/// Serializes as the order's own fields plus `shop_name` and
/// `customer_name`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub shop_name: String,
    pub customer_name: String,
}

impl OrderSummary {
    /// Name of the other party as seen by `user_id`.
    pub fn counterparty_name(&self, user_id: &str) -> &str {
        if self.order.customer_id == user_id {
            &self.shop_name
        } else {
            &self.customer_name
        }
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// What a ledger row records from the subject's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAction {
    /// Money left the subject (negative amount).
    Payment,
    /// Money reached the subject (positive amount).
    Receive,
    /// Subject topped up their own balance.
    Recharge,
}

/// One signed monetary movement.
///
/// Transfers always write two rows sharing a `transfer_id`: a `Payment`
/// of `-amount` for the payer and a `Receive` of `+amount` for the payee.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    /// Shared by both rows of a transfer.
    pub transfer_id: String,
    pub order_id: Option<String>,
    pub action: LedgerAction,
    pub amount: i64,
    /// Account whose balance this row describes.
    pub subject_user_id: String,
    /// Counterparty.
    pub object_user_id: String,
    pub is_refund: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_units(self.amount)
    }
}

/// A ledger row with the counterparty's display name, for history views.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerLine {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub entry: LedgerEntry,
    pub counterparty_name: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, qty: i64) -> LineSnapshot {
        LineSnapshot {
            product_id: "p".to_string(),
            name: "Dumplings".to_string(),
            unit_price: price,
            quantity: qty,
        }
    }

    #[test]
    fn test_order_status_default_and_terminal() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_subtotal_of_snapshot() {
        let lines = vec![line(10, 3), line(7, 2)];
        assert_eq!(subtotal_of(&lines), Some(Money::from_units(44)));
        assert_eq!(subtotal_of(&[]), Some(Money::zero()));

        let huge = vec![line(i64::MAX / 2, 1), line(i64::MAX / 2, 1), line(2, 1)];
        assert_eq!(subtotal_of(&huge), None);
        assert_eq!(subtotal_of(&[line(i64::MAX, 2)]), None);
    }

    #[test]
    fn test_snapshot_document_fields() {
        let json = serde_json::to_value(line(10, 3)).unwrap();
        let obj = json.as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["name", "product_id", "quantity", "unit_price"]);
    }

    #[test]
    fn test_enum_serialization() {
        assert_eq!(
            serde_json::to_string(&DeliveryType::Pickup).unwrap(),
            "\"pickup\""
        );
        assert_eq!(
            serde_json::to_string(&CancelInitiator::Customer).unwrap(),
            "\"customer\""
        );
        assert_eq!(OrderStatus::Canceled.to_string(), "canceled");
    }

    #[test]
    fn test_read_models_flatten_with_names() {
        let entry = LedgerEntry {
            id: "l-1".to_string(),
            transfer_id: "t-1".to_string(),
            order_id: Some("o-1".to_string()),
            action: LedgerAction::Payment,
            amount: -50,
            subject_user_id: "ada".to_string(),
            object_user_id: "bo".to_string(),
            is_refund: false,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(LedgerLine {
            entry,
            counterparty_name: "Bo".to_string(),
        })
        .unwrap();
        assert_eq!(json["counterparty_name"], "Bo");
        assert_eq!(json["amount"], -50);
        assert_eq!(json["action"], "payment");
        assert!(json.get("entry").is_none());

        let summary = OrderSummary {
            order: Order {
                id: "o-1".to_string(),
                customer_id: "ada".to_string(),
                shop_id: "s-1".to_string(),
                owner_id: "bo".to_string(),
                status: OrderStatus::Pending,
                delivery_type: DeliveryType::Pickup,
                distance_km: 0.0,
                subtotal: 30,
                delivery_fee: 0,
                total: 30,
                line_items: vec![line(10, 3)],
                canceled_by: None,
                created_at: Utc::now(),
                completed_at: None,
                canceled_at: None,
            },
            shop_name: "Noodle Bar".to_string(),
            customer_name: "Ada".to_string(),
        };
        assert_eq!(summary.counterparty_name("ada"), "Noodle Bar");
        assert_eq!(summary.counterparty_name("bo"), "Ada");

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["shop_name"], "Noodle Bar");
        assert_eq!(json["total"], 30);
    }
}
