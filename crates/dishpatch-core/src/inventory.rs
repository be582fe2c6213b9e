//! # Stock Reservation
//!
//! Validates requested lines against looked-up products and freezes them
//! into priced snapshots. Every problem is collected before anything is
//! reported, so a client sees all offending products at once.
//!
//! ```text
//! lines ──► lookup each product ──┬── missing?      → Missing issue
//!                                 ├── qty > stock?  → Insufficient issue
//!                                 └── ok            → LineSnapshot (price now)
//!
//! issues empty?  yes → Ok(snapshots)
//!                no  → Err(ReservationError { issues })
//! ```
//!
//! The stock check here is advisory. The decrement itself re-checks stock
//! in the same transaction that moves the money.

use std::collections::HashMap;

use thiserror::Error;

use crate::error::CoreError;
use crate::types::{LineSnapshot, OrderLine, Product};

/// One reason a line cannot be reserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryIssue {
    /// No product with this id exists.
    Missing { product_id: String },
    /// The product exists but has too little stock.
    Insufficient {
        product_id: String,
        name: String,
        available: i64,
        requested: i64,
    },
}

/// All issues found while reserving a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} line(s) cannot be reserved", .issues.len())]
pub struct ReservationError {
    pub issues: Vec<InventoryIssue>,
}

impl ReservationError {
    /// Ids of products that do not exist.
    pub fn missing_products(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                InventoryIssue::Missing { product_id } => Some(product_id.clone()),
                InventoryIssue::Insufficient { .. } => None,
            })
            .collect()
    }

    /// Names of products without enough stock.
    pub fn insufficient_products(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                InventoryIssue::Insufficient { name, .. } => Some(name.clone()),
                InventoryIssue::Missing { .. } => None,
            })
            .collect()
    }
}

/// Missing products take precedence over stock shortfalls.
impl From<ReservationError> for CoreError {
    fn from(err: ReservationError) -> Self {
        let missing = err.missing_products();
        if !missing.is_empty() {
            return CoreError::ProductsNotFound {
                product_ids: missing,
            };
        }
        CoreError::InsufficientInventory {
            products: err.insufficient_products(),
        }
    }
}

/// Reserves `lines` against `products`.
///
/// `products` is whatever the catalog returned for the requested ids; ids
/// it does not contain are reported as missing. Snapshots come back in the
/// order of `lines`, with the unit price captured from the product.
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use dishpatch_core::inventory::reserve;
/// use dishpatch_core::{OrderLine, Product};
///
/// let now = Utc::now();
/// let tea = Product {
///     id: "p-tea".into(), shop_id: "s".into(), owner_id: "o".into(),
///     name: "Tea".into(), price: 4, quantity: 9,
///     created_at: now, updated_at: now,
/// };
///
/// let snapshots = reserve(&[OrderLine::new("p-tea", 2)], &[tea]).unwrap();
/// assert_eq!(snapshots[0].unit_price, 4);
/// ```
pub fn reserve(
    lines: &[OrderLine],
    products: &[Product],
) -> Result<Vec<LineSnapshot>, ReservationError> {
    let by_id: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut issues = Vec::new();
    let mut snapshots = Vec::with_capacity(lines.len());

    for line in lines {
        match by_id.get(line.product_id.as_str()) {
            None => issues.push(InventoryIssue::Missing {
                product_id: line.product_id.clone(),
            }),
            Some(product) if !product.can_fulfil(line.quantity) => {
                issues.push(InventoryIssue::Insufficient {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    available: product.quantity,
                    requested: line.quantity,
                })
            }
            Some(product) => snapshots.push(LineSnapshot {
                product_id: product.id.clone(),
                name: product.name.clone(),
                unit_price: product.price,
                quantity: line.quantity,
            }),
        }
    }

    if issues.is_empty() {
        Ok(snapshots)
    } else {
        Err(ReservationError { issues })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
