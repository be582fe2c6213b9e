//! # dishpatch-core: Pure Order Logic for Dishpatch
//!
//! Pricing, stock reservation, the order state machine and the domain
//! types they share. No I/O lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dishpatch Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Caller (HTTP handler, CLI, test)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                dishpatch-orders (Coordinator)                   │   │
//! │  │  create / preview / complete / cancel / detail, ledgers         │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────────┐  ┌────────▼────────────────────┐  │
//! │  │   ★ dishpatch-core (THIS) ★     │  │      dishpatch-db           │  │
//! │  │  pricing · inventory · lifecycle│  │  SQLite, migrations, repos  │  │
//! │  │  types · money · validation     │  └─────────────────────────────┘  │
//! │  │  NO I/O • PURE FUNCTIONS        │                                   │
//! │  └─────────────────────────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (User, Shop, Product, Order, LedgerEntry)
//! - [`money`] - Integer money
//! - [`pricing`] - Distance, delivery fee, quotes
//! - [`inventory`] - Stock reservation and line snapshots
//! - [`lifecycle`] - Order state machine
//! - [`validation`] - Request validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use dishpatch_core::{DeliveryType, PricingEngine};
//!
//! let engine = PricingEngine::default();
//! assert_eq!(engine.delivery_fee(DeliveryType::Delivery, 2.0).units(), 20);
//! assert!(engine.delivery_fee(DeliveryType::Pickup, 2.0).is_zero());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use inventory::{reserve, InventoryIssue, ReservationError};
pub use lifecycle::OrderStateMachine;
pub use money::Money;
pub use pricing::{PricingEngine, PricingPolicy};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines in one order request.
pub const MAX_ORDER_LINES: usize = 100;

/// Maximum quantity of a single product in one order.
///
/// Catches typos like 1000 for 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest price an owner may set.
///
/// A full order at this price (100 lines of 999) stays far inside `i64`.
pub const MAX_PRICE: i64 = 1_000_000_000;
