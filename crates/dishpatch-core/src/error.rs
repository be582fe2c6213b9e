//! # Error Types
//!
//! Domain-specific error types for dishpatch-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  dishpatch-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  dishpatch-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  dishpatch-orders errors                                               │
//! │  └── OrderError       - What callers see, tagged with an ErrorKind     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ─┐                                  │
//! │                         DbError ────┴──► OrderError → transport        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;
use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// One or more requested products do not exist.
    ///
    /// Reported before stock problems: a missing product makes the whole
    /// request meaningless, whatever the other lines say.
    #[error("Products not found: {}", .product_ids.join(", "))]
    ProductsNotFound { product_ids: Vec<String> },

    /// Requested quantity exceeds stock for one or more products.
    ///
    /// ## User Workflow
    /// ```text
    /// Order: 5 × Dumplings, 1 × Tea
    ///      │
    ///      ▼
    /// Reserve: Dumplings stock=2, Tea stock=9
    ///      │
    ///      ▼
    /// InsufficientInventory { products: ["Dumplings"] }
    ///      │
    ///      ▼
    /// Nothing written, client shows "not enough Dumplings"
    /// ```
    #[error("Insufficient inventory for: {}", .products.join(", "))]
    InsufficientInventory { products: Vec<String> },

    /// The payer cannot cover the amount.
    #[error("Insufficient balance for {user_id}: available {available}, required {required}")]
    InsufficientBalance {
        user_id: String,
        available: Money,
        required: Money,
    },

    /// The order is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Completing an order that was already completed or canceled
    /// - Canceling an order that was already completed or canceled
    #[error("Order {order_id} is already {current_status}")]
    InvalidOrderStatus {
        order_id: String,
        current_status: OrderStatus,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Arithmetic on the value would overflow.
    #[error("{field} is too large")]
    TooLarge { field: String },

    /// Too many entries in a collection.
    #[error("{field} cannot have more than {max} entries")]
    TooMany { field: String, max: usize },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
