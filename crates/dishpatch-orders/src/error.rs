//! # Service Error Type
//!
//! What callers of the coordinator see when an operation fails.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Dishpatch                              │
//! │                                                                         │
//! │  ValidationError ──┐                                                    │
//! │  CoreError ────────┼──► OrderError ──► kind() ──► transport status      │
//! │  DbError ──────────┘         │                                          │
//! │                              └──► is_retryable()                        │
//! │                                                                         │
//! │  Before the atomic unit:  rejected with zero side effects               │
//! │  Inside the atomic unit:  rolled back; storage trouble becomes          │
//! │                           TransactionFailure (retryable)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

use dishpatch_core::{CoreError, Money, OrderStatus, ValidationError};
use dishpatch_db::DbError;

/// Machine-readable category of an [`OrderError`].
///
/// ## Suggested Transport Mapping
/// ```text
/// NOT_FOUND               404
/// VALIDATION_ERROR        400
/// INSUFFICIENT_INVENTORY  409
/// INSUFFICIENT_BALANCE    402
/// CONFLICT                409
/// TRANSACTION_FAILURE     503  (retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    ValidationError,
    InsufficientInventory,
    InsufficientBalance,
    Conflict,
    TransactionFailure,
}

/// Errors returned by the coordinator and the ledgers.
#[derive(Debug, Error)]
pub enum OrderError {
    /// A user, shop or order does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// One or more requested products do not exist (in this shop).
    #[error("Products not found: {}", .product_ids.join(", "))]
    ProductsNotFound { product_ids: Vec<String> },

    /// The request is malformed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Not enough stock. Carries product names.
    #[error("Insufficient inventory for: {}", .products.join(", "))]
    InsufficientInventory { products: Vec<String> },

    /// The payer cannot cover the amount.
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance {
        user_id: String,
        available: Money,
        required: Money,
    },

    /// The order already left `pending`.
    #[error("Order {order_id} is already {status}")]
    Conflict { order_id: String, status: OrderStatus },

    /// Storage failed; the unit was rolled back. Safe to retry.
    #[error("Transaction failed: {0}")]
    TransactionFailure(String),
}

impl OrderError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        OrderError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::NotFound { .. } | OrderError::ProductsNotFound { .. } => {
                ErrorKind::NotFound
            }
            OrderError::Validation(_) => ErrorKind::ValidationError,
            OrderError::InsufficientInventory { .. } => ErrorKind::InsufficientInventory,
            OrderError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            OrderError::Conflict { .. } => ErrorKind::Conflict,
            OrderError::TransactionFailure(_) => ErrorKind::TransactionFailure,
        }
    }

    /// True only for [`ErrorKind::TransactionFailure`].
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransactionFailure
    }
}

impl From<CoreError> for OrderError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductsNotFound { product_ids } => {
                OrderError::ProductsNotFound { product_ids }
            }
            CoreError::InsufficientInventory { products } => {
                OrderError::InsufficientInventory { products }
            }
            CoreError::InsufficientBalance {
                user_id,
                available,
                required,
            } => OrderError::InsufficientBalance {
                user_id,
                available,
                required,
            },
            CoreError::InvalidOrderStatus {
                order_id,
                current_status,
            } => OrderError::Conflict {
                order_id,
                status: current_status,
            },
            CoreError::Validation(e) => OrderError::Validation(e),
        }
    }
}

/// Storage errors other than a missing row surface as a retryable
/// transaction failure; the raw message only goes to the log.
impl From<DbError> for OrderError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => OrderError::NotFound { entity, id },
            other => {
                tracing::error!(error = %other, "Storage failure");
                OrderError::TransactionFailure(other.to_string())
            }
        }
    }
}

/// Result type for service operations.
pub type OrderResult<T> = Result<T, OrderError>;
