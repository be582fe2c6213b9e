//! # Validation Module
//!
//! Input validation for order requests and account edits.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller                                                        │
//! │  └── Type validation (deserialization)                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Shape of the request (non-empty, bounded, positive)                │
//! │  └── Runs before any row is read                                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── CHECK (quantity >= 0), CHECK (price >= 0)                          │
//! │  └── Foreign key constraints                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use dishpatch_core::validation::{validate_order_lines, validate_quantity};
//! use dishpatch_core::OrderLine;
//!
//! validate_quantity(5).unwrap();
//!
//! let merged = validate_order_lines(&[
//!     OrderLine::new("p-1", 2),
//!     OrderLine::new("p-1", 1),
//! ]).unwrap();
//! assert_eq!(merged, vec![OrderLine::new("p-1", 3)]);
//! ```

use crate::error::ValidationError;
use crate::types::OrderLine;
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_LINES, MAX_PRICE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Order Request Validators
// =============================================================================

/// Validates a single line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates the lines of an order request and merges duplicates.
///
/// ## Rules
/// - At least one line
/// - At most MAX_ORDER_LINES (100) lines
/// - Every product id non-empty, every quantity valid
/// - Repeated product ids are summed into one line, keeping first-seen
///   order; the merged quantity must still be valid
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Request: [p-1 × 2, p-2 × 1, p-1 × 1]                                  │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_order_lines ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── empty?        → Error: "lines is required"                    │
/// │       ├── qty <= 0?     → Error: "quantity must be positive"            │
/// │       │                                                                 │
/// │       └── OK → [p-1 × 3, p-2 × 1]                                       │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_order_lines(lines: &[OrderLine]) -> ValidationResult<Vec<OrderLine>> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    if lines.len() > MAX_ORDER_LINES {
        return Err(ValidationError::TooMany {
            field: "lines".to_string(),
            max: MAX_ORDER_LINES,
        });
    }

    let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "product_id".to_string(),
            });
        }
        validate_quantity(line.quantity)?;

        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(line.clone()),
        }
    }

    for line in &merged {
        validate_quantity(line.quantity)?;
    }

    Ok(merged)
}

// =============================================================================
// Account & Catalog Validators
// =============================================================================

/// Validates a coordinate pair in decimal degrees.
///
/// ## Example
/// ```rust
/// use dishpatch_core::validation::validate_location;
///
/// assert!(validate_location(24.787, 120.997).is_ok());
/// assert!(validate_location(91.0, 0.0).is_err());
/// ```
pub fn validate_location(latitude: f64, longitude: f64) -> ValidationResult<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::OutOfRange {
            field: "latitude".to_string(),
            min: -90,
            max: 90,
        });
    }

    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::OutOfRange {
            field: "longitude".to_string(),
            min: -180,
            max: 180,
        });
    }

    Ok(())
}

/// Validates a top-up amount. Must be positive.
pub fn validate_recharge_amount(amount: i64) -> ValidationResult<()> {
    if amount <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a product price. Zero is allowed, [`MAX_PRICE`] is the ceiling.
pub fn validate_price(price: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE).contains(&price) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE,
        });
    }

    Ok(())
}

/// Validates a stock level set by an owner.
pub fn validate_stock(quantity: i64) -> ValidationResult<()> {
    if quantity < 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use dishpatch_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
