//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Balances, prices, fees and ledger amounts are whole currency units.   │
//! │                                                                         │
//! │  Customer balance: 100                                                  │
//! │  Order total:       50  (subtotal 30 + delivery fee 20)                 │
//! │  After payment:     50  ← exact, no float drift across thousands of    │
//! │                           payment/refund pairs                          │
//! │                                                                         │
//! │  The only floating point value in the system is the distance in km,    │
//! │  and it is rounded to an integer fee before it touches money.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use dishpatch_core::money::Money;
//!
//! let price = Money::from_units(10);
//! let subtotal = price.checked_mul_quantity(3).unwrap();
//! assert_eq!(subtotal.units(), 30);
//! assert_eq!((subtotal + Money::from_units(20)).units(), 50);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in whole currency units.
///
/// ## Design Decisions
/// - **i64 (signed)**: ledger rows carry signed amounts (payments are negative)
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Transparent serde**: serializes as a bare integer
///
/// ## Where Money Flows
/// ```text
/// Product.price ──► LineSnapshot.unit_price ──► line_total ──► subtotal
///                                                               │
/// distance ──► delivery fee ────────────────────────────────────┤
///                                                               ▼
///                                                             total
///                                                               │
///             customer balance ◄── Payment (−total) ────────────┤
///             owner balance    ◄── Receive (+total) ────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole currency units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units)
    }

    /// Returns the value in whole currency units.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies a unit price by a quantity, `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use dishpatch_core::money::Money;
    ///
    /// let unit_price = Money::from_units(12);
    /// assert_eq!(unit_price.checked_mul_quantity(4), Some(Money::from_units(48)));
    /// assert_eq!(Money::from_units(i64::MAX).checked_mul_quantity(2), None);
    /// ```
    #[inline]
    pub fn checked_mul_quantity(self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Checked subtraction, `None` on overflow.
    #[inline]
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Checked addition, `None` on overflow.
    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display for logs and error messages. Clients format for their own locale.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Negation turns a receive amount into the matching payment amount.
impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let a = Money::from_units(100);
        let b = Money::from_units(50);

        assert_eq!((a + b).units(), 150);
        assert_eq!((a - b).units(), 50);
        assert_eq!((a * 3).units(), 300);
        assert_eq!((-b).units(), -50);
    }

    #[test]
    fn test_payment_and_receive_cancel_out() {
        let total = Money::from_units(50);
        let pair = [-total, total];
        assert!(pair.iter().copied().sum::<Money>().is_zero());
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_units(-10);
        assert!(negative.is_negative());
        assert_eq!(negative.abs().units(), 10);
    }

    #[test]
    fn test_checked_ops() {
        assert_eq!(Money::from_units(i64::MAX).checked_add(Money::from_units(1)), None);
        assert_eq!(
            Money::from_units(10).checked_sub(Money::from_units(4)),
            Some(Money::from_units(6))
        );
        assert_eq!(Money::from_units(i64::MAX / 2).checked_mul_quantity(3), None);
        assert_eq!(
            Money::from_units(-7).checked_mul_quantity(3),
            Some(Money::from_units(-21))
        );
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&Money::from_units(42)).unwrap();
        assert_eq!(json, "42");
    }
}
