//! # Pricing Engine
//!
//! Distance, delivery fee and order totals. Pure and deterministic.
//!
//! ## Fee Tiering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  delivery type    fee                                                   │
//! │  ─────────────    ───────────────────────────────────────────────────   │
//! │  pickup           0                                                     │
//! │  delivery         max(round(distance_km × fee_per_km), minimum)        │
//! │                                                                         │
//! │  defaults: fee_per_km = 10, minimum = 10                                │
//! │                                                                         │
//! │   0.4 km →  round(4)  =  4 → 10 (minimum)                               │
//! │   2.0 km →  round(20) = 20 → 20                                         │
//! │  12.25 km → round(122.5) = 122 (half to even) → 122                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{subtotal_of, DeliveryType, GeoPoint, LineSnapshot, OrderQuote};

/// Mean earth radius used for great-circle distances, in km.
pub const EARTH_RADIUS_KM: f64 = 6373.0;

/// Default fee per kilometre of delivery distance.
pub const DEFAULT_FEE_PER_KM: i64 = 10;

/// Default floor for any delivery fee.
pub const DEFAULT_MINIMUM_DELIVERY_FEE: i64 = 10;

// =============================================================================
// Distance
// =============================================================================

/// Haversine great-circle distance between two points, in km.
///
/// Symmetric, and exactly zero for identical points.
///
/// ## Example
/// ```rust
/// use dishpatch_core::pricing::distance_km;
/// use dishpatch_core::GeoPoint;
///
/// let a = GeoPoint::new(24.787, 120.997);
/// let b = GeoPoint::new(24.796, 120.996);
/// assert_eq!(distance_km(a, b), distance_km(b, a));
/// assert_eq!(distance_km(a, a), 0.0);
/// ```
pub fn distance_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (to.longitude - from.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

// =============================================================================
// Pricing Policy
// =============================================================================

/// Tunable fee parameters. Loaded from configuration by the service layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Fee charged per km of delivery distance.
    #[serde(default = "default_fee_per_km")]
    pub fee_per_km: i64,

    /// Lowest fee for any delivery order.
    #[serde(default = "default_minimum_delivery_fee")]
    pub minimum_delivery_fee: i64,
}

fn default_fee_per_km() -> i64 {
    DEFAULT_FEE_PER_KM
}

fn default_minimum_delivery_fee() -> i64 {
    DEFAULT_MINIMUM_DELIVERY_FEE
}

impl Default for PricingPolicy {
    fn default() -> Self {
        PricingPolicy {
            fee_per_km: DEFAULT_FEE_PER_KM,
            minimum_delivery_fee: DEFAULT_MINIMUM_DELIVERY_FEE,
        }
    }
}

// =============================================================================
// Pricing Engine
// =============================================================================

/// Computes quotes for orders under a [`PricingPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingEngine {
    policy: PricingPolicy,
}

impl PricingEngine {
    pub fn new(policy: PricingPolicy) -> Self {
        PricingEngine { policy }
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    /// See [`distance_km`].
    #[inline]
    pub fn distance(&self, from: GeoPoint, to: GeoPoint) -> f64 {
        distance_km(from, to)
    }

    /// Delivery fee for the given type and distance.
    ///
    /// Rounds half to even, so a fee of exactly x.5 rounds to the even
    /// neighbour.
    pub fn delivery_fee(&self, delivery_type: DeliveryType, distance_km: f64) -> Money {
        match delivery_type {
            DeliveryType::Pickup => Money::zero(),
            DeliveryType::Delivery => {
                let raw = (distance_km * self.policy.fee_per_km as f64).round_ties_even() as i64;
                Money::from_units(raw.max(self.policy.minimum_delivery_fee))
            }
        }
    }

    /// `subtotal + fee`, `None` on overflow.
    #[inline]
    pub fn total(&self, subtotal: Money, fee: Money) -> Option<Money> {
        subtotal.checked_add(fee)
    }

    /// Prices a reserved snapshot for delivery between two points.
    ///
    /// ## Errors
    /// * `ValidationError::TooLarge` - a line total, the subtotal or the
    ///   total does not fit in an `i64`
    pub fn quote(
        &self,
        lines: Vec<LineSnapshot>,
        delivery_type: DeliveryType,
        customer: GeoPoint,
        shop: GeoPoint,
    ) -> CoreResult<OrderQuote> {
        let distance_km = self.distance(customer, shop);
        let fee = self.delivery_fee(delivery_type, distance_km);
        let subtotal = subtotal_of(&lines).ok_or_else(|| too_large("subtotal"))?;
        let total = self
            .total(subtotal, fee)
            .ok_or_else(|| too_large("total"))?;

        Ok(OrderQuote {
            lines,
            subtotal: subtotal.units(),
            delivery_fee: fee.units(),
            total: total.units(),
            distance_km,
            delivery_type,
        })
    }
}

fn too_large(field: &str) -> ValidationError {
    ValidationError::TooLarge {
        field: field.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
