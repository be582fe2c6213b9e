//! # Order Lifecycle
//!
//! The order state machine. Every status change goes through here.
//!
//! ```text
//!                  ┌────────────┐
//!   create ──────► │  pending   │
//!                  └─────┬──────┘
//!             complete   │   cancel (shop or customer)
//!           ┌────────────┴────────────┐
//!           ▼                         ▼
//!    ┌────────────┐            ┌────────────┐
//!    │ completed  │            │  canceled  │
//!    └────────────┘            └────────────┘
//!        terminal                  terminal
//! ```
//!
//! No transition leaves a terminal state, and the only transitions are the
//! two out of `pending`. Store-side, the same rule is enforced with a
//! conditional update on the current status, so two racing requests cannot
//! both win.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::types::{CancelInitiator, Order, OrderStatus};

/// Transition rules for [`OrderStatus`].
pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Checks whether `from → to` is a legal transition.
    pub const fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
        matches!(
            (from, to),
            (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Canceled)
        )
    }

    /// Returns `to` when `from → to` is legal.
    ///
    /// ## Example
    /// ```rust
    /// use dishpatch_core::lifecycle::OrderStateMachine;
    /// use dishpatch_core::OrderStatus;
    ///
    /// let next = OrderStateMachine::transition("o-1", OrderStatus::Pending, OrderStatus::Completed);
    /// assert_eq!(next.unwrap(), OrderStatus::Completed);
    ///
    /// let again = OrderStateMachine::transition("o-1", OrderStatus::Completed, OrderStatus::Canceled);
    /// assert!(again.is_err());
    /// ```
    pub fn transition(order_id: &str, from: OrderStatus, to: OrderStatus) -> CoreResult<OrderStatus> {
        if Self::can_transition(from, to) {
            Ok(to)
        } else {
            Err(CoreError::InvalidOrderStatus {
                order_id: order_id.to_string(),
                current_status: from,
            })
        }
    }
}

impl Order {
    /// Moves a pending order to `completed`.
    pub fn complete(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.status = OrderStateMachine::transition(&self.id, self.status, OrderStatus::Completed)?;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Moves a pending order to `canceled`, recording who asked.
    pub fn cancel(&mut self, initiator: CancelInitiator, now: DateTime<Utc>) -> CoreResult<()> {
        self.status = OrderStateMachine::transition(&self.id, self.status, OrderStatus::Canceled)?;
        self.canceled_by = Some(initiator);
        self.canceled_at = Some(now);
        Ok(())
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
