//! # dishpatch-orders: Order Lifecycle Service
//!
//! Places, completes and cancels orders, keeping stock and balances in
//! step with every order through one transaction per operation.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Order Service Layout                             │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    OrderCoordinator                              │  │
//! │  │                                                                  │  │
//! │  │  create · preview · complete · cancel · detail                   │  │
//! │  │  listings · ledger history · recharge · location · catalog edits │  │
//! │  └──────────┬────────────────────┬────────────────────┬─────────────┘  │
//! │             ▼                    ▼                    ▼                 │
//! │  ┌────────────────┐  ┌────────────────────┐  ┌────────────────────┐    │
//! │  │ PricingEngine  │  │  InventoryLedger   │  │   BalanceLedger    │    │
//! │  │ (core, pure)   │  │                    │  │                    │    │
//! │  │ distance, fee  │  │ reserve · commit   │  │ transfer (pair)    │    │
//! │  │ total          │  │ restore            │  │ recharge           │    │
//! │  └────────────────┘  └─────────┬──────────┘  └─────────┬──────────┘    │
//! │                                └───────────┬───────────┘                │
//! │                                            ▼                            │
//! │                              dishpatch-db (one Tx per operation)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`coordinator`] - `OrderCoordinator`, the public entry point
//! - [`inventory`] - Stock reservation, decrement and restock
//! - [`balance`] - Double-entry transfers and top-ups
//! - [`config`] - TOML + environment configuration
//! - [`error`] - `OrderError` and its `ErrorKind`
//! - [`telemetry`] - Tracing subscriber setup
//!
//! ## Usage
//! ```rust,ignore
//! use dishpatch_orders::{init_tracing, OrderCoordinator, ServiceConfig};
//!
//! init_tracing();
//! let config = ServiceConfig::load(None)?;
//! let coordinator = OrderCoordinator::connect(&config).await?;
//!
//! let detail = coordinator.get_order_detail(&order_id).await?;
//! ```

pub mod balance;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod inventory;
pub mod telemetry;

pub use balance::{BalanceLedger, Transfer, TransferReceipt};
pub use config::{ConfigError, DatabaseSettings, ServiceConfig};
pub use coordinator::{CreateOrder, OrderCoordinator};
pub use error::{ErrorKind, OrderError, OrderResult};
pub use inventory::InventoryLedger;
pub use telemetry::init_tracing;

// Callers build requests from these.
pub use dishpatch_core::{
    CancelInitiator, DeliveryType, GeoPoint, LedgerLine, Money, OrderDetail, OrderLine,
    OrderQuote, OrderStatus, OrderSummary, PricingPolicy,
};
pub use dishpatch_db::ProductChanges;
