//! # Repository Module
//!
//! Database repository implementations for Dishpatch.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  OrderCoordinator                                                       │
//! │       │                                                                 │
//! │       │  db.products().decrement_stock(&mut tx, id, qty)                │
//! │       ▼                                                                 │
//! │  ProductRepository                                                      │
//! │  ├── pool methods:  get_by_id, list_by_shop, update, ...                │
//! │  └── tx methods:    take `&mut Tx`, join the caller's atomic unit       │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! │                                                                         │
//! │  Repositories never open or commit transactions themselves.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`UserRepository`](user::UserRepository) - Accounts and balances
//! - [`ShopRepository`](shop::ShopRepository) - Shops
//! - [`ProductRepository`](product::ProductRepository) - Catalog and stock
//! - [`OrderRepository`](order::OrderRepository) - Orders and snapshots
//! - [`LedgerRepository`](ledger::LedgerRepository) - Ledger entries

pub mod ledger;
pub mod order;
pub mod product;
pub mod shop;
pub mod user;
