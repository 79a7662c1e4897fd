//! # Repository Layer
//!
//! One repository per aggregate, all sharing the pool:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Repository Layer                                  │
//! │                                                                         │
//! │  ProductRepository  → catalog CRUD + derived-stock overview             │
//! │  LotRepository      → batch intake, settlement, FEFO depletion          │
//! │  SaleRepository     → the atomic sale transaction + sale read models    │
//! │  CustomerRepository → customer CRUD + derived balances                  │
//! │  LedgerRepository   → payments, repriced movements, reports             │
//! │  ForecastRepository → replenishment suggestions                         │
//! │  UserRepository     → login accounts                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each repository runs single-statement operations straight on the pool.
//! The sale coordinator in [`sale`] is the one place that opens a multi-write
//! transaction; lot depletion is written against `&mut SqliteConnection` so it
//! composes into that transaction.

pub mod customer;
pub mod forecast;
pub mod ledger;
pub mod lot;
pub mod product;
pub mod sale;
pub mod user;
