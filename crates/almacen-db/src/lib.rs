//! # almacen-db: Storage Layer
//!
//! SQLite persistence for the almacen store core.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          almacen-db                                     │
//! │                                                                         │
//! │  ┌──────────────┐    ┌──────────────────────────────────────────────┐  │
//! │  │   pool.rs    │───▶│          repository/                         │  │
//! │  │  DbConfig    │    │  product │ lot │ sale │ customer │ ledger    │  │
//! │  │  Database    │    │  forecast │ user                             │  │
//! │  └──────┬───────┘    └──────────────────────────────────────────────┘  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────┐    ┌──────────────┐                                  │
//! │  │ migrations.rs│    │   error.rs   │                                  │
//! │  │  embedded SQL│    │  StoreError  │                                  │
//! │  └──────────────┘    └──────────────┘                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use almacen_db::{Database, DbConfig};
//! use almacen_core::{SaleDraft, StockPolicy};
//!
//! let db = Database::new(DbConfig::new("almacen.db")).await?;
//! let sale_id = db.sales().register_sale(&draft, StockPolicy::permissive()).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// Re-export main types for convenience
pub use error::{StoreError, StoreResult};
pub use pool::{Database, DbConfig};
pub use repository::customer::{CustomerInput, CustomerRepository};
pub use repository::forecast::ForecastRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::lot::LotRepository;
pub use repository::product::{ProductInput, ProductRepository};
pub use repository::sale::SaleRepository;
pub use repository::user::UserRepository;
