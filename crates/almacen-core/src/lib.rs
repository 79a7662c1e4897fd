//! # almacen-core: Pure Business Logic for the almacen store core
//!
//! This crate is the **heart** of the system. It contains the domain types and
//! business rules for a single-store retail manager: batch-based inventory
//! with expiry-aware depletion, sale drafts with per-line discounts, and a
//! customer credit ledger whose balances are always derived, never stored.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        almacen Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │     Presentation layer (GUI / printing / import tools)          │   │
//! │  │                 (external, out of scope)                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ almacen-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌───────────┐                 │   │
//! │  │   │   types   │  │ validation │  │   text    │                 │   │
//! │  │   │  Product  │  │   rules    │  │  accent   │                 │   │
//! │  │   │  Lot,Sale │  │   checks   │  │  folding  │                 │   │
//! │  │   └───────────┘  └────────────┘  └───────────┘                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    almacen-db (Database Layer)                  │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Lot, SaleHeader, AccountMovement, ...)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//! - [`text`] - Accent-insensitive search normalization
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Explicit Errors**: All errors are typed, never strings or panics
//! 4. **Derived Balances**: A customer balance is a computation, not a column

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod text;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use almacen_core::Product` instead of
// `use almacen_core::types::Product`

pub use error::{CoreError, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Stock level below which a product counts as "critically low".
///
/// ## Business Reason
/// The replenishment forecaster surfaces slow movers that would otherwise be
/// skipped (velocity too low to suggest a reorder) once their effective stock
/// drops under this threshold, and the catalog listing uses the same value for
/// its low-stock filter.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// Expiry bucket used to sort "no expiry" lots last during FEFO depletion.
///
/// Lots without an expiry date are treated as expiring at the maximum
/// representable date, so every dated batch leaves the shelf first.
pub const NO_EXPIRY_SORT_KEY: &str = "9999-12-31";
