//! # Domain Types
//!
//! Core domain types for the almacen store core.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Lot        │   │   SaleHeader    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  product_id     │   │  sold_at        │       │
//! │  │  unit_price     │   │  quantity ≥ 0   │   │  total          │       │
//! │  │  unlotted_stock │   │  expiry?        │   │  payment_method │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Customer     │   │ AccountMovement │   │  PaymentMethod  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  no balance     │   │  Debt → sale FK │   │  Cash, Card,    │       │
//! │  │  column!        │   │  Payment → fixed│   │  Transfer, Qr,  │       │
//! │  │  (derived)      │   │  amount         │   │  StoreCredit    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stock Model
//! Effective stock of a product is always derived:
//! `Σ(lot.quantity where quantity > 0) + product.unlotted_stock`.
//! `unlotted_stock` is signed; a negative value is a "virtual debt" of units
//! sold without a backing physical batch, settled by future restocking.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale was settled.
///
/// `StoreCredit` is the only method that touches the credit ledger: the sale
/// total is booked as a Debt movement against the attached customer.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on an external terminal.
    Card,
    /// Bank transfer.
    Transfer,
    /// QR / wallet payment.
    Qr,
    /// Booked to the customer's credit account ("libreta").
    StoreCredit,
}

// =============================================================================
// Fulfillment State
// =============================================================================

/// Fulfillment state of a sale line.
///
/// New sales are always recorded `Fulfilled`; shortfall is pushed into the
/// product's unlotted stock instead of leaving the line pending.
/// `AwaitingStock` only exists on historical rows written before the
/// oversell-to-backorder mechanism and is drained by the reconciliation job.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentState {
    Fulfilled,
    AwaitingStock,
}

impl Default for FulfillmentState {
    fn default() -> Self {
        FulfillmentState::Fulfilled
    }
}

// =============================================================================
// Movement Kind
// =============================================================================

/// Kind of a customer account movement.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// References a sale; its amount is recomputed at current prices on read.
    Debt,
    /// Fixed amount, never repriced.
    Payment,
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
///
/// The stored row never carries total stock; effective stock is derived from
/// the product's lots plus `unlotted_stock`.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (database rowid).
    pub id: i64,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Current unit sale price. Mutable over time; the credit ledger reprices
    /// outstanding debt against this value.
    pub unit_price: f64,

    /// Optional physical volume/weight.
    pub volume: Option<f64>,

    /// Optional unique barcode.
    pub barcode: Option<String>,

    /// Free-text description.
    pub description: Option<String>,

    /// Signed counter of stock sold without a backing lot.
    /// Negative = units owed to the shop's future restocking.
    pub unlotted_stock: i64,
}

// =============================================================================
// Product Overview (read model)
// =============================================================================

/// Catalog listing row: a product with its derived stock figures attached.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductOverview {
    pub id: i64,
    pub name: String,
    pub unit_price: f64,
    pub barcode: Option<String>,
    pub unlotted_stock: i64,

    /// Σ(positive lot quantities) + unlotted_stock. May be negative.
    pub effective_stock: i64,

    /// Number of lots still holding stock.
    pub lot_count: i64,

    /// Earliest expiry among lots still holding stock.
    pub next_expiry: Option<NaiveDate>,
}

// =============================================================================
// Lot
// =============================================================================

/// A physical stock batch of one product.
///
/// Lots with the same product and identical expiry bucket are consolidated
/// into one row. Quantity may reach exactly zero but never goes negative, and
/// zero-quantity rows are kept as audit history.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// `None` means "no expiry" and sorts last during FEFO depletion.
    pub expiry: Option<NaiveDate>,
    /// Optional batch-specific barcode.
    pub barcode: Option<String>,
}

// =============================================================================
// Customer
// =============================================================================

/// A credit customer.
///
/// There is deliberately no balance field: the balance is derived from the
/// movement log on every read so that price changes reprice outstanding debt.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    /// Optional unique national ID.
    pub national_id: Option<String>,
    /// Optional payment due date.
    pub due_date: Option<NaiveDate>,
}

/// Customer listing row with the derived balance attached.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerOverview {
    pub id: i64,
    pub name: String,
    pub national_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Repriced debts minus fixed payments, as of this read.
    pub balance: f64,
}

// =============================================================================
// Sale Header & Lines
// =============================================================================

/// A committed sale. Immutable once registered, except for the optional
/// receipt artifact reference attached after rendering.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleHeader {
    pub id: i64,
    pub sold_at: DateTime<Utc>,
    /// Sum of line subtotals at commit time.
    pub total: f64,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    /// Path of the rendered receipt, if any.
    pub receipt_path: Option<String>,
    pub customer_id: Option<i64>,
}

/// A line of a committed sale.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLine {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Unit price frozen at time of sale.
    pub unit_price: f64,
    /// Discount percentage, 0..=100.
    pub discount_pct: f64,
    pub state: FulfillmentState,
    /// quantity × unit_price × (1 − discount/100), frozen at commit.
    pub subtotal: f64,
}

/// A sale assembled for display: header, lines, and the customer name if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub header: SaleHeader,
    pub customer_name: Option<String>,
    pub lines: Vec<SaleLine>,
}

// =============================================================================
// Sale Draft (coordinator input)
// =============================================================================

/// A line of a sale about to be registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLineDraft {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: f64,
    /// Discount percentage, 0..=100. Defaults to 0.
    pub discount_pct: f64,
}

impl SaleLineDraft {
    /// A draft line with no discount.
    pub fn new(product_id: i64, quantity: i64, unit_price: f64) -> Self {
        SaleLineDraft {
            product_id,
            quantity,
            unit_price,
            discount_pct: 0.0,
        }
    }

    /// Line subtotal: quantity × unit_price × (1 − discount/100).
    pub fn subtotal(&self) -> f64 {
        let gross = self.quantity as f64 * self.unit_price;
        gross * (1.0 - self.discount_pct / 100.0)
    }
}

/// Input to the sale coordinator. Validated as a whole before any
/// transaction opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleDraft {
    pub sold_at: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<i64>,
    pub notes: Option<String>,
    pub lines: Vec<SaleLineDraft>,
}

impl SaleDraft {
    /// Sale total: sum of line subtotals.
    pub fn total(&self) -> f64 {
        self.lines.iter().map(SaleLineDraft::subtotal).sum()
    }
}

// =============================================================================
// Account Movement
// =============================================================================

/// One row of a customer's append-only account log.
///
/// For `Debt` rows the stored amount is only the total at booking time; the
/// live amount is recomputed from the referenced sale's lines at current
/// prices. `Payment` amounts are fixed forever.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountMovement {
    pub id: i64,
    pub customer_id: i64,
    /// Set for debts, `None` for payments.
    pub sale_id: Option<i64>,
    pub moved_at: DateTime<Utc>,
    pub kind: MovementKind,
    pub amount: f64,
}

/// A movement annotated for display: repriced amount and, for debts, a
/// human-readable "Name (xQty), …" list of the purchased products.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementEntry {
    pub moved_at: DateTime<Utc>,
    pub kind: MovementKind,
    pub sale_id: Option<i64>,
    /// Repriced at current prices for debts; the fixed amount for payments.
    pub amount: f64,
    /// Product summary for debts, `None` for payments.
    pub products: Option<String>,
}

// =============================================================================
// Stock Policy
// =============================================================================

/// Stock policy supplied by the configuration source and passed explicitly
/// into the sale coordinator; there is no process-global configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPolicy {
    /// When false, a sale requesting more than the effective stock of a
    /// product fails with an insufficient-stock error instead of driving
    /// `unlotted_stock` negative.
    pub allow_negative_stock: bool,
}

impl StockPolicy {
    /// Policy that lets sales oversell into negative unlotted stock.
    pub const fn permissive() -> Self {
        StockPolicy {
            allow_negative_stock: true,
        }
    }

    /// Policy that declines sales exceeding effective stock.
    pub const fn strict() -> Self {
        StockPolicy {
            allow_negative_stock: false,
        }
    }
}

// =============================================================================
// Replenishment Suggestion
// =============================================================================

/// One row of the replenishment forecast, ordered by `reorder_qty` descending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderSuggestion {
    pub product_id: i64,
    pub name: String,
    /// Lot stock + unlotted stock as of the forecast. May be negative.
    pub current_stock: i64,
    /// Units sold inside the analysis window.
    pub units_sold: i64,
    /// units_sold / analysis_days.
    pub daily_velocity: f64,
    /// daily_velocity × coverage_days.
    pub target_stock: f64,
    /// round(max(0, target_stock − current_stock)).
    pub reorder_qty: i64,
}

// =============================================================================
// User
// =============================================================================

/// Role of a store user.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrator,
    Cashier,
}

/// A store user. The password is stored as a SHA-256 hex digest.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

// =============================================================================
// Unit Tests
// =============================================================================
