//! # Credit Ledger
//!
//! The customer account log: append-only movements, derived balances, and
//! the dynamic repricing rule.
//!
//! ## Repricing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Balance Is Never Stored                                    │
//! │                                                                         │
//! │  Debt movement    → references a sale; its live amount is               │
//! │                     Σ(line.quantity × product.CURRENT unit_price)       │
//! │                     recomputed on every read                            │
//! │                                                                         │
//! │  Payment movement → fixed amount, never repriced                        │
//! │                                                                         │
//! │  balance = Σ repriced debts − Σ payments                                │
//! │                                                                         │
//! │  A price change therefore moves every outstanding debt that includes   │
//! │  that product, retroactively. Settled (paid-off) history does not      │
//! │  reopen: payments stay fixed.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Note the repricing sum uses the raw line quantity at the current price;
//! per-line discounts granted at sale time do not carry into the reprice.

use almacen_core::validation::validate_payment_amount;
use almacen_core::MovementEntry;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Shared SQL
// =============================================================================

/// Repriced outstanding debt of one customer (`?1`), at current prices.
pub(crate) const REPRICED_DEBT_SQL: &str = "\
    SELECT CAST(IFNULL(SUM(sl.quantity * p.unit_price), 0) AS REAL)
    FROM account_movements m
    JOIN sale_lines sl ON sl.sale_id = m.sale_id
    JOIN products p    ON p.id = sl.product_id
    WHERE m.customer_id = ?1 AND m.kind = 'debt'";

/// Fixed payments total of one customer (`?1`).
pub(crate) const PAYMENTS_SQL: &str = "\
    SELECT CAST(IFNULL(SUM(amount), 0) AS REAL)
    FROM account_movements
    WHERE customer_id = ?1 AND kind = 'payment'";

// =============================================================================
// Ledger Repository
// =============================================================================

/// Repository for the customer credit ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Records a payment received from a customer.
    ///
    /// The amount is fixed forever; it never reprices. Overpaying is allowed
    /// and drives the balance negative (credit in the customer's favor).
    pub async fn record_payment(
        &self,
        customer_id: i64,
        amount: f64,
        moved_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        validate_payment_amount(amount)?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM customers WHERE id = ?1")
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;

        if exists.is_none() {
            return Err(StoreError::not_found("Customer", customer_id));
        }

        let result = sqlx::query(
            "INSERT INTO account_movements (customer_id, sale_id, moved_at, kind, amount)
             VALUES (?1, NULL, ?2, 'payment', ?3)",
        )
        .bind(customer_id)
        .bind(moved_at)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        info!(customer_id, amount, "Payment recorded");
        Ok(result.last_insert_rowid())
    }

    /// Current balance of a customer: repriced debts minus fixed payments.
    ///
    /// Positive = the customer owes the store. Recomputed from the movement
    /// log on every call, so product price changes are already reflected.
    pub async fn balance(&self, customer_id: i64) -> StoreResult<f64> {
        let debts: f64 = sqlx::query_scalar(REPRICED_DEBT_SQL)
            .bind(customer_id)
            .fetch_one(&self.pool)
            .await?;

        let payments: f64 = sqlx::query_scalar(PAYMENTS_SQL)
            .bind(customer_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(debts - payments)
    }

    /// Movement history of a customer, newest first.
    ///
    /// Debt rows come back repriced at current product prices and annotated
    /// with a "Name (xQty), …" product summary; payment rows carry their
    /// fixed amount and no summary.
    pub async fn movements(&self, customer_id: i64) -> StoreResult<Vec<MovementEntry>> {
        let entries = sqlx::query_as::<_, MovementEntry>(
            "SELECT m.moved_at,
                    m.kind,
                    m.sale_id,
                    CASE m.kind
                        WHEN 'debt' THEN
                            CAST(IFNULL((SELECT SUM(sl.quantity * p.unit_price)
                                         FROM sale_lines sl
                                         JOIN products p ON p.id = sl.product_id
                                         WHERE sl.sale_id = m.sale_id), 0) AS REAL)
                        ELSE m.amount
                    END AS amount,
                    CASE m.kind
                        WHEN 'debt' THEN
                            (SELECT GROUP_CONCAT(p.name || ' (x' || sl.quantity || ')', ', ')
                             FROM sale_lines sl
                             JOIN products p ON p.id = sl.product_id
                             WHERE sl.sale_id = m.sale_id)
                        ELSE NULL
                    END AS products
             FROM account_movements m
             WHERE m.customer_id = ?1
             ORDER BY m.moved_at DESC, m.id DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(customer_id, count = entries.len(), "Movements fetched");
        Ok(entries)
    }

    /// Total payments received across all customers in a date range
    /// (inclusive on both ends). Cash-flow report input.
    pub async fn payments_received(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<f64> {
        let total: f64 = sqlx::query_scalar(
            "SELECT CAST(IFNULL(SUM(amount), 0) AS REAL)
             FROM account_movements
             WHERE kind = 'payment' AND DATE(moved_at) BETWEEN ?1 AND ?2",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}
