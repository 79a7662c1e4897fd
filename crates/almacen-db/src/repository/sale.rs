//! # Sale Coordinator
//!
//! The one multi-write atomic operation in the system.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   register_sale(draft, policy)                          │
//! │                                                                         │
//! │  validate draft (outside the transaction)                               │
//! │       │                                                                 │
//! │       ▼  BEGIN                                                          │
//! │  INSERT sale header                                                     │
//! │       │                                                                 │
//! │  store-credit + customer? ──► INSERT debt movement for the customer     │
//! │       │                                                                 │
//! │  for each line:                                                         │
//! │       read effective stock (inside the transaction)                     │
//! │       policy forbids oversell AND available < qty? ──► Err → ROLLBACK   │
//! │       INSERT fulfilled line                                             │
//! │       deplete lots FEFO; shortfall → unlotted_stock -= shortfall        │
//! │       │                                                                 │
//! │       ▼  COMMIT                                                         │
//! │  header + lines + movement + stock all land together, or none do        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any error path simply drops the transaction, which rolls it back; no
//! partial sale is ever visible.

use almacen_core::validation::validate_sale_draft;
use almacen_core::{FulfillmentState, PaymentMethod, Sale, SaleDraft, SaleHeader, SaleLine, StockPolicy};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::repository::lot;

/// Header row joined with the customer name for display.
#[derive(Debug, sqlx::FromRow)]
struct HeaderWithCustomer {
    id: i64,
    sold_at: DateTime<Utc>,
    total: f64,
    payment_method: PaymentMethod,
    notes: Option<String>,
    receipt_path: Option<String>,
    customer_id: Option<i64>,
    customer_name: Option<String>,
}

impl HeaderWithCustomer {
    fn into_sale(self, lines: Vec<SaleLine>) -> Sale {
        Sale {
            header: SaleHeader {
                id: self.id,
                sold_at: self.sold_at,
                total: self.total,
                payment_method: self.payment_method,
                notes: self.notes,
                receipt_path: self.receipt_path,
                customer_id: self.customer_id,
            },
            customer_name: self.customer_name,
            lines,
        }
    }
}

const HEADER_SELECT: &str = "\
    SELECT s.id, s.sold_at, s.total, s.payment_method, s.notes,
           s.receipt_path, s.customer_id, c.name AS customer_name
    FROM sales s
    LEFT JOIN customers c ON c.id = s.customer_id";

const LINES_SELECT: &str = "\
    SELECT id, sale_id, product_id, quantity, unit_price, discount_pct, state, subtotal
    FROM sale_lines WHERE sale_id = ?1 ORDER BY id ASC";

// =============================================================================
// Sale Repository
// =============================================================================

/// Repository for sales; owns the atomic sale transaction.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new sale repository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Registers a sale atomically and returns its id.
    ///
    /// ## Stock Policy
    /// With `allow_negative_stock`, a line may request more than the product's
    /// effective stock: every lot is drained to zero and the shortfall is
    /// pushed into `unlotted_stock` as a negative counter, to be settled by
    /// the next intake. Without it, such a line fails with
    /// [`StoreError::InsufficientStock`] and the whole sale rolls back.
    ///
    /// ## Store Credit
    /// A `StoreCredit` sale with a customer attached books its total as a
    /// debt movement in the same transaction. The debt reprices on read, so
    /// the amount stored here is only the total at booking time. Without a
    /// customer the sale commits like any other and no ledger entry is
    /// written.
    pub async fn register_sale(&self, draft: &SaleDraft, policy: StockPolicy) -> StoreResult<i64> {
        validate_sale_draft(draft)?;

        let total = draft.total();
        let mut tx = self.pool.begin().await?;

        if let Some(customer_id) = draft.customer_id {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM customers WHERE id = ?1")
                .bind(customer_id)
                .fetch_optional(&mut *tx)
                .await?;

            if exists.is_none() {
                return Err(StoreError::not_found("Customer", customer_id));
            }
        }

        let result = sqlx::query(
            "INSERT INTO sales (sold_at, total, payment_method, notes, receipt_path, customer_id)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
        )
        .bind(draft.sold_at)
        .bind(total)
        .bind(draft.payment_method)
        .bind(&draft.notes)
        .bind(draft.customer_id)
        .execute(&mut *tx)
        .await?;

        let sale_id = result.last_insert_rowid();

        // The debt movement needs an account to land on; a store-credit sale
        // without a customer commits with no ledger entry.
        if draft.payment_method == PaymentMethod::StoreCredit {
            if let Some(customer_id) = draft.customer_id {
                sqlx::query(
                    "INSERT INTO account_movements (customer_id, sale_id, moved_at, kind, amount)
                     VALUES (?1, ?2, ?3, 'debt', ?4)",
                )
                .bind(customer_id)
                .bind(sale_id)
                .bind(draft.sold_at)
                .bind(total)
                .execute(&mut *tx)
                .await?;
            }
        }

        for line in &draft.lines {
            // The line row goes in first; a failed stock check below rolls it
            // back with everything else.
            sqlx::query(
                "INSERT INTO sale_lines
                     (sale_id, product_id, quantity, unit_price, discount_pct, state, subtotal)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(sale_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.discount_pct)
            .bind(FulfillmentState::Fulfilled)
            .bind(line.subtotal())
            .execute(&mut *tx)
            .await?;

            let unlotted: Option<i64> =
                sqlx::query_scalar("SELECT unlotted_stock FROM products WHERE id = ?1")
                    .bind(line.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            let unlotted =
                unlotted.ok_or_else(|| StoreError::not_found("Product", line.product_id))?;

            let lot_stock = lot::total_lot_stock_on(&mut *tx, line.product_id).await?;
            let available = lot_stock + unlotted;

            if !policy.allow_negative_stock && available < line.quantity {
                warn!(
                    product_id = line.product_id,
                    requested = line.quantity,
                    available,
                    "Sale declined by stock policy"
                );
                return Err(StoreError::InsufficientStock {
                    product_id: line.product_id,
                    requested: line.quantity,
                    available,
                });
            }

            let shortfall = lot::deplete(&mut *tx, line.product_id, line.quantity).await?;

            if shortfall > 0 {
                sqlx::query(
                    "UPDATE products SET unlotted_stock = unlotted_stock - ?1 WHERE id = ?2",
                )
                .bind(shortfall)
                .bind(line.product_id)
                .execute(&mut *tx)
                .await?;

                debug!(
                    product_id = line.product_id,
                    shortfall, "Shortfall pushed into unlotted stock"
                );
            }
        }

        tx.commit().await?;

        info!(sale_id, total, lines = draft.lines.len(), "Sale registered");
        Ok(sale_id)
    }

    /// Fetches one sale with its lines and customer name.
    pub async fn sale_by_id(&self, sale_id: i64) -> StoreResult<Sale> {
        let sql = format!("{HEADER_SELECT} WHERE s.id = ?1");
        let header = sqlx::query_as::<_, HeaderWithCustomer>(&sql)
            .bind(sale_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("Sale", sale_id))?;

        let lines = sqlx::query_as::<_, SaleLine>(LINES_SELECT)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(header.into_sale(lines))
    }

    /// Sales whose date falls in the range (inclusive), newest first,
    /// lines attached.
    pub async fn sales_in_range(&self, from: NaiveDate, to: NaiveDate) -> StoreResult<Vec<Sale>> {
        let sql = format!(
            "{HEADER_SELECT} WHERE DATE(s.sold_at) BETWEEN ?1 AND ?2
             ORDER BY s.sold_at DESC, s.id DESC"
        );
        let headers = sqlx::query_as::<_, HeaderWithCustomer>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        let mut sales = Vec::with_capacity(headers.len());

        for header in headers {
            let lines = sqlx::query_as::<_, SaleLine>(LINES_SELECT)
                .bind(header.id)
                .fetch_all(&self.pool)
                .await?;
            sales.push(header.into_sale(lines));
        }

        Ok(sales)
    }

    /// Revenue total for a date range (inclusive). Report input.
    pub async fn revenue_in_range(&self, from: NaiveDate, to: NaiveDate) -> StoreResult<f64> {
        let total: f64 = sqlx::query_scalar(
            "SELECT CAST(IFNULL(SUM(total), 0) AS REAL)
             FROM sales WHERE DATE(sold_at) BETWEEN ?1 AND ?2",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Attaches the rendered receipt artifact to a committed sale.
    /// The only mutation a sale admits after registration.
    pub async fn set_receipt_path(&self, sale_id: i64, path: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE sales SET receipt_path = ?1 WHERE id = ?2")
            .bind(path)
            .bind(sale_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Sale", sale_id));
        }

        Ok(())
    }

    /// Drains historical `awaiting_stock` lines written before shortfall
    /// started flowing into `unlotted_stock`.
    ///
    /// Each line is settled in its own transaction: deplete what today's lots
    /// can cover, push the rest into the unlotted counter, and mark the line
    /// fulfilled. Idempotent; a second run finds nothing to do. Returns the
    /// number of lines reconciled.
    pub async fn reconcile_awaiting_lines(&self) -> StoreResult<u64> {
        let pending: Vec<(i64, i64, i64)> = sqlx::query_as(
            "SELECT id, product_id, quantity FROM sale_lines
             WHERE state = 'awaiting_stock' ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut reconciled = 0u64;

        for (line_id, product_id, quantity) in pending {
            let mut tx = self.pool.begin().await?;

            let shortfall = lot::deplete(&mut *tx, product_id, quantity).await?;

            if shortfall > 0 {
                sqlx::query(
                    "UPDATE products SET unlotted_stock = unlotted_stock - ?1 WHERE id = ?2",
                )
                .bind(shortfall)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query("UPDATE sale_lines SET state = 'fulfilled' WHERE id = ?1")
                .bind(line_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            debug!(line_id, product_id, quantity, shortfall, "Line reconciled");
            reconciled += 1;
        }

        if reconciled > 0 {
            info!(reconciled, "Awaiting-stock backlog drained");
        }

        Ok(reconciled)
    }
}
