//! # Lot Store
//!
//! Batch-based stock: intake with backorder settlement, and FEFO depletion.
//!
//! ## Intake Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        add_lot(product, qty, expiry)                    │
//! │                                                                         │
//! │  unlotted_stock < 0?                                                    │
//! │       │                                                                 │
//! │       ├── yes → settle = min(qty, -unlotted_stock)                      │
//! │       │         unlotted_stock += settle   (units already sold)         │
//! │       │         remaining = qty - settle                                │
//! │       │                                                                 │
//! │       └── no  → remaining = qty                                         │
//! │                                                                         │
//! │  Consolidate remaining into the (product, expiry) bucket:               │
//! │       remaining == 0      → no lot row is touched                       │
//! │       existing bucket row → quantity += remaining                       │
//! │       no bucket row       → INSERT new lot                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Depletion Order (FEFO)
//! Lots with stock are consumed earliest-expiry-first; lots without an expiry
//! date sort last, ties broken by insertion order. Lot quantity never goes
//! below zero; any shortfall is the caller's to push into `unlotted_stock`.

use almacen_core::validation::validate_lot_quantity;
use almacen_core::{Lot, NO_EXPIRY_SORT_KEY};
use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

// =============================================================================
// In-Transaction Helpers
// =============================================================================

/// FEFO ordering clause shared by every lot read.
/// `NULL` expiry is mapped to a far-future sentinel so it sorts last.
fn fefo_order() -> String {
    format!("ORDER BY IFNULL(expiry, '{NO_EXPIRY_SORT_KEY}') ASC, id ASC")
}

/// Depletes up to `quantity` units from a product's lots in FEFO order.
///
/// Runs on the caller's connection so the sale coordinator can compose it
/// into its transaction. Returns the shortfall: units requested that no lot
/// could cover. Lot rows are decremented but never driven negative, and
/// rows reaching zero are kept.
pub(crate) async fn deplete(
    conn: &mut SqliteConnection,
    product_id: i64,
    quantity: i64,
) -> StoreResult<i64> {
    let sql = format!(
        "SELECT id, quantity FROM lots WHERE product_id = ?1 AND quantity > 0 {}",
        fefo_order()
    );
    let lots: Vec<(i64, i64)> = sqlx::query_as(&sql)
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

    let mut remaining = quantity;

    for (lot_id, lot_quantity) in lots {
        if remaining == 0 {
            break;
        }

        let take = remaining.min(lot_quantity);

        sqlx::query("UPDATE lots SET quantity = quantity - ?1 WHERE id = ?2")
            .bind(take)
            .bind(lot_id)
            .execute(&mut *conn)
            .await?;

        debug!(lot_id, take, "Depleted lot");
        remaining -= take;
    }

    Ok(remaining)
}

/// Total stock held in lots for one product, read on the caller's connection.
pub(crate) async fn total_lot_stock_on(
    conn: &mut SqliteConnection,
    product_id: i64,
) -> StoreResult<i64> {
    let total: i64 = sqlx::query_scalar(
        "SELECT IFNULL(SUM(quantity), 0) FROM lots WHERE product_id = ?1 AND quantity > 0",
    )
    .bind(product_id)
    .fetch_one(conn)
    .await?;

    Ok(total)
}

// =============================================================================
// Lot Repository
// =============================================================================

/// Repository for stock batches.
#[derive(Debug, Clone)]
pub struct LotRepository {
    pool: SqlitePool,
}

impl LotRepository {
    /// Creates a new lot repository.
    pub fn new(pool: SqlitePool) -> Self {
        LotRepository { pool }
    }

    /// Registers an incoming batch for a product.
    ///
    /// ## Settlement
    /// If the product carries negative `unlotted_stock` (units oversold
    /// earlier), the incoming quantity first pays that debt back toward zero.
    /// Only the remainder becomes physical lot stock.
    ///
    /// ## Consolidation
    /// The remainder merges into the existing lot with the exact same expiry
    /// date (`NULL` is its own bucket). A new row is created only when no
    /// bucket exists yet; an intake fully consumed by settlement touches no
    /// lot row at all.
    ///
    /// Returns the id of the lot row that absorbed the remainder, or `None`
    /// when settlement consumed the whole intake.
    pub async fn add_lot(
        &self,
        product_id: i64,
        quantity: i64,
        expiry: Option<NaiveDate>,
        barcode: Option<&str>,
    ) -> StoreResult<Option<i64>> {
        validate_lot_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        let unlotted: Option<i64> =
            sqlx::query_scalar("SELECT unlotted_stock FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?;

        let unlotted = unlotted.ok_or_else(|| StoreError::not_found("Product", product_id))?;

        let mut remaining = quantity;

        if unlotted < 0 {
            let settle = remaining.min(-unlotted);

            if settle > 0 {
                sqlx::query(
                    "UPDATE products SET unlotted_stock = unlotted_stock + ?1 WHERE id = ?2",
                )
                .bind(settle)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;

                debug!(product_id, settle, "Settled oversold units from intake");
                remaining -= settle;
            }
        }

        // Fully consumed by settlement: no physical stock to store
        if remaining == 0 {
            tx.commit().await?;
            debug!(product_id, quantity, "Intake absorbed by settlement");
            return Ok(None);
        }

        // Exact-bucket match: NULL only merges with NULL.
        let bucket: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM lots
             WHERE product_id = ?1
               AND ((?2 IS NULL AND expiry IS NULL) OR expiry = ?2)
             LIMIT 1",
        )
        .bind(product_id)
        .bind(expiry)
        .fetch_optional(&mut *tx)
        .await?;

        let lot_id = match bucket {
            Some(id) => {
                sqlx::query("UPDATE lots SET quantity = quantity + ?1 WHERE id = ?2")
                    .bind(remaining)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                id
            }
            None => {
                let result = sqlx::query(
                    "INSERT INTO lots (product_id, quantity, expiry, barcode)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(product_id)
                .bind(remaining)
                .bind(expiry)
                .bind(barcode)
                .execute(&mut *tx)
                .await?;
                result.last_insert_rowid()
            }
        };

        tx.commit().await?;

        debug!(product_id, quantity, remaining, lot_id, "Lot registered");
        Ok(Some(lot_id))
    }

    /// Returns a product's lots in FEFO order, zero-quantity audit rows
    /// included.
    pub async fn lots_for_product(&self, product_id: i64) -> StoreResult<Vec<Lot>> {
        let sql = format!(
            "SELECT id, product_id, quantity, expiry, barcode
             FROM lots WHERE product_id = ?1 {}",
            fefo_order()
        );
        let lots = sqlx::query_as::<_, Lot>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(lots)
    }

    /// Total stock held in lots for one product.
    pub async fn total_lot_stock(&self, product_id: i64) -> StoreResult<i64> {
        let mut conn = self.pool.acquire().await?;
        total_lot_stock_on(&mut *conn, product_id).await
    }

    /// Corrects a lot row in place (stocktake adjustments).
    ///
    /// Quantity must stay non-negative; FEFO position follows the new expiry.
    pub async fn update_lot(
        &self,
        lot_id: i64,
        quantity: i64,
        expiry: Option<NaiveDate>,
        barcode: Option<&str>,
    ) -> StoreResult<()> {
        validate_lot_quantity(quantity)?;

        let result = sqlx::query(
            "UPDATE lots SET quantity = ?1, expiry = ?2, barcode = ?3 WHERE id = ?4",
        )
        .bind(quantity)
        .bind(expiry)
        .bind(barcode)
        .bind(lot_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Lot", lot_id));
        }

        Ok(())
    }
}
