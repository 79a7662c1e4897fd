//! # Replenishment Forecaster
//!
//! Suggests order quantities from recent sales velocity.
//!
//! ## Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  daily_velocity = units_sold_in_window / max(analysis_days, 1)          │
//! │  target_stock   = daily_velocity × coverage_days                        │
//! │  reorder_qty    = round(max(0, target_stock − current_stock))           │
//! │                                                                         │
//! │  current_stock is the signed effective stock, so an oversold product   │
//! │  (negative) inflates the suggestion: the order must cover both the     │
//! │  owed units and the coverage target.                                    │
//! │                                                                         │
//! │  A product appears when reorder_qty > 0, or when it sold recently and  │
//! │  sits below the low-stock threshold. Sorted by reorder_qty descending. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Aggregates come from two plain queries; the arithmetic runs here, not in
//! SQL, so it stays in one readable place.

use almacen_core::{ReorderSuggestion, LOW_STOCK_THRESHOLD};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::StoreResult;

/// Repository computing replenishment suggestions.
#[derive(Debug, Clone)]
pub struct ForecastRepository {
    pool: SqlitePool,
}

impl ForecastRepository {
    /// Creates a new forecast repository.
    pub fn new(pool: SqlitePool) -> Self {
        ForecastRepository { pool }
    }

    /// Builds the replenishment list.
    ///
    /// ## Arguments
    /// * `analysis_days` - How far back to measure sales velocity
    /// * `coverage_days` - How many days of stock the order should cover
    pub async fn suggest(
        &self,
        analysis_days: i64,
        coverage_days: i64,
    ) -> StoreResult<Vec<ReorderSuggestion>> {
        let window_start = Utc::now() - Duration::days(analysis_days.max(0));

        // (product_id, name, effective stock) for the whole catalog
        let stocks: Vec<(i64, String, i64)> = sqlx::query_as(
            "SELECT p.id,
                    p.name,
                    IFNULL((SELECT SUM(l.quantity) FROM lots l
                            WHERE l.product_id = p.id AND l.quantity > 0), 0)
                        + p.unlotted_stock AS current_stock
             FROM products p",
        )
        .fetch_all(&self.pool)
        .await?;

        // units sold per product inside the window
        let sold: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT sl.product_id, SUM(sl.quantity)
             FROM sale_lines sl
             JOIN sales s ON s.id = sl.sale_id
             WHERE s.sold_at >= ?1
             GROUP BY sl.product_id",
        )
        .bind(window_start)
        .fetch_all(&self.pool)
        .await?;

        let sold_by_product: std::collections::HashMap<i64, i64> = sold.into_iter().collect();

        let divisor = analysis_days.max(1) as f64;
        let mut suggestions = Vec::new();

        for (product_id, name, current_stock) in stocks {
            let units_sold = sold_by_product.get(&product_id).copied().unwrap_or(0);

            let daily_velocity = units_sold as f64 / divisor;
            let target_stock = daily_velocity * coverage_days as f64;
            let reorder_qty = (target_stock - current_stock as f64).max(0.0).round() as i64;

            let low_and_moving = current_stock < LOW_STOCK_THRESHOLD && units_sold > 0;

            if reorder_qty > 0 || low_and_moving {
                suggestions.push(ReorderSuggestion {
                    product_id,
                    name,
                    current_stock,
                    units_sold,
                    daily_velocity,
                    target_stock,
                    reorder_qty,
                });
            }
        }

        suggestions.sort_by(|a, b| b.reorder_qty.cmp(&a.reorder_qty));

        debug!(
            analysis_days,
            coverage_days,
            count = suggestions.len(),
            "Replenishment suggestions computed"
        );
        Ok(suggestions)
    }
}
