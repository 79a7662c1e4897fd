//! # Product Repository
//!
//! Catalog CRUD and the derived-stock overview.
//!
//! ## Stock Is Always Derived
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  effective_stock = Σ(lot.quantity WHERE quantity > 0)                   │
//! │                  + product.unlotted_stock        (signed, may be < 0)   │
//! │                                                                         │
//! │  There is no stored total to drift out of sync with the lots.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Price and description edits never touch lot rows; stock moves only through
//! the lot store and the sale coordinator.

use almacen_core::text::matches_search;
use almacen_core::validation::validate_name;
use almacen_core::{Product, ProductOverview, LOW_STOCK_THRESHOLD};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Fields for creating or updating a product.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub unit_price: f64,
    pub volume: Option<f64>,
    pub barcode: Option<String>,
    pub description: Option<String>,
}

/// Derived-stock selection shared by the overview queries.
const OVERVIEW_SELECT: &str = "\
    SELECT p.id,
           p.name,
           p.unit_price,
           p.barcode,
           p.unlotted_stock,
           IFNULL((SELECT SUM(l.quantity) FROM lots l
                   WHERE l.product_id = p.id AND l.quantity > 0), 0)
               + p.unlotted_stock AS effective_stock,
           (SELECT COUNT(*) FROM lots l
            WHERE l.product_id = p.id AND l.quantity > 0) AS lot_count,
           (SELECT MIN(l.expiry) FROM lots l
            WHERE l.product_id = p.id AND l.quantity > 0
              AND l.expiry IS NOT NULL) AS next_expiry
    FROM products p";

// =============================================================================
// Product Repository
// =============================================================================

/// Repository for catalog products.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new product repository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product, optionally with an initial stock batch.
    ///
    /// Product and first lot are written in one transaction so the catalog
    /// never shows a product whose opening stock went missing.
    pub async fn create(
        &self,
        input: &ProductInput,
        initial_lot: Option<(i64, Option<NaiveDate>)>,
    ) -> StoreResult<i64> {
        validate_name(&input.name)?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO products (name, unit_price, volume, barcode, description, unlotted_stock)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
        )
        .bind(&input.name)
        .bind(input.unit_price)
        .bind(input.volume)
        .bind(&input.barcode)
        .bind(&input.description)
        .execute(&mut *tx)
        .await?;

        let product_id = result.last_insert_rowid();

        if let Some((quantity, expiry)) = initial_lot {
            almacen_core::validation::validate_lot_quantity(quantity)?;

            sqlx::query("INSERT INTO lots (product_id, quantity, expiry) VALUES (?1, ?2, ?3)")
                .bind(product_id)
                .bind(quantity)
                .bind(expiry)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(product_id, name = %input.name, "Product created");
        Ok(product_id)
    }

    /// Fetches a product by id.
    pub async fn get(&self, product_id: i64) -> StoreResult<Product> {
        sqlx::query_as::<_, Product>(
            "SELECT id, name, unit_price, volume, barcode, description, unlotted_stock
             FROM products WHERE id = ?1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("Product", product_id))
    }

    /// Fetches a product by its catalog barcode (scanner path).
    pub async fn find_by_barcode(&self, barcode: &str) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, unit_price, volume, barcode, description, unlotted_stock
             FROM products WHERE barcode = ?1",
        )
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Updates a product's descriptive fields and price.
    ///
    /// Never touches lots or `unlotted_stock`; a price change reprices
    /// outstanding customer debt on its next read.
    pub async fn update(&self, product_id: i64, input: &ProductInput) -> StoreResult<()> {
        validate_name(&input.name)?;

        let result = sqlx::query(
            "UPDATE products
             SET name = ?1, unit_price = ?2, volume = ?3, barcode = ?4, description = ?5
             WHERE id = ?6",
        )
        .bind(&input.name)
        .bind(input.unit_price)
        .bind(input.volume)
        .bind(&input.barcode)
        .bind(&input.description)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", product_id));
        }

        Ok(())
    }

    /// Effective stock of one product: lot stock plus unlotted counter.
    pub async fn effective_stock(&self, product_id: i64) -> StoreResult<i64> {
        let stock: Option<i64> = sqlx::query_scalar(
            "SELECT IFNULL((SELECT SUM(l.quantity) FROM lots l
                            WHERE l.product_id = p.id AND l.quantity > 0), 0)
                    + p.unlotted_stock
             FROM products p WHERE p.id = ?1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        stock.ok_or_else(|| StoreError::not_found("Product", product_id))
    }

    /// Catalog overview with derived stock, lot count, and next expiry.
    ///
    /// `filter` matches against the product name with accents and case
    /// folded away, so "cafe" finds "Café". Folding happens here rather than
    /// in SQL; the catalog of a single store is small enough to scan.
    pub async fn overview(&self, filter: Option<&str>) -> StoreResult<Vec<ProductOverview>> {
        let sql = format!("{OVERVIEW_SELECT} ORDER BY p.name COLLATE NOCASE");
        let mut rows = sqlx::query_as::<_, ProductOverview>(&sql)
            .fetch_all(&self.pool)
            .await?;

        if let Some(needle) = filter {
            rows.retain(|p| matches_search(&p.name, needle));
        }

        Ok(rows)
    }

    /// Products at or below the low-stock threshold, restock candidates.
    pub async fn low_stock(&self) -> StoreResult<Vec<ProductOverview>> {
        let mut rows = self.overview(None).await?;
        rows.retain(|p| p.effective_stock < LOW_STOCK_THRESHOLD);
        rows.sort_by_key(|p| p.effective_stock);
        Ok(rows)
    }
}
