//! # Customer Repository
//!
//! Credit customer CRUD. Balances are never stored here; every listing
//! derives them from the movement log through the same repriced-debt query
//! the ledger uses, so a price change shows up immediately in the customer
//! list too.

use almacen_core::text::matches_search;
use almacen_core::validation::validate_name;
use almacen_core::{Customer, CustomerOverview};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Fields for creating or updating a customer.
#[derive(Debug, Clone)]
pub struct CustomerInput {
    pub name: String,
    pub national_id: Option<String>,
    pub due_date: Option<NaiveDate>,
}

/// Repository for credit customers.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new customer repository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Creates a customer account.
    pub async fn create(&self, input: &CustomerInput) -> StoreResult<i64> {
        validate_name(&input.name)?;

        let result = sqlx::query(
            "INSERT INTO customers (name, national_id, due_date) VALUES (?1, ?2, ?3)",
        )
        .bind(&input.name)
        .bind(&input.national_id)
        .bind(input.due_date)
        .execute(&self.pool)
        .await?;

        let customer_id = result.last_insert_rowid();
        debug!(customer_id, name = %input.name, "Customer created");
        Ok(customer_id)
    }

    /// Fetches a customer by id.
    pub async fn get(&self, customer_id: i64) -> StoreResult<Customer> {
        sqlx::query_as::<_, Customer>(
            "SELECT id, name, national_id, due_date FROM customers WHERE id = ?1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("Customer", customer_id))
    }

    /// Updates a customer's details.
    pub async fn update(&self, customer_id: i64, input: &CustomerInput) -> StoreResult<()> {
        validate_name(&input.name)?;

        let result = sqlx::query(
            "UPDATE customers SET name = ?1, national_id = ?2, due_date = ?3 WHERE id = ?4",
        )
        .bind(&input.name)
        .bind(&input.national_id)
        .bind(input.due_date)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Customer", customer_id));
        }

        Ok(())
    }

    /// Customer listing with the derived balance attached.
    ///
    /// `filter` matches the name with accents and case folded, like the
    /// product catalog search.
    pub async fn overview(&self, filter: Option<&str>) -> StoreResult<Vec<CustomerOverview>> {
        let mut rows = sqlx::query_as::<_, CustomerOverview>(
            "SELECT c.id,
                    c.name,
                    c.national_id,
                    c.due_date,
                    CAST(IFNULL((SELECT SUM(sl.quantity * p.unit_price)
                                 FROM account_movements m
                                 JOIN sale_lines sl ON sl.sale_id = m.sale_id
                                 JOIN products p    ON p.id = sl.product_id
                                 WHERE m.customer_id = c.id AND m.kind = 'debt'), 0)
                       - IFNULL((SELECT SUM(m.amount)
                                 FROM account_movements m
                                 WHERE m.customer_id = c.id AND m.kind = 'payment'), 0)
                       AS REAL) AS balance
             FROM customers c
             ORDER BY c.name COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?;

        if let Some(needle) = filter {
            rows.retain(|c| matches_search(&c.name, needle));
        }

        Ok(rows)
    }

    /// Customers carrying a positive balance (they owe the store).
    pub async fn debtors(&self) -> StoreResult<Vec<CustomerOverview>> {
        let mut rows = self.overview(None).await?;
        rows.retain(|c| c.balance > 0.0);
        rows.sort_by(|a, b| b.balance.total_cmp(&a.balance));
        Ok(rows)
    }
}
