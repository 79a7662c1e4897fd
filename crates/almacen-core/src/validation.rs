//! # Validation Module
//!
//! Input validation for the almacen store core.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Presentation layer                                           │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │  └── Runs BEFORE any transaction opens, so a rejected input            │
//! │      never leaves partial state behind                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE constraints (barcode, national_id, username)               │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::SaleDraft;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product or customer display name.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 200 characters
///
/// ## Example
/// ```rust
/// use almacen_core::validation::validate_name;
///
/// assert!(validate_name("Café Molido 500g").is_ok());
/// assert!(validate_name("").is_err());
/// ```
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a lot quantity being added to stock.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed and leaves stock untouched
///
/// Lot quantities never go negative; oversell shortfall is tracked only in
/// the product's `unlotted_stock` counter.
pub fn validate_lot_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "lot quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a customer payment amount.
///
/// ## Rules
/// - Must be strictly positive; zero or negative payments are rejected
///   before any ledger row is written
pub fn validate_payment_amount(amount: f64) -> ValidationResult<()> {
    if amount <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a discount percentage.
///
/// ## Rules
/// - Must be within 0..=100
pub fn validate_discount_pct(pct: f64) -> ValidationResult<()> {
    if !(0.0..=100.0).contains(&pct) {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(())
}

// =============================================================================
// Draft Validators
// =============================================================================

/// Validates a whole sale draft before the coordinator opens a transaction.
///
/// ## Rules
/// - Every line quantity must be strictly positive
/// - Every line unit price must be non-negative
/// - Every line discount must be within 0..=100
///
/// Stock availability is deliberately NOT checked here: it depends on the
/// configured policy and must be read inside the sale transaction to avoid
/// read/write races.
pub fn validate_sale_draft(draft: &SaleDraft) -> ValidationResult<()> {
    for line in &draft.lines {
        if line.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "line quantity".to_string(),
            });
        }

        if line.unit_price < 0.0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "unit price".to_string(),
            });
        }

        validate_discount_pct(line.discount_pct)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PaymentMethod, SaleLineDraft};
    use chrono::{TimeZone, Utc};

    fn draft(lines: Vec<SaleLineDraft>) -> SaleDraft {
        SaleDraft {
            sold_at: Utc.with_ymd_and_hms(2024, 10, 27, 12, 0, 0).unwrap(),
            payment_method: PaymentMethod::Cash,
            customer_id: None,
            notes: None,
            lines,
        }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Pan Lactal").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_lot_quantity() {
        assert!(validate_lot_quantity(0).is_ok());
        assert!(validate_lot_quantity(12).is_ok());
        assert!(validate_lot_quantity(-1).is_err());
    }

    #[test]
    fn test_validate_payment_amount() {
        assert!(validate_payment_amount(75.0).is_ok());
        assert!(validate_payment_amount(0.0).is_err());
        assert!(validate_payment_amount(-10.0).is_err());
    }

    #[test]
    fn test_validate_discount_pct() {
        assert!(validate_discount_pct(0.0).is_ok());
        assert!(validate_discount_pct(25.0).is_ok());
        assert!(validate_discount_pct(100.0).is_ok());
        assert!(validate_discount_pct(-0.5).is_err());
        assert!(validate_discount_pct(100.5).is_err());
    }

    #[test]
    fn test_validate_sale_draft() {
        assert!(validate_sale_draft(&draft(vec![SaleLineDraft::new(1, 2, 50.0)])).is_ok());

        // Empty drafts are allowed; the coordinator records a zero-total sale.
        assert!(validate_sale_draft(&draft(vec![])).is_ok());

        assert!(validate_sale_draft(&draft(vec![SaleLineDraft::new(1, 0, 50.0)])).is_err());
        assert!(validate_sale_draft(&draft(vec![SaleLineDraft::new(1, 2, -1.0)])).is_err());

        let bad_discount = SaleLineDraft {
            product_id: 1,
            quantity: 1,
            unit_price: 10.0,
            discount_pct: 120.0,
        };
        assert!(validate_sale_draft(&draft(vec![bad_discount])).is_err());
    }
}
