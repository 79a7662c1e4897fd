//! Integration tests for the store flows: lot intake and FEFO depletion,
//! the atomic sale transaction under both stock policies, the repricing
//! credit ledger, and the replenishment forecaster.
//!
//! Every test runs against a fresh in-memory database with migrations
//! applied, so tests are isolated and order-independent.

use almacen_core::{PaymentMethod, Role, SaleDraft, SaleLineDraft, StockPolicy};
use almacen_db::{CustomerInput, Database, DbConfig, ProductInput, StoreError};
use chrono::{Duration, NaiveDate, TimeZone, Utc};

// =============================================================================
// Helpers
// =============================================================================

async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

fn product_input(name: &str, unit_price: f64) -> ProductInput {
    ProductInput {
        name: name.to_string(),
        unit_price,
        volume: None,
        barcode: None,
        description: None,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn cash_draft(lines: Vec<SaleLineDraft>) -> SaleDraft {
    SaleDraft {
        sold_at: Utc.with_ymd_and_hms(2024, 10, 27, 12, 0, 0).unwrap(),
        payment_method: PaymentMethod::Cash,
        customer_id: None,
        notes: None,
        lines,
    }
}

fn credit_draft(customer_id: i64, lines: Vec<SaleLineDraft>) -> SaleDraft {
    SaleDraft {
        sold_at: Utc.with_ymd_and_hms(2024, 10, 27, 12, 0, 0).unwrap(),
        payment_method: PaymentMethod::StoreCredit,
        customer_id: Some(customer_id),
        notes: None,
        lines,
    }
}

// =============================================================================
// Lot Intake & Effective Stock
// =============================================================================

#[tokio::test]
async fn effective_stock_is_lots_plus_unlotted() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Yerba Mate 1kg", 180.0), Some((10, None)))
        .await
        .unwrap();

    db.lots()
        .add_lot(product_id, 5, Some(date(2025, 3, 1)), None)
        .await
        .unwrap();

    assert_eq!(db.products().effective_stock(product_id).await.unwrap(), 15);
    assert_eq!(db.lots().total_lot_stock(product_id).await.unwrap(), 15);

    let overview = db.products().overview(None).await.unwrap();
    assert_eq!(overview.len(), 1);
    assert_eq!(overview[0].effective_stock, 15);
    assert_eq!(overview[0].lot_count, 2);
    assert_eq!(overview[0].next_expiry, Some(date(2025, 3, 1)));
}

#[tokio::test]
async fn intake_consolidates_exact_expiry_buckets() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Leche Entera", 95.0), None)
        .await
        .unwrap();

    let expiry = Some(date(2024, 12, 15));
    let first = db.lots().add_lot(product_id, 6, expiry, None).await.unwrap();
    let second = db.lots().add_lot(product_id, 4, expiry, None).await.unwrap();

    // Same expiry merges into one row
    assert!(first.is_some());
    assert_eq!(first, second);

    // NULL expiry is its own bucket, not merged with dated ones
    let third = db.lots().add_lot(product_id, 3, None, None).await.unwrap();
    assert_ne!(first, third);

    let lots = db.lots().lots_for_product(product_id).await.unwrap();
    assert_eq!(lots.len(), 2);
    assert_eq!(lots[0].quantity, 10);
    assert_eq!(lots[1].quantity, 3);
    assert_eq!(lots[1].expiry, None);
}

#[tokio::test]
async fn intake_rejects_negative_quantity() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Harina 000", 60.0), None)
        .await
        .unwrap();

    let result = db.lots().add_lot(product_id, -3, None, None).await;
    assert!(matches!(result, Err(StoreError::Validation(_))));
}

#[tokio::test]
async fn intake_for_unknown_product_fails() {
    let db = test_db().await;

    let result = db.lots().add_lot(999, 10, None, None).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}

// =============================================================================
// FEFO Depletion
// =============================================================================

#[tokio::test]
async fn sale_depletes_earliest_expiry_first() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Queso Cremoso", 420.0), None)
        .await
        .unwrap();

    // Registered later, but expires earlier: must be drained first
    db.lots()
        .add_lot(product_id, 10, Some(date(2024, 11, 30)), None)
        .await
        .unwrap();
    db.lots()
        .add_lot(product_id, 5, Some(date(2024, 10, 31)), None)
        .await
        .unwrap();

    db.sales()
        .register_sale(
            &cash_draft(vec![SaleLineDraft::new(product_id, 8, 420.0)]),
            StockPolicy::strict(),
        )
        .await
        .unwrap();

    let lots = db.lots().lots_for_product(product_id).await.unwrap();
    // FEFO order: the October lot first, emptied; November partially drained
    assert_eq!(lots[0].expiry, Some(date(2024, 10, 31)));
    assert_eq!(lots[0].quantity, 0);
    assert_eq!(lots[1].expiry, Some(date(2024, 11, 30)));
    assert_eq!(lots[1].quantity, 7);

    // Zero-quantity row is kept as audit history
    assert_eq!(lots.len(), 2);
}

#[tokio::test]
async fn lots_without_expiry_deplete_last() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Arroz Largo Fino", 110.0), None)
        .await
        .unwrap();

    db.lots().add_lot(product_id, 4, None, None).await.unwrap();
    db.lots()
        .add_lot(product_id, 4, Some(date(2025, 6, 1)), None)
        .await
        .unwrap();

    db.sales()
        .register_sale(
            &cash_draft(vec![SaleLineDraft::new(product_id, 5, 110.0)]),
            StockPolicy::strict(),
        )
        .await
        .unwrap();

    let lots = db.lots().lots_for_product(product_id).await.unwrap();
    assert_eq!(lots[0].expiry, Some(date(2025, 6, 1)));
    assert_eq!(lots[0].quantity, 0);
    assert_eq!(lots[1].expiry, None);
    assert_eq!(lots[1].quantity, 3);
}

// =============================================================================
// Oversell & Backorder Settlement
// =============================================================================

#[tokio::test]
async fn permissive_policy_oversells_into_unlotted_stock() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Gaseosa Cola 2L", 150.0), Some((20, None)))
        .await
        .unwrap();

    db.sales()
        .register_sale(
            &cash_draft(vec![SaleLineDraft::new(product_id, 25, 150.0)]),
            StockPolicy::permissive(),
        )
        .await
        .unwrap();

    // Every lot drained to zero, the 5-unit shortfall owed to restocking
    assert_eq!(db.lots().total_lot_stock(product_id).await.unwrap(), 0);
    assert_eq!(db.products().get(product_id).await.unwrap().unlotted_stock, -5);
    assert_eq!(db.products().effective_stock(product_id).await.unwrap(), -5);
}

#[tokio::test]
async fn strict_policy_rejects_oversell_and_rolls_back() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Aceite Girasol", 300.0), Some((20, None)))
        .await
        .unwrap();

    let result = db
        .sales()
        .register_sale(
            &cash_draft(vec![SaleLineDraft::new(product_id, 25, 300.0)]),
            StockPolicy::strict(),
        )
        .await;

    match result {
        Err(StoreError::InsufficientStock {
            product_id: pid,
            requested,
            available,
        }) => {
            assert_eq!(pid, product_id);
            assert_eq!(requested, 25);
            assert_eq!(available, 20);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // Nothing committed: stock untouched, no sale rows at all
    assert_eq!(db.products().effective_stock(product_id).await.unwrap(), 20);

    let sale_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(sale_count, 0);

    let line_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sale_lines")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(line_count, 0);
}

#[tokio::test]
async fn strict_policy_counts_unlotted_surplus_as_available() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Fideos Guiseros", 85.0), Some((3, None)))
        .await
        .unwrap();

    // Manually granted surplus on the unlotted counter
    sqlx::query("UPDATE products SET unlotted_stock = 2 WHERE id = ?1")
        .bind(product_id)
        .execute(db.pool())
        .await
        .unwrap();

    // 3 in lots + 2 unlotted = 5 available, exactly enough
    db.sales()
        .register_sale(
            &cash_draft(vec![SaleLineDraft::new(product_id, 5, 85.0)]),
            StockPolicy::strict(),
        )
        .await
        .unwrap();

    assert_eq!(db.products().effective_stock(product_id).await.unwrap(), 0);
    assert_eq!(db.products().get(product_id).await.unwrap().unlotted_stock, 0);
}

#[tokio::test]
async fn intake_settles_oversold_units_before_stocking() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Pan Lactal", 120.0), None)
        .await
        .unwrap();

    // Oversell with no stock at all: 5 units owed
    db.sales()
        .register_sale(
            &cash_draft(vec![SaleLineDraft::new(product_id, 5, 120.0)]),
            StockPolicy::permissive(),
        )
        .await
        .unwrap();
    assert_eq!(db.products().get(product_id).await.unwrap().unlotted_stock, -5);

    // Intake of 12: 5 settle the debt, 7 become physical stock
    db.lots()
        .add_lot(product_id, 12, Some(date(2024, 12, 1)), None)
        .await
        .unwrap();

    let product = db.products().get(product_id).await.unwrap();
    assert_eq!(product.unlotted_stock, 0);
    assert_eq!(db.lots().total_lot_stock(product_id).await.unwrap(), 7);
    assert_eq!(db.products().effective_stock(product_id).await.unwrap(), 7);
}

#[tokio::test]
async fn small_intake_only_reduces_the_debt() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Azúcar 1kg", 90.0), None)
        .await
        .unwrap();

    db.sales()
        .register_sale(
            &cash_draft(vec![SaleLineDraft::new(product_id, 10, 90.0)]),
            StockPolicy::permissive(),
        )
        .await
        .unwrap();

    let lot_id = db.lots().add_lot(product_id, 4, None, None).await.unwrap();

    let product = db.products().get(product_id).await.unwrap();
    assert_eq!(product.unlotted_stock, -6);
    assert_eq!(db.lots().total_lot_stock(product_id).await.unwrap(), 0);

    // The whole intake went to settlement: no lot row was created
    assert_eq!(lot_id, None);
    assert!(db.lots().lots_for_product(product_id).await.unwrap().is_empty());
}

// =============================================================================
// Sale Transaction
// =============================================================================

#[tokio::test]
async fn sale_totals_and_lines_are_frozen_at_commit() {
    let db = test_db().await;

    let p1 = db
        .products()
        .create(&product_input("Café Molido", 500.0), Some((10, None)))
        .await
        .unwrap();
    let p2 = db
        .products()
        .create(&product_input("Galletitas", 130.0), Some((10, None)))
        .await
        .unwrap();

    let discounted = SaleLineDraft {
        product_id: p2,
        quantity: 2,
        unit_price: 130.0,
        discount_pct: 50.0,
    };
    let sale_id = db
        .sales()
        .register_sale(
            &cash_draft(vec![SaleLineDraft::new(p1, 1, 500.0), discounted]),
            StockPolicy::strict(),
        )
        .await
        .unwrap();

    let sale = db.sales().sale_by_id(sale_id).await.unwrap();
    assert_eq!(sale.lines.len(), 2);
    assert!((sale.header.total - 630.0).abs() < 1e-9);
    assert!((sale.lines[1].subtotal - 130.0).abs() < 1e-9);

    // A later price change never rewrites the committed sale
    db.products()
        .update(p1, &product_input("Café Molido", 999.0))
        .await
        .unwrap();
    let sale = db.sales().sale_by_id(sale_id).await.unwrap();
    assert!((sale.header.total - 630.0).abs() < 1e-9);
}

#[tokio::test]
async fn sale_with_unknown_product_rolls_back_entirely() {
    let db = test_db().await;

    let known = db
        .products()
        .create(&product_input("Detergente", 210.0), Some((10, None)))
        .await
        .unwrap();

    let result = db
        .sales()
        .register_sale(
            &cash_draft(vec![
                SaleLineDraft::new(known, 2, 210.0),
                SaleLineDraft::new(9999, 1, 50.0),
            ]),
            StockPolicy::permissive(),
        )
        .await;

    // The foreign key rejects the unknown product
    assert!(matches!(result, Err(StoreError::ForeignKeyViolation { .. })));

    // First line's depletion was rolled back with the rest
    assert_eq!(db.products().effective_stock(known).await.unwrap(), 10);
}

#[tokio::test]
async fn store_credit_without_customer_commits_without_movement() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Vino Tinto", 800.0), Some((5, None)))
        .await
        .unwrap();

    let mut draft = cash_draft(vec![SaleLineDraft::new(product_id, 1, 800.0)]);
    draft.payment_method = PaymentMethod::StoreCredit;

    // No account to book the debt on: the sale still commits, the ledger
    // entry is simply skipped
    let sale_id = db
        .sales()
        .register_sale(&draft, StockPolicy::strict())
        .await
        .unwrap();

    let sale = db.sales().sale_by_id(sale_id).await.unwrap();
    assert_eq!(sale.header.payment_method, PaymentMethod::StoreCredit);
    assert_eq!(sale.header.customer_id, None);
    assert_eq!(db.products().effective_stock(product_id).await.unwrap(), 4);

    let movement_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account_movements")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(movement_count, 0);
}

#[tokio::test]
async fn receipt_path_attaches_after_commit() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Sal Fina", 45.0), Some((5, None)))
        .await
        .unwrap();

    let sale_id = db
        .sales()
        .register_sale(
            &cash_draft(vec![SaleLineDraft::new(product_id, 1, 45.0)]),
            StockPolicy::strict(),
        )
        .await
        .unwrap();

    db.sales()
        .set_receipt_path(sale_id, "receipts/2024/sale-1.pdf")
        .await
        .unwrap();

    let sale = db.sales().sale_by_id(sale_id).await.unwrap();
    assert_eq!(
        sale.header.receipt_path.as_deref(),
        Some("receipts/2024/sale-1.pdf")
    );
}

// =============================================================================
// Credit Ledger & Repricing
// =============================================================================

#[tokio::test]
async fn debt_reprices_when_the_product_price_changes() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Yerba Mate 500g", 50.0), Some((10, None)))
        .await
        .unwrap();
    let customer_id = db
        .customers()
        .create(&CustomerInput {
            name: "Marta Gómez".to_string(),
            national_id: None,
            due_date: None,
        })
        .await
        .unwrap();

    // 4 × 50 on credit
    db.sales()
        .register_sale(
            &credit_draft(customer_id, vec![SaleLineDraft::new(product_id, 4, 50.0)]),
            StockPolicy::strict(),
        )
        .await
        .unwrap();

    assert!((db.ledger().balance(customer_id).await.unwrap() - 200.0).abs() < 1e-9);

    // Price rises to 60: the outstanding debt follows, 4 × 60 = 240
    db.products()
        .update(product_id, &product_input("Yerba Mate 500g", 60.0))
        .await
        .unwrap();
    assert!((db.ledger().balance(customer_id).await.unwrap() - 240.0).abs() < 1e-9);

    // A payment is fixed: 240 − 100 = 140
    db.ledger()
        .record_payment(customer_id, 100.0, Utc::now())
        .await
        .unwrap();
    assert!((db.ledger().balance(customer_id).await.unwrap() - 140.0).abs() < 1e-9);
}

#[tokio::test]
async fn movement_history_reprices_debts_and_lists_products() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Queso Rallado", 70.0), Some((10, None)))
        .await
        .unwrap();
    let customer_id = db
        .customers()
        .create(&CustomerInput {
            name: "Luis Paredes".to_string(),
            national_id: Some("30111222".to_string()),
            due_date: None,
        })
        .await
        .unwrap();

    db.sales()
        .register_sale(
            &credit_draft(customer_id, vec![SaleLineDraft::new(product_id, 3, 70.0)]),
            StockPolicy::strict(),
        )
        .await
        .unwrap();
    db.ledger()
        .record_payment(customer_id, 50.0, Utc::now())
        .await
        .unwrap();

    db.products()
        .update(product_id, &product_input("Queso Rallado", 100.0))
        .await
        .unwrap();

    let movements = db.ledger().movements(customer_id).await.unwrap();
    assert_eq!(movements.len(), 2);

    // Newest first: the payment, fixed amount, no product summary
    assert!((movements[0].amount - 50.0).abs() < 1e-9);
    assert!(movements[0].products.is_none());

    // The debt, repriced at the current price: 3 × 100
    assert!((movements[1].amount - 300.0).abs() < 1e-9);
    assert_eq!(movements[1].products.as_deref(), Some("Queso Rallado (x3)"));
    assert!(movements[1].sale_id.is_some());

    // Reading again without intervening writes yields the same sequence
    let again = db.ledger().movements(customer_id).await.unwrap();
    assert_eq!(again.len(), movements.len());
    for (a, b) in movements.iter().zip(&again) {
        assert_eq!(a.moved_at, b.moved_at);
        assert_eq!(a.sale_id, b.sale_id);
        assert!((a.amount - b.amount).abs() < 1e-9);
    }
}

#[tokio::test]
async fn payment_validation_and_overpayment() {
    let db = test_db().await;

    let customer_id = db
        .customers()
        .create(&CustomerInput {
            name: "Ana Ríos".to_string(),
            national_id: None,
            due_date: None,
        })
        .await
        .unwrap();

    assert!(matches!(
        db.ledger().record_payment(customer_id, 0.0, Utc::now()).await,
        Err(StoreError::Validation(_))
    ));
    assert!(matches!(
        db.ledger().record_payment(customer_id, -20.0, Utc::now()).await,
        Err(StoreError::Validation(_))
    ));

    // Overpaying is allowed: balance goes negative in the customer's favor
    db.ledger()
        .record_payment(customer_id, 80.0, Utc::now())
        .await
        .unwrap();
    assert!((db.ledger().balance(customer_id).await.unwrap() + 80.0).abs() < 1e-9);
}

#[tokio::test]
async fn payments_received_filters_by_date_range() {
    let db = test_db().await;

    let customer_id = db
        .customers()
        .create(&CustomerInput {
            name: "Pedro Sosa".to_string(),
            national_id: None,
            due_date: None,
        })
        .await
        .unwrap();

    let inside = Utc.with_ymd_and_hms(2024, 10, 15, 10, 0, 0).unwrap();
    let outside = Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap();

    db.ledger().record_payment(customer_id, 100.0, inside).await.unwrap();
    db.ledger().record_payment(customer_id, 40.0, inside).await.unwrap();
    db.ledger().record_payment(customer_id, 999.0, outside).await.unwrap();

    let total = db
        .ledger()
        .payments_received(date(2024, 10, 1), date(2024, 10, 31))
        .await
        .unwrap();
    assert!((total - 140.0).abs() < 1e-9);
}

#[tokio::test]
async fn customer_overview_carries_derived_balance() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Tomate Perita Lata", 95.0), Some((10, None)))
        .await
        .unwrap();
    let debtor = db
        .customers()
        .create(&CustomerInput {
            name: "Clara Núñez".to_string(),
            national_id: None,
            due_date: Some(date(2024, 11, 10)),
        })
        .await
        .unwrap();
    db.customers()
        .create(&CustomerInput {
            name: "Bruno Díaz".to_string(),
            national_id: None,
            due_date: None,
        })
        .await
        .unwrap();

    db.sales()
        .register_sale(
            &credit_draft(debtor, vec![SaleLineDraft::new(product_id, 2, 95.0)]),
            StockPolicy::strict(),
        )
        .await
        .unwrap();

    let debtors = db.customers().debtors().await.unwrap();
    assert_eq!(debtors.len(), 1);
    assert_eq!(debtors[0].id, debtor);
    assert!((debtors[0].balance - 190.0).abs() < 1e-9);

    // Accent-folded search
    let found = db.customers().overview(Some("nunez")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Clara Núñez");
}

// =============================================================================
// Replenishment Forecaster
// =============================================================================

#[tokio::test]
async fn forecaster_orders_for_velocity_and_owed_units() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Agua Mineral 2L", 70.0), Some((10, None)))
        .await
        .unwrap();

    // 25 units sold recently against 10 in stock: effective stock −15
    let mut draft = cash_draft(vec![SaleLineDraft::new(product_id, 25, 70.0)]);
    draft.sold_at = Utc::now() - Duration::days(5);
    db.sales()
        .register_sale(&draft, StockPolicy::permissive())
        .await
        .unwrap();

    let suggestions = db.forecast().suggest(30, 15).await.unwrap();
    assert_eq!(suggestions.len(), 1);

    let s = &suggestions[0];
    assert_eq!(s.product_id, product_id);
    assert_eq!(s.current_stock, -15);
    assert_eq!(s.units_sold, 25);
    // 25 / 30 days ≈ 0.833/day; target 0.833 × 15 = 12.5; 12.5 − (−15) → 28
    assert!((s.daily_velocity - 25.0 / 30.0).abs() < 1e-9);
    assert!((s.target_stock - 12.5).abs() < 1e-9);
    assert_eq!(s.reorder_qty, 28);
}

#[tokio::test]
async fn forecaster_skips_well_stocked_and_stale_products() {
    let db = test_db().await;

    // Plenty of stock, no recent sales: nothing to suggest
    db.products()
        .create(&product_input("Lavandina 1L", 55.0), Some((50, None)))
        .await
        .unwrap();

    // Sold long before the analysis window
    let old_seller = db
        .products()
        .create(&product_input("Vinagre", 48.0), Some((40, None)))
        .await
        .unwrap();
    let mut draft = cash_draft(vec![SaleLineDraft::new(old_seller, 5, 48.0)]);
    draft.sold_at = Utc::now() - Duration::days(90);
    db.sales()
        .register_sale(&draft, StockPolicy::strict())
        .await
        .unwrap();

    let suggestions = db.forecast().suggest(10, 5).await.unwrap();
    assert!(suggestions.is_empty());
}

#[tokio::test]
async fn forecaster_surfaces_low_stock_slow_movers() {
    let db = test_db().await;

    // One slow sale, stock under the low threshold after it
    let product_id = db
        .products()
        .create(&product_input("Pimentón", 35.0), Some((4, None)))
        .await
        .unwrap();
    let mut draft = cash_draft(vec![SaleLineDraft::new(product_id, 1, 35.0)]);
    draft.sold_at = Utc::now() - Duration::days(2);
    db.sales()
        .register_sale(&draft, StockPolicy::strict())
        .await
        .unwrap();

    // Velocity 1/30 per day over 7 coverage days barely misses a reorder,
    // but low stock + recent movement keeps it on the list.
    let suggestions = db.forecast().suggest(30, 7).await.unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].product_id, product_id);
    assert_eq!(suggestions[0].current_stock, 3);
    assert_eq!(suggestions[0].reorder_qty, 0);
}

#[tokio::test]
async fn forecaster_sorts_by_reorder_quantity() {
    let db = test_db().await;

    let small = db
        .products()
        .create(&product_input("Mermelada", 160.0), Some((2, None)))
        .await
        .unwrap();
    let big = db
        .products()
        .create(&product_input("Pan Rallado", 75.0), Some((2, None)))
        .await
        .unwrap();

    let mut draft = cash_draft(vec![
        SaleLineDraft::new(small, 4, 160.0),
        SaleLineDraft::new(big, 20, 75.0),
    ]);
    draft.sold_at = Utc::now() - Duration::days(3);
    db.sales()
        .register_sale(&draft, StockPolicy::permissive())
        .await
        .unwrap();

    let suggestions = db.forecast().suggest(7, 7).await.unwrap();
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].product_id, big);
    assert!(suggestions[0].reorder_qty > suggestions[1].reorder_qty);
}

// =============================================================================
// Reconciliation Job
// =============================================================================

#[tokio::test]
async fn reconciliation_drains_historical_awaiting_lines() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Polenta", 65.0), Some((10, None)))
        .await
        .unwrap();

    // Historical rows written before shortfall flowed into unlotted stock
    sqlx::query(
        "INSERT INTO sales (sold_at, total, payment_method) VALUES (?1, 780.0, 'cash')",
    )
    .bind(Utc::now())
    .execute(db.pool())
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO sale_lines (sale_id, product_id, quantity, unit_price,
                                 discount_pct, state, subtotal)
         VALUES (1, ?1, 12, 65.0, 0, 'awaiting_stock', 780.0)",
    )
    .bind(product_id)
    .execute(db.pool())
    .await
    .unwrap();

    let reconciled = db.sales().reconcile_awaiting_lines().await.unwrap();
    assert_eq!(reconciled, 1);

    // 10 covered from lots, 2 pushed into the unlotted counter
    assert_eq!(db.lots().total_lot_stock(product_id).await.unwrap(), 0);
    assert_eq!(db.products().get(product_id).await.unwrap().unlotted_stock, -2);

    let state: String = sqlx::query_scalar("SELECT state FROM sale_lines WHERE id = 1")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(state, "fulfilled");

    // Idempotent: a second run finds nothing
    assert_eq!(db.sales().reconcile_awaiting_lines().await.unwrap(), 0);
    assert_eq!(db.products().get(product_id).await.unwrap().unlotted_stock, -2);
}

// =============================================================================
// Catalog & Reports
// =============================================================================

#[tokio::test]
async fn catalog_search_folds_accents() {
    let db = test_db().await;

    db.products()
        .create(&product_input("Café Molido 500g", 500.0), None)
        .await
        .unwrap();
    db.products()
        .create(&product_input("Té Negro", 220.0), None)
        .await
        .unwrap();

    let found = db.products().overview(Some("cafe")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Café Molido 500g");
}

#[tokio::test]
async fn duplicate_barcode_is_a_unique_violation() {
    let db = test_db().await;

    let mut input = product_input("Shampoo", 350.0);
    input.barcode = Some("7791234567890".to_string());
    db.products().create(&input, None).await.unwrap();

    let mut dup = product_input("Acondicionador", 360.0);
    dup.barcode = Some("7791234567890".to_string());
    let result = db.products().create(&dup, None).await;
    assert!(matches!(result, Err(StoreError::UniqueViolation { .. })));
}

#[tokio::test]
async fn sales_in_range_returns_lines_newest_first() {
    let db = test_db().await;

    let product_id = db
        .products()
        .create(&product_input("Manteca", 190.0), Some((10, None)))
        .await
        .unwrap();

    let mut first = cash_draft(vec![SaleLineDraft::new(product_id, 1, 190.0)]);
    first.sold_at = Utc.with_ymd_and_hms(2024, 10, 10, 9, 0, 0).unwrap();
    let mut second = cash_draft(vec![SaleLineDraft::new(product_id, 2, 190.0)]);
    second.sold_at = Utc.with_ymd_and_hms(2024, 10, 12, 9, 0, 0).unwrap();

    db.sales().register_sale(&first, StockPolicy::strict()).await.unwrap();
    db.sales().register_sale(&second, StockPolicy::strict()).await.unwrap();

    let sales = db
        .sales()
        .sales_in_range(date(2024, 10, 1), date(2024, 10, 31))
        .await
        .unwrap();
    assert_eq!(sales.len(), 2);
    assert_eq!(sales[0].lines[0].quantity, 2);
    assert_eq!(sales[1].lines[0].quantity, 1);

    let revenue = db
        .sales()
        .revenue_in_range(date(2024, 10, 1), date(2024, 10, 31))
        .await
        .unwrap();
    assert!((revenue - 570.0).abs() < 1e-9);

    // Range excludes both sales
    let empty = db
        .sales()
        .sales_in_range(date(2024, 11, 1), date(2024, 11, 30))
        .await
        .unwrap();
    assert!(empty.is_empty());
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn user_login_verifies_password_digest() {
    let db = test_db().await;

    db.users()
        .create_user("marta", "secreto123", Role::Administrator)
        .await
        .unwrap();

    let user = db.users().verify("marta", "secreto123").await.unwrap();
    assert!(user.is_some());
    assert_eq!(user.unwrap().role, Role::Administrator);

    assert!(db.users().verify("marta", "wrong").await.unwrap().is_none());
    assert!(db.users().verify("nobody", "secreto123").await.unwrap().is_none());

    db.users().change_password("marta", "nuevo456").await.unwrap();
    assert!(db.users().verify("marta", "secreto123").await.unwrap().is_none());
    assert!(db.users().verify("marta", "nuevo456").await.unwrap().is_some());
}
