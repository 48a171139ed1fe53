//! Shared fixtures for the database tests.

use apoteca_core::{Money, NewLot, PricePolicy, Product};
use chrono::NaiveDate;

use crate::repository::generate_id;
use crate::{Database, DbConfig};

pub(crate) async fn test_db() -> Database {
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// An unsaved product bought at half its sale price.
pub(crate) fn product(name: &str, sale_cents: i64, blisters_per_box: i64) -> Product {
    Product::new(
        generate_id(),
        name,
        Money::from_cents(sale_cents / 2),
        Money::from_cents(sale_cents),
        blisters_per_box,
    )
}

pub(crate) async fn saved_product(
    db: &Database,
    name: &str,
    sale_cents: i64,
    blisters_per_box: i64,
) -> Product {
    db.products()
        .insert(product(name, sale_cents, blisters_per_box), PricePolicy::Enforce)
        .await
        .expect("product insert")
}

/// Receives `units` loose units of `product` expiring on `expiry`, as of `today`.
pub(crate) async fn stock_lot(
    db: &Database,
    product: &Product,
    units: i64,
    expiry: NaiveDate,
    today: NaiveDate,
) -> apoteca_core::Lot {
    db.ledger()
        .create_lot_as_of(&product.id, &NewLot::boxes(0, expiry).with_blisters(units), today)
        .await
        .expect("lot insert")
}

/// Asserts the box/blister invariant on every lot in the database.
pub(crate) async fn assert_ledger_consistent(db: &Database) {
    for product in db.products().list(u32::MAX).await.expect("products") {
        for lot in db
            .lots()
            .list_for_product(&product.id)
            .await
            .expect("lots")
        {
            assert!(
                lot.is_consistent(product.ratio()),
                "lot {} inconsistent: {} boxes, {} blisters, {} units (ratio {})",
                lot.lot_code,
                lot.boxes,
                lot.blisters,
                lot.available_units,
                product.ratio()
            );
        }
    }
}
