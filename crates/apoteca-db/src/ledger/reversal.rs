//! # Sale Reversal
//!
//! Undoes a settled sale: every line's units go back on a shelf, then the
//! lines and the sale are deleted. One locked transaction.
//!
//! ## Where Returned Units Go
//! ```text
//! for each line (units = quantity × ratio for boxes):
//!
//!   product has a lot with expiry_date >= today?
//!        │
//!        ├── yes ──► credit the soonest-expiring one (even if it is empty)
//!        │
//!        └── no  ──► create a return lot (is_return = 1)
//!                    expiring today + return_lot_shelf_life_days,
//!                    then credit it; later lines of the same product
//!                    find it as a valid lot
//! ```
//!
//! The units are not traced back to the lots they left: FEFO may have
//! drained lots that have since expired or been deleted. Reversal never
//! fails for lack of a place to put stock.

use apoteca_core::packaging::units_for;
use apoteca_core::validation::date_after;
use apoteca_core::{CoreError, NewLot};
use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use super::Ledger;
use crate::error::LedgerResult;
use crate::repository::lot as lot_repo;
use crate::repository::product as product_repo;
use crate::repository::sale as sale_repo;
use crate::today;

impl Ledger {
    /// Reverses a sale, restocking every line.
    ///
    /// ## Errors
    /// * `SaleNotFound`
    /// * `OutOfRange` - a return lot is needed and the configured shelf life
    ///   is outside `0..=MAX_DAYS_AHEAD`; nothing is restocked
    /// * `Contention` - the write lock wasn't acquired in time (retryable)
    pub async fn reverse(&self, sale_id: &str) -> LedgerResult<()> {
        self.reverse_as_of(sale_id, today()).await
    }

    /// [`Self::reverse`] with an explicit current date.
    pub async fn reverse_as_of(&self, sale_id: &str, today: NaiveDate) -> LedgerResult<()> {
        debug!(sale_id = %sale_id, %today, "Reversing sale");

        let mut tx = self.begin_locked().await?;

        if sale_repo::fetch_in(&mut *tx, sale_id).await?.is_none() {
            return Err(CoreError::SaleNotFound(sale_id.to_string()).into());
        }
        let lines = sale_repo::lines_in(&mut *tx, sale_id).await?;

        let mut restocked = 0_i64;

        for line in &lines {
            let product = product_repo::require_in(&mut *tx, &line.product_id).await?;
            let ratio = product.ratio();
            let units = units_for(line.quantity, line.unit, ratio)?;

            let mut lot = match lot_repo::first_valid_in(&mut *tx, &product.id, today).await? {
                Some(lot) => lot,
                None => {
                    let return_expiry = date_after(
                        today,
                        "return_lot_shelf_life_days",
                        self.settings.return_lot_shelf_life_days,
                    )?;
                    let lot = lot_repo::insert_in(
                        &mut *tx,
                        &product,
                        &NewLot::boxes(0, return_expiry),
                        true,
                    )
                    .await?;
                    info!(
                        product_id = %product.id,
                        lot_code = %lot.lot_code,
                        expiry = %lot.expiry_date,
                        "Return lot created"
                    );
                    lot
                }
            };

            let before = lot.available_units;
            lot.credit(units, ratio)?;
            lot.updated_at = Utc::now();
            lot_repo::write_quantities_in(&mut *tx, &lot, before).await?;
            restocked += units;

            debug!(lot_code = %lot.lot_code, units, "Line restocked");
        }

        sale_repo::delete_in(&mut *tx, sale_id).await?;
        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            lines = lines.len(),
            units = restocked,
            "Sale reversed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{assert_ledger_consistent, date, saved_product, stock_lot, test_db};
    use crate::ledger::{Ledger, LedgerSettings};
    use crate::{Database, DbConfig, LedgerError};
    use apoteca_core::{CartLine, CoreError, PaymentMethod, SaleRequest, SaleUnit, ValidationError};

    fn request(lines: Vec<CartLine>) -> SaleRequest {
        SaleRequest {
            customer_id: None,
            staff_id: "staff-1".to_string(),
            payment_method: PaymentMethod::Cash,
            lines,
        }
    }

    #[tokio::test]
    async fn test_sell_then_reverse_restores_totals() {
        let db = test_db().await;
        let today = date(2026, 1, 1);
        let amox = saved_product(&db, "Amoxicilina", 12_000, 10).await;
        let para = saved_product(&db, "Paracetamol", 5_000, 20).await;
        stock_lot(&db, &amox, 80, date(2026, 6, 1), today).await;
        stock_lot(&db, &amox, 50, date(2027, 1, 1), today).await;
        stock_lot(&db, &para, 40, date(2027, 1, 1), today).await;

        let record = db
            .ledger()
            .settle(&request(vec![
                CartLine::new(&amox.id, 9, SaleUnit::Box),
                CartLine::new(&amox.id, 3, SaleUnit::Blister),
                CartLine::new(&para.id, 1, SaleUnit::Box),
            ]))
            .await
            .unwrap();
        assert_eq!(db.ledger().total_available(&amox.id).await.unwrap(), 37);
        assert_eq!(db.ledger().total_available(&para.id).await.unwrap(), 20);

        db.ledger().reverse_as_of(&record.sale.id, today).await.unwrap();

        assert_eq!(db.ledger().total_available(&amox.id).await.unwrap(), 130);
        assert_eq!(db.ledger().total_available(&para.id).await.unwrap(), 40);
        assert!(db.sales().get_record(&record.sale.id).await.unwrap().is_none());
        assert_eq!(db.sales().count_lines_for_product(&amox.id).await.unwrap(), 0);
        assert_ledger_consistent(&db).await;
    }

    #[tokio::test]
    async fn test_reversal_credits_soonest_valid_lot() {
        let db = test_db().await;
        let amox = saved_product(&db, "Amoxicilina", 12_000, 10).await;
        let old = stock_lot(&db, &amox, 10, date(2026, 2, 1), date(2026, 1, 1)).await;
        let soon = stock_lot(&db, &amox, 0, date(2026, 6, 1), date(2026, 1, 1)).await;
        let late = stock_lot(&db, &amox, 10, date(2027, 6, 1), date(2026, 1, 1)).await;

        let record = db
            .ledger()
            .settle(&request(vec![CartLine::new(&amox.id, 1, SaleUnit::Box)]))
            .await
            .unwrap();

        // `old` has expired by now; `soon` is empty but valid and expires first
        db.ledger()
            .reverse_as_of(&record.sale.id, date(2026, 3, 1))
            .await
            .unwrap();

        let lots = db.lots();
        assert_eq!(lots.get_by_id(&old.id).await.unwrap().unwrap().available_units, 0);
        assert_eq!(lots.get_by_id(&soon.id).await.unwrap().unwrap().available_units, 10);
        assert_eq!(lots.get_by_id(&late.id).await.unwrap().unwrap().available_units, 10);
    }

    #[tokio::test]
    async fn test_reversal_creates_return_lot_when_all_expired() {
        let config = DbConfig::in_memory().return_lot_shelf_life_days(180);
        let db = Database::new(config).await.unwrap();
        let amox = saved_product(&db, "Amoxicilina", 12_000, 10).await;
        stock_lot(&db, &amox, 30, date(2026, 2, 1), date(2026, 1, 1)).await;

        let record = db
            .ledger()
            .settle(&request(vec![
                CartLine::new(&amox.id, 2, SaleUnit::Box),
                CartLine::new(&amox.id, 4, SaleUnit::Blister),
            ]))
            .await
            .unwrap();

        let today = date(2026, 3, 1);
        db.ledger().reverse_as_of(&record.sale.id, today).await.unwrap();

        let lots = db.lots().list_for_product(&amox.id).await.unwrap();
        assert_eq!(lots.len(), 2);
        let returned = lots.iter().find(|l| l.is_return).unwrap();
        // Both lines landed in the single return lot
        assert_eq!(returned.available_units, 24);
        assert_eq!((returned.boxes, returned.blisters), (2, 4));
        assert_eq!(returned.expiry_date, date(2026, 8, 28));
        assert_eq!(returned.lot_code, "AM02LT");
        assert_ledger_consistent(&db).await;
    }

    #[tokio::test]
    async fn test_unusable_shelf_life_fails_reversal_cleanly() {
        let db = test_db().await;
        // `DbConfig` clamps this; a hand-built ledger can still carry it
        let ledger = Ledger::new(
            db.pool().clone(),
            LedgerSettings {
                return_lot_shelf_life_days: i64::MAX,
            },
        );
        let amox = saved_product(&db, "Amoxicilina", 12_000, 10).await;
        stock_lot(&db, &amox, 30, date(2026, 2, 1), date(2026, 1, 1)).await;

        let record = db
            .ledger()
            .settle(&request(vec![CartLine::new(&amox.id, 1, SaleUnit::Box)]))
            .await
            .unwrap();

        let err = ledger
            .reverse_as_of(&record.sale.id, date(2026, 3, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        // Rolled back: the sale survives and no return lot appeared
        assert!(db.sales().get_record(&record.sale.id).await.unwrap().is_some());
        assert_eq!(db.lots().list_for_product(&amox.id).await.unwrap().len(), 1);
        assert_eq!(db.ledger().total_available(&amox.id).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_reverse_unknown_sale() {
        let db = test_db().await;
        let err = db.ledger().reverse("nope").await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::SaleNotFound(_))));
    }

    #[tokio::test]
    async fn test_reverse_twice_fails_second_time() {
        let db = test_db().await;
        let amox = saved_product(&db, "Amoxicilina", 12_000, 10).await;
        stock_lot(&db, &amox, 30, date(2030, 1, 1), date(2026, 1, 1)).await;

        let record = db
            .ledger()
            .settle(&request(vec![CartLine::new(&amox.id, 1, SaleUnit::Box)]))
            .await
            .unwrap();
        db.ledger().reverse(&record.sale.id).await.unwrap();
        assert!(db.ledger().reverse(&record.sale.id).await.is_err());
        assert_eq!(db.ledger().total_available(&amox.id).await.unwrap(), 30);
    }
}
