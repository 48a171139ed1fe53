//! # Stock Operations
//!
//! Receiving lots, FEFO depletion, restocking, and the stock queries built
//! on the ledger.
//!
//! ## Depletion Walk
//! ```text
//! deplete(product, 100)                    lots of product, available > 0
//!      │                                   ORDER BY expiry_date, id
//!      ▼
//! BEGIN IMMEDIATE ──► lock_available_in ──► plan_depletion (apoteca-core)
//!                                                │
//!                          ┌─────────────────────┴────────────┐
//!                          ▼                                  ▼
//!                    plan complete                   InsufficientStock
//!                    write each lot                  drop tx (rollback)
//!                    COMMIT                          nothing persisted
//! ```

use apoteca_core::packaging::to_units;
use apoteca_core::pricing;
use apoteca_core::validation::validate_lot_count;
use apoteca_core::{CoreError, DepletionPlan, Lot, Money, NewLot, StockStatus};
use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use super::{deplete_in, Ledger};
use crate::error::LedgerResult;
use crate::repository::lot::{self as lot_repo, LotRepository};
use crate::repository::product as product_repo;
use crate::repository::product::ProductRepository;
use crate::today;

impl Ledger {
    fn lots(&self) -> LotRepository {
        LotRepository::new(self.pool.clone())
    }

    async fn require_product(&self, product_id: &str) -> LedgerResult<apoteca_core::Product> {
        ProductRepository::new(self.pool.clone())
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()).into())
    }

    // =========================================================================
    // Receiving
    // =========================================================================

    /// Receives a new lot of a product.
    ///
    /// ## Errors
    /// * `NegativeQuantity` - boxes or blisters below zero
    /// * `ExpiredLot` - expiry before today
    /// * `ManufactureAfterExpiry` - manufacture date not before expiry
    /// * `ProductNotFound`
    pub async fn create_lot(&self, product_id: &str, new_lot: &NewLot) -> LedgerResult<Lot> {
        self.create_lot_as_of(product_id, new_lot, today()).await
    }

    /// [`Self::create_lot`] with an explicit current date.
    pub async fn create_lot_as_of(
        &self,
        product_id: &str,
        new_lot: &NewLot,
        today: NaiveDate,
    ) -> LedgerResult<Lot> {
        new_lot.validate(today)?;

        let mut tx = self.begin_locked().await?;
        let product = product_repo::require_in(&mut *tx, product_id).await?;
        let lot = lot_repo::insert_in(&mut *tx, &product, new_lot, false).await?;
        tx.commit().await?;

        info!(
            product_id = %product_id,
            lot_code = %lot.lot_code,
            units = lot.available_units,
            expiry = %lot.expiry_date,
            "Lot received"
        );
        Ok(lot)
    }

    // =========================================================================
    // Depletion / Credit
    // =========================================================================

    /// Takes `required_units` of a product in FEFO order.
    ///
    /// Expired lots are not skipped; they expire first, so they are drawn
    /// first. Whether expired stock may be sold is the caller's decision.
    ///
    /// ## Errors
    /// * `InsufficientStock` - the product's lots hold fewer units; no lot
    ///   is changed
    /// * `ProductNotFound`
    /// * `Contention` - the write lock wasn't acquired in time (retryable)
    pub async fn deplete(&self, product_id: &str, required_units: i64) -> LedgerResult<DepletionPlan> {
        debug!(product_id = %product_id, required_units, "Depleting stock");

        let mut tx = self.begin_locked().await?;
        let product = product_repo::require_in(&mut *tx, product_id).await?;
        let plan = deplete_in(&mut *tx, &product, required_units).await?;
        tx.commit().await?;

        info!(
            product_id = %product_id,
            units = plan.total_units(),
            lots = plan.debits.len(),
            "Stock depleted"
        );
        Ok(plan)
    }

    /// Returns `units` to a lot.
    pub async fn credit(&self, lot_id: &str, units: i64) -> LedgerResult<Lot> {
        let mut tx = self.begin_locked().await?;
        let mut lot = lot_repo::require_in(&mut *tx, lot_id).await?;
        let product = product_repo::require_in(&mut *tx, &lot.product_id).await?;

        let before = lot.available_units;
        lot.credit(units, product.ratio())?;
        lot.updated_at = Utc::now();
        lot_repo::write_quantities_in(&mut *tx, &lot, before).await?;
        tx.commit().await?;

        info!(lot_code = %lot.lot_code, units, "Lot credited");
        Ok(lot)
    }

    // =========================================================================
    // Corrections
    // =========================================================================

    /// Overwrites a lot's count after a physical stock take.
    pub async fn correct_lot_quantity(
        &self,
        lot_id: &str,
        boxes: i64,
        blisters: i64,
    ) -> LedgerResult<Lot> {
        validate_lot_count("boxes", boxes)?;
        validate_lot_count("blisters", blisters)?;

        let mut tx = self.begin_locked().await?;
        let mut lot = lot_repo::require_in(&mut *tx, lot_id).await?;
        let product = product_repo::require_in(&mut *tx, &lot.product_id).await?;

        let before = lot.available_units;
        let ratio = product.ratio();
        lot.set_available_units(to_units(boxes, blisters, ratio)?, ratio)?;
        lot.updated_at = Utc::now();
        lot_repo::write_quantities_in(&mut *tx, &lot, before).await?;
        tx.commit().await?;

        info!(
            lot_code = %lot.lot_code,
            before,
            after = lot.available_units,
            "Lot quantity corrected"
        );
        Ok(lot)
    }

    /// Deletes a lot.
    ///
    /// A lot that still holds stock is only deleted with `confirm`;
    /// otherwise this fails with `LotNotEmpty` and nothing changes.
    pub async fn delete_lot(&self, lot_id: &str, confirm: bool) -> LedgerResult<()> {
        let mut tx = self.begin_locked().await?;
        let lot = lot_repo::require_in(&mut *tx, lot_id).await?;

        if lot.available_units > 0 && !confirm {
            return Err(CoreError::LotNotEmpty {
                lot_code: lot.lot_code,
                available: lot.available_units,
            }
            .into());
        }

        lot_repo::delete_in(&mut *tx, lot_id).await?;
        tx.commit().await?;

        info!(
            lot_code = %lot.lot_code,
            discarded_units = lot.available_units,
            "Lot deleted"
        );
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Units on hand across every lot of a product.
    pub async fn total_available(&self, product_id: &str) -> LedgerResult<i64> {
        Ok(self.lots().total_available(product_id).await?)
    }

    /// The current price of one blister of a product.
    pub async fn price_per_blister(&self, product_id: &str) -> LedgerResult<Money> {
        let product = self.require_product(product_id).await?;
        Ok(pricing::price_per_blister(&product))
    }

    /// Classifies a product's stock against its minimum.
    pub async fn stock_status(&self, product_id: &str) -> LedgerResult<StockStatus> {
        let product = self.require_product(product_id).await?;
        let total = self.lots().total_available(product_id).await?;
        Ok(StockStatus::classify(total, product.min_stock))
    }

    /// Earliest expiry among the product's lots that haven't expired.
    pub async fn nearest_valid_expiry(&self, product_id: &str) -> LedgerResult<Option<NaiveDate>> {
        Ok(self.lots().nearest_valid_expiry(product_id, today()).await?)
    }

    /// Lots with stock expiring within `days` days from today.
    pub async fn expiring_within(&self, days: i64) -> LedgerResult<Vec<Lot>> {
        self.lots().expiring_within(days, today()).await
    }
}
