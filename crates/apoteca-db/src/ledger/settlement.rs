//! # Sale Settlement
//!
//! Turns a validated cart into a persisted sale in one locked transaction.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  request.validate()                  EmptyCart / quantity / staff       │
//! │       │                                                                 │
//! │  BEGIN IMMEDIATE                                                        │
//! │       │                                                                 │
//! │  resolve every product               ProductNotFound before any write   │
//! │       │                                                                 │
//! │  INSERT sale (total 0)                                                  │
//! │       │                                                                 │
//! │  units_by_product ──► deplete_in     one FEFO walk per product,        │
//! │       │                              sorted product-id order            │
//! │  INSERT one sale_line per cart line  unit price snapshot                │
//! │       │                                                                 │
//! │  UPDATE sale total = Σ subtotals                                        │
//! │       │                                                                 │
//! │  COMMIT ──► SaleRecord                                                  │
//! │                                                                         │
//! │  Any error before COMMIT drops the transaction: no sale, no line,      │
//! │  no lot change survives.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use apoteca_core::pricing::unit_price;
use apoteca_core::{CoreError, Money, Product, SaleLine, SaleRecord, SaleRequest};
use chrono::Utc;
use tracing::{debug, info};

use super::{deplete_in, Ledger};
use crate::error::LedgerResult;
use crate::repository::product as product_repo;
use crate::repository::{generate_id, sale as sale_repo};

impl Ledger {
    /// Settles a sale.
    ///
    /// ## Errors
    /// * `EmptyCart`, `Validation` - bad request shape; nothing is opened
    /// * `ProductNotFound` - a line names an unknown product
    /// * `InsufficientStock` - some product can't be covered; the whole sale
    ///   is rolled back
    /// * `Contention` - the write lock wasn't acquired in time (retryable)
    pub async fn settle(&self, request: &SaleRequest) -> LedgerResult<SaleRecord> {
        request.validate()?;
        debug!(
            staff_id = %request.staff_id,
            lines = request.lines.len(),
            "Settling sale"
        );

        let mut tx = self.begin_locked().await?;

        let mut products: BTreeMap<String, Product> = BTreeMap::new();
        for product_id in request.product_ids() {
            let product = product_repo::require_in(&mut *tx, &product_id).await?;
            products.insert(product_id, product);
        }

        let now = Utc::now();
        let mut sale = sale_repo::insert_sale_in(
            &mut *tx,
            &generate_id(),
            request.customer_id.as_deref(),
            &request.staff_id,
            request.payment_method,
            now,
        )
        .await?;

        let units = request.units_by_product(|id| products.get(id).map(Product::ratio))?;
        for (product_id, required) in &units {
            let product = resolved(&products, product_id)?;
            deplete_in(&mut *tx, product, *required).await?;
        }

        let mut lines = Vec::with_capacity(request.lines.len());
        for cart_line in &request.lines {
            let product = resolved(&products, &cart_line.product_id)?;
            let price = unit_price(product, cart_line.unit);
            let line = SaleLine {
                id: generate_id(),
                sale_id: sale.id.clone(),
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                quantity: cart_line.quantity,
                unit: cart_line.unit,
                unit_price_cents: price.cents(),
                subtotal_cents: price.multiply_quantity(cart_line.quantity).cents(),
                created_at: now,
            };
            sale_repo::insert_line_in(&mut *tx, &line).await?;
            lines.push(line);
        }

        let total: Money = lines.iter().map(SaleLine::subtotal).sum();
        sale_repo::update_total_in(&mut *tx, &sale.id, total.cents(), now).await?;
        sale.total_cents = total.cents();

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            total = %total,
            lines = lines.len(),
            payment_method = ?sale.payment_method,
            "Sale settled"
        );
        Ok(SaleRecord { sale, lines })
    }
}

/// A product loaded by the resolve step.
fn resolved<'a>(products: &'a BTreeMap<String, Product>, id: &str) -> LedgerResult<&'a Product> {
    products
        .get(id)
        .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
}
