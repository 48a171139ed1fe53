//! # Stock Ledger
//!
//! Every operation that reads lot quantities and then writes them runs
//! here, inside one `BEGIN IMMEDIATE` transaction.
//!
//! ## Locking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SQLite has no SELECT ... FOR UPDATE. BEGIN IMMEDIATE takes the        │
//! │  database write lock before the first read, which is the same thing    │
//! │  at database granularity:                                              │
//! │                                                                         │
//! │  T1: BEGIN IMMEDIATE ── read lots ── plan ── write ── COMMIT           │
//! │  T2:        BEGIN IMMEDIATE ·········· waits ········ ── read lots ... │
//! │                                                       (sees T1's rows) │
//! │                                                                         │
//! │  T2 waits up to DbConfig::lock_timeout, then fails with Contention.    │
//! │  Readers (WAL) are never blocked.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Inside a transaction, lots of a product are visited in `(expiry_date,
//! id)` order and products in sorted id order.
//!
//! ## Operations
//!
//! - [`stock`] - create_lot, deplete, credit, corrections, stock queries
//! - [`settlement`] - settle a cart into a sale
//! - [`reversal`] - undo a sale, restocking every line

pub mod reversal;
pub mod settlement;
pub mod stock;

use apoteca_core::{DepletionPlan, Product};
use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::warn;

use crate::error::{LedgerError, LedgerResult};
use crate::repository::lot::{lock_available_in, write_quantities_in};

/// Ledger behavior taken from `DbConfig`.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Days until a synthetic return lot expires.
    pub return_lot_shelf_life_days: i64,
}

/// The stock ledger service.
///
/// Cheap to create; obtain one per call from [`crate::Database::ledger`].
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
    settings: LedgerSettings,
}

impl Ledger {
    pub fn new(pool: SqlitePool, settings: LedgerSettings) -> Self {
        Ledger { pool, settings }
    }

    /// Opens a transaction holding the database write lock.
    async fn begin_locked(&self) -> LedgerResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|err| {
                let err = LedgerError::from(err);
                if err.is_retryable() {
                    warn!(error = %err, "Ledger lock not acquired");
                }
                err
            })
    }
}

/// Plans and applies a FEFO depletion of `units` of `product`.
///
/// Nothing is written unless the whole plan succeeds.
pub(crate) async fn deplete_in(
    conn: &mut SqliteConnection,
    product: &Product,
    units: i64,
) -> LedgerResult<DepletionPlan> {
    let lots = lock_available_in(&mut *conn, &product.id).await?;
    let mut plan = apoteca_core::plan_depletion(&product.id, &lots, units, product.ratio())
        .inspect_err(|err| {
            warn!(product_id = %product.id, requested = units, error = %err, "Depletion refused");
        })?;

    let now = Utc::now();
    for (debit, lot) in plan.debits.iter().zip(plan.lots.iter_mut()) {
        lot.updated_at = now;
        write_quantities_in(&mut *conn, lot, lot.available_units + debit.units).await?;
    }

    Ok(plan)
}
