//! # FEFO Depletion Planning
//!
//! Decides which lots a sale draws from. Stock leaves in
//! First-Expiring-First-Out order: the lot that expires soonest is sold
//! first, regardless of when it was received.
//!
//! ## Algorithm
//! ```text
//! lots (available > 0) sorted by (expiry_date, id)
//!
//!   required = 100
//!   ┌──────────────────────┐  ┌──────────────────────┐
//!   │ 2025-01-01   80 units│  │ 2025-06-01   50 units│
//!   └──────────┬───────────┘  └──────────┬───────────┘
//!              │ 80 <= 100: drain        │ 50 > 20: debit 20
//!              ▼                         ▼
//!          0 units, remaining 20     30 units, remaining 0
//!
//!   remaining > 0 after the last lot ──► InsufficientStock, plan discarded
//! ```
//!
//! The planner works on copies and returns the new state of every touched
//! lot. Nothing is written until the whole plan is known to succeed, so a
//! failed plan has no partial effect. `apoteca-db` applies the plan inside
//! the same locked transaction that read the lots.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::Lot;
use crate::validation::validate_units;

/// Units taken from one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDebit {
    pub lot_id: String,
    pub lot_code: String,
    pub units: i64,
    /// The lot is empty after this debit.
    pub drained: bool,
}

/// The outcome of planning a depletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepletionPlan {
    pub product_id: String,
    pub requested: i64,
    /// Debits in the order they were taken.
    pub debits: Vec<LotDebit>,
    /// Post-debit state of every touched lot, same order as `debits`.
    pub lots: Vec<Lot>,
}

impl DepletionPlan {
    /// Total units taken. Equals `requested` for every returned plan.
    pub fn total_units(&self) -> i64 {
        self.debits.iter().map(|d| d.units).sum()
    }
}

/// Plans taking `required` units of `product_id` from `lots`.
///
/// `lots` may arrive in any order and may include empty lots or lots of
/// other products; only this product's lots with stock are considered, in
/// `(expiry_date, id)` order.
///
/// ## Errors
/// - `Validation` if `required` is negative
/// - `InsufficientStock` if the lots hold fewer than `required` units
pub fn plan_depletion(
    product_id: &str,
    lots: &[Lot],
    required: i64,
    ratio: i64,
) -> CoreResult<DepletionPlan> {
    validate_units(required)?;

    let mut candidates: Vec<&Lot> = lots
        .iter()
        .filter(|lot| lot.product_id == product_id && lot.available_units > 0)
        .collect();
    candidates.sort_by(|a, b| {
        a.expiry_date
            .cmp(&b.expiry_date)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut remaining = required;
    let mut debits = Vec::new();
    let mut touched = Vec::new();

    for lot in candidates {
        if remaining <= 0 {
            break;
        }

        let mut updated = lot.clone();
        let take = if lot.available_units <= remaining {
            lot.available_units
        } else {
            remaining
        };
        updated.debit(take, ratio)?;
        remaining -= take;

        debits.push(LotDebit {
            lot_id: lot.id.clone(),
            lot_code: lot.lot_code.clone(),
            units: take,
            drained: updated.available_units == 0,
        });
        touched.push(updated);
    }

    if remaining > 0 {
        return Err(CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            available: required - remaining,
            requested: required,
        });
    }

    Ok(DepletionPlan {
        product_id: product_id.to_string(),
        requested: required,
        debits,
        lots: touched,
    })
}
