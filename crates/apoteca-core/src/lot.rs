//! # Lot Bookkeeping
//!
//! Rules for receiving lots and keeping their quantities consistent.
//!
//! ## The Ledger Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  available_units == boxes * ratio + blisters        (always)            │
//! │  available_units >= 0                               (always)            │
//! │                                                                         │
//! │  available_units is the source of truth. Every mutation changes it     │
//! │  first, then re-derives (boxes, blisters) from it:                     │
//! │                                                                         │
//! │     debit(7)  : 34 ──► 27 ──► (2 boxes, 7 blisters)                    │
//! │     credit(5) : 27 ──► 32 ──► (3 boxes, 2 blisters)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lot Codes
//! `{PREFIX}{seq:02}LT`, e.g. the third lot of "Amoxicilina" is `AM03LT`.
//! Codes are unique per product only; two products starting with the same
//! letters share codes, and lookups are always scoped by product.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::packaging::{add_units, to_boxes_and_blisters, to_units};
use crate::types::Lot;
use crate::validation::{validate_lot_count, validate_lot_dates, validate_units, ValidationResult};

/// Suffix of every generated lot code.
pub const LOT_CODE_SUFFIX: &str = "LT";

/// Incoming stock for a new lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLot {
    pub boxes: i64,
    pub blisters: i64,
    pub expiry_date: NaiveDate,
    pub manufactured_on: Option<NaiveDate>,
}

impl NewLot {
    /// Stock counted in whole boxes.
    pub fn boxes(boxes: i64, expiry_date: NaiveDate) -> Self {
        NewLot {
            boxes,
            blisters: 0,
            expiry_date,
            manufactured_on: None,
        }
    }

    /// Adds loose blisters.
    pub fn with_blisters(mut self, blisters: i64) -> Self {
        self.blisters = blisters;
        self
    }

    /// Sets the manufacture date.
    pub fn manufactured(mut self, date: NaiveDate) -> Self {
        self.manufactured_on = Some(date);
        self
    }

    /// Checks quantities and dates as of `today`.
    pub fn validate(&self, today: NaiveDate) -> ValidationResult<()> {
        validate_lot_count("boxes", self.boxes)?;
        validate_lot_count("blisters", self.blisters)?;
        validate_lot_dates(self.expiry_date, self.manufactured_on, today)
    }

    /// Normalized `(boxes, blisters, available_units)` for `ratio`.
    ///
    /// Fails with `OutOfRange` when the lot would hold more than
    /// `MAX_LOT_UNITS`.
    pub fn quantities(&self, ratio: i64) -> ValidationResult<(i64, i64, i64)> {
        let units = to_units(self.boxes, self.blisters, ratio)?;
        validate_lot_count("units", units)?;
        let (boxes, blisters) = to_boxes_and_blisters(units, ratio);
        Ok((boxes, blisters, units))
    }
}

/// First two letters of the product name, uppercased.
///
/// Non-letters are skipped; short names are padded with `X`.
///
/// ## Example
/// ```rust
/// use apoteca_core::lot::lot_code_prefix;
///
/// assert_eq!(lot_code_prefix("amoxicilina"), "AM");
/// assert_eq!(lot_code_prefix("5-Fluorouracil"), "FL");
/// assert_eq!(lot_code_prefix("Q"), "QX");
/// ```
pub fn lot_code_prefix(product_name: &str) -> String {
    let mut prefix: String = product_name
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect();
    while prefix.chars().count() < 2 {
        prefix.push('X');
    }
    prefix
}

/// Builds a lot code from a product name and per-product sequence.
///
/// ## Example
/// ```rust
/// use apoteca_core::lot::lot_code;
///
/// assert_eq!(lot_code("Amoxicilina 500mg", 3), "AM03LT");
/// assert_eq!(lot_code("Amoxicilina 500mg", 112), "AM112LT");
/// ```
pub fn lot_code(product_name: &str, sequence: i64) -> String {
    format!(
        "{}{:02}{}",
        lot_code_prefix(product_name),
        sequence,
        LOT_CODE_SUFFIX
    )
}

impl Lot {
    /// Removes `units` from the lot.
    ///
    /// Fails with `InsufficientStock` and leaves the lot untouched when the
    /// lot holds fewer than `units`.
    pub fn debit(&mut self, units: i64, ratio: i64) -> CoreResult<()> {
        validate_units(units)?;
        if units > self.available_units {
            return Err(CoreError::InsufficientStock {
                product_id: self.product_id.clone(),
                available: self.available_units,
                requested: units,
            });
        }
        self.set_available_units(self.available_units - units, ratio)
    }

    /// Returns `units` to the lot.
    pub fn credit(&mut self, units: i64, ratio: i64) -> CoreResult<()> {
        validate_units(units)?;
        self.set_available_units(add_units(self.available_units, units)?, ratio)
    }

    /// Overwrites the unit count and re-derives boxes and blisters.
    pub fn set_available_units(&mut self, units: i64, ratio: i64) -> CoreResult<()> {
        validate_lot_count("units", units)?;
        let (boxes, blisters) = to_boxes_and_blisters(units, ratio);
        self.available_units = units;
        self.boxes = boxes;
        self.blisters = blisters;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_LOT_UNITS;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lot_with(units: i64, ratio: i64) -> Lot {
        let now = Utc::now();
        let (boxes, blisters) = to_boxes_and_blisters(units, ratio);
        Lot {
            id: "lot-1".to_string(),
            product_id: "p-1".to_string(),
            lot_code: "AM01LT".to_string(),
            sequence: 1,
            boxes,
            blisters,
            available_units: units,
            expiry_date: date(2030, 1, 1),
            manufactured_on: None,
            is_return: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_debit_recomputes_boxes_and_blisters() {
        let mut lot = lot_with(34, 10);
        lot.debit(7, 10).unwrap();
        assert_eq!((lot.boxes, lot.blisters, lot.available_units), (2, 7, 27));
        assert!(lot.is_consistent(10));
    }

    #[test]
    fn test_debit_more_than_available_leaves_lot_untouched() {
        let mut lot = lot_with(5, 10);
        let before = lot.clone();
        let err = lot.debit(6, 10).unwrap_err();
        assert_eq!(err.shortfall(), Some(1));
        assert_eq!(lot, before);
    }

    #[test]
    fn test_debit_exactly_everything() {
        let mut lot = lot_with(20, 10);
        lot.debit(20, 10).unwrap();
        assert_eq!((lot.boxes, lot.blisters, lot.available_units), (0, 0, 0));
    }

    #[test]
    fn test_credit_recomputes() {
        let mut lot = lot_with(27, 10);
        lot.credit(5, 10).unwrap();
        assert_eq!((lot.boxes, lot.blisters, lot.available_units), (3, 2, 32));
    }

    #[test]
    fn test_negative_units_rejected() {
        let mut lot = lot_with(10, 10);
        assert!(matches!(lot.debit(-1, 10), Err(CoreError::Validation(_))));
        assert!(matches!(lot.credit(-1, 10), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_new_lot_quantities_are_normalized() {
        let new_lot = NewLot::boxes(1, date(2030, 1, 1)).with_blisters(12);
        assert_eq!(new_lot.quantities(10).unwrap(), (2, 2, 22));
    }

    #[test]
    fn test_oversized_lots_are_rejected() {
        let expiry = date(2030, 1, 1);
        let today = date(2026, 1, 1);
        assert!(NewLot::boxes(1 << 61, expiry).validate(today).is_err());
        // Each count fits on its own; the unit total doesn't
        let new_lot = NewLot::boxes(MAX_LOT_UNITS / 10, expiry).with_blisters(5);
        assert!(new_lot.validate(today).is_ok());
        assert!(new_lot.quantities(10).unwrap_err().to_string().contains("units"));

        let mut lot = lot_with(MAX_LOT_UNITS, 10);
        let before = lot.clone();
        assert!(lot.credit(1, 10).is_err());
        assert!(lot.credit(i64::MAX, 10).is_err());
        assert_eq!(lot, before);
    }

    #[test]
    fn test_new_lot_validation() {
        let today = date(2026, 1, 1);
        assert!(NewLot::boxes(3, date(2027, 1, 1)).validate(today).is_ok());
        assert!(NewLot::boxes(-3, date(2027, 1, 1)).validate(today).is_err());
        assert!(NewLot::boxes(3, date(2025, 12, 31)).validate(today).is_err());
        assert!(NewLot::boxes(3, date(2027, 1, 1))
            .manufactured(date(2027, 2, 1))
            .validate(today)
            .is_err());
    }

    #[test]
    fn test_lot_code_prefix_handles_unicode_and_short_names() {
        assert_eq!(lot_code_prefix("ácido fólico"), "ÁC");
        assert_eq!(lot_code_prefix(""), "XX");
        assert_eq!(lot_code("Ibuprofeno", 1), "IB01LT");
    }
}
