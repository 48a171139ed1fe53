//! # Packaging Conversion
//!
//! Stock is counted in indivisible units (blisters). A product's
//! `blisters_per_box` ratio converts between that count and the
//! (boxes, blisters) pair shown on shelves and receipts.
//!
//! ```text
//! ratio = 10
//!
//!   34 units ──► to_boxes_and_blisters ──► (3 boxes, 4 blisters)
//!   (3, 4)   ──► to_units              ──► 34 units
//! ```
//!
//! A ratio `<= 0` is treated as 1 everywhere. Products are validated to have
//! a positive ratio on save, so this only guards rows that bypass validation.

use crate::error::ValidationError;
use crate::types::SaleUnit;
use crate::validation::ValidationResult;

/// Returns the ratio actually used for conversion (`<= 0` becomes 1).
#[inline]
pub const fn effective_ratio(ratio: i64) -> i64 {
    if ratio <= 0 {
        1
    } else {
        ratio
    }
}

/// Splits a unit count into whole boxes and remaining blisters.
///
/// ## Example
/// ```rust
/// use apoteca_core::packaging::to_boxes_and_blisters;
///
/// assert_eq!(to_boxes_and_blisters(34, 10), (3, 4));
/// assert_eq!(to_boxes_and_blisters(7, 0), (7, 0));
/// ```
#[inline]
pub const fn to_boxes_and_blisters(total_units: i64, ratio: i64) -> (i64, i64) {
    let ratio = effective_ratio(ratio);
    (total_units / ratio, total_units % ratio)
}

/// Converts boxes plus loose blisters into a unit count.
///
/// Fails with `OutOfRange` instead of overflowing.
///
/// ## Example
/// ```rust
/// use apoteca_core::packaging::to_units;
///
/// assert_eq!(to_units(3, 4, 10).unwrap(), 34);
/// assert!(to_units(1 << 61, 0, 10).is_err());
/// ```
pub fn to_units(boxes: i64, blisters: i64, ratio: i64) -> ValidationResult<i64> {
    boxes
        .checked_mul(effective_ratio(ratio))
        .and_then(|units| units.checked_add(blisters))
        .ok_or_else(unit_overflow)
}

/// Converts a sale quantity in the given unit into indivisible units.
///
/// ## Example
/// ```rust
/// use apoteca_core::packaging::units_for;
/// use apoteca_core::SaleUnit;
///
/// assert_eq!(units_for(2, SaleUnit::Box, 10).unwrap(), 20);
/// assert_eq!(units_for(2, SaleUnit::Blister, 10).unwrap(), 2);
/// ```
pub fn units_for(quantity: i64, unit: SaleUnit, ratio: i64) -> ValidationResult<i64> {
    match unit {
        SaleUnit::Box => quantity
            .checked_mul(effective_ratio(ratio))
            .ok_or_else(unit_overflow),
        SaleUnit::Blister => Ok(quantity),
    }
}

/// Adds two unit counts, failing with `OutOfRange` on overflow.
pub fn add_units(a: i64, b: i64) -> ValidationResult<i64> {
    a.checked_add(b).ok_or_else(unit_overflow)
}

fn unit_overflow() -> ValidationError {
    ValidationError::OutOfRange {
        field: "units".to_string(),
        min: 0,
        max: i64::MAX,
    }
}
