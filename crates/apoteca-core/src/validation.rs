//! # Validation Module
//!
//! Input validation for the ledger. Every check here runs before any
//! mutation and fails fast with a typed [`ValidationError`]; nothing is
//! silently defaulted. Lenient parsing of spreadsheets belongs in an import
//! adapter, not here.
//!
//! ## Usage
//! ```rust
//! use apoteca_core::validation::{validate_quantity, validate_non_negative};
//!
//! validate_quantity(5).unwrap();
//! assert!(validate_non_negative("boxes", -1).is_err());
//! ```

use chrono::{NaiveDate, TimeDelta};

use crate::error::ValidationError;
use crate::pricing::{check_margin, PricePolicy};
use crate::types::Product;
use crate::{MAX_BLISTERS_PER_BOX, MAX_CART_LINES, MAX_DAYS_AHEAD, MAX_LINE_QUANTITY, MAX_LOT_UNITS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 100 characters
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 100,
        });
    }

    Ok(())
}

/// Validates an optional barcode.
///
/// ## Rules
/// - Digits and letters only, 1 to 50 characters
pub fn validate_barcode(barcode: Option<&str>) -> ValidationResult<()> {
    let Some(code) = barcode else {
        return Ok(());
    };

    if code.is_empty() || code.len() > 50 {
        return Err(ValidationError::OutOfRange {
            field: "barcode length".to_string(),
            min: 1,
            max: 50,
        });
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain only letters and digits".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Rejects negative counts (boxes, blisters, units).
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::NegativeQuantity {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

/// Validates a unit count passed to a debit or credit.
pub fn validate_units(units: i64) -> ValidationResult<()> {
    validate_non_negative("units", units)
}

/// Validates a count a lot may hold (boxes, blisters or units).
///
/// ## Rules
/// - Not negative
/// - At most MAX_LOT_UNITS
pub fn validate_lot_count(field: &str, value: i64) -> ValidationResult<()> {
    validate_non_negative(field, value)?;

    if value > MAX_LOT_UNITS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_LOT_UNITS,
        });
    }
    Ok(())
}

/// Validates the number of lines in a cart.
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines > MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 1,
            max: MAX_CART_LINES as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Validates the dates of a lot being received.
///
/// ## Rules
/// - `expiry` must not be before `today`
/// - `manufactured`, when given, must be strictly before `expiry`
pub fn validate_lot_dates(
    expiry: NaiveDate,
    manufactured: Option<NaiveDate>,
    today: NaiveDate,
) -> ValidationResult<()> {
    if expiry < today {
        return Err(ValidationError::ExpiredLot { expiry, today });
    }

    if let Some(manufactured) = manufactured {
        if manufactured >= expiry {
            return Err(ValidationError::ManufactureAfterExpiry {
                manufactured,
                expiry,
            });
        }
    }

    Ok(())
}

/// Validates a span of days counted forward from today.
///
/// ## Rules
/// - Between 0 and MAX_DAYS_AHEAD
pub fn validate_days(field: &str, days: i64) -> ValidationResult<()> {
    if !(0..=MAX_DAYS_AHEAD).contains(&days) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_DAYS_AHEAD,
        });
    }
    Ok(())
}

/// `today + days`, with `days` checked by [`validate_days`].
pub fn date_after(today: NaiveDate, field: &str, days: i64) -> ValidationResult<NaiveDate> {
    validate_days(field, days)?;
    TimeDelta::try_days(days)
        .and_then(|span| today.checked_add_signed(span))
        .ok_or_else(|| ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_DAYS_AHEAD,
        })
}

// =============================================================================
// Product Validators
// =============================================================================

/// Validates a product before it is saved.
pub fn validate_product(product: &Product, policy: PricePolicy) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    validate_barcode(product.barcode.as_deref())?;

    if product.blisters_per_box <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "blisters_per_box".to_string(),
        });
    }
    if product.blisters_per_box > MAX_BLISTERS_PER_BOX {
        return Err(ValidationError::OutOfRange {
            field: "blisters_per_box".to_string(),
            min: 1,
            max: MAX_BLISTERS_PER_BOX,
        });
    }

    validate_non_negative("purchase_price_cents", product.purchase_price_cents)?;
    validate_non_negative("sale_price_cents", product.sale_price_cents)?;
    if let Some(explicit) = product.explicit_blister_price_cents {
        validate_non_negative("explicit_blister_price_cents", explicit)?;
    }
    validate_non_negative("min_stock", product.min_stock)?;

    check_margin(product, policy)
}
