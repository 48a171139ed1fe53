//! # Error Types
//!
//! Domain-specific error types for apoteca-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  apoteca-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule and referential failures         │
//! │  └── ValidationError  - Structurally invalid caller input              │
//! │                                                                         │
//! │  apoteca-db errors (separate crate)                                    │
//! │  ├── DbError          - Storage failures, lock contention              │
//! │  └── LedgerError      - CoreError | DbError, what callers match on     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → caller message      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations, never bugs. Callers translate
/// them into user-facing messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Lot cannot be found.
    #[error("Lot not found: {0}")]
    LotNotFound(String),

    /// Sale cannot be found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Not enough units across the product's lots to satisfy a request.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart: 2 boxes (ratio 10) + 5 blisters of AMOXIL
    ///      │
    ///      ▼
    /// deplete(AMOXIL, 25) with 18 units in stock
    ///      │
    ///      ▼
    /// InsufficientStock { available: 18, requested: 25 }  → shortfall 7
    ///      │
    ///      ▼
    /// UI shows: "Only 18 blisters of AMOXIL in stock"
    /// ```
    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Product is still referenced by sale lines and cannot be deleted.
    #[error("Product {product_id} is referenced by {sale_lines} sale line(s)")]
    ProductInUse { product_id: String, sale_lines: i64 },

    /// Lot still holds stock; deletion needs operator confirmation.
    #[error("Lot {lot_code} still holds {available} unit(s); confirmation required")]
    LotNotEmpty { lot_code: String, available: i64 },

    /// A sale was requested with no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Units missing to satisfy the request, for `InsufficientStock`.
    pub fn shortfall(&self) -> Option<i64> {
        match self {
            CoreError::InsufficientStock {
                available,
                requested,
                ..
            } => Some(requested - available),
            _ => None,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any mutation; the caller can always recover by correcting
/// the input.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// A quantity that can never be negative was.
    #[error("{field} cannot be negative (got {value})")]
    NegativeQuantity { field: String, value: i64 },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Lot expiry date is already in the past.
    #[error("Lot expiry {expiry} is before today ({today})")]
    ExpiredLot { expiry: NaiveDate, today: NaiveDate },

    /// Manufacture date is not strictly before the expiry date.
    #[error("Manufacture date {manufactured} must be before expiry {expiry}")]
    ManufactureAfterExpiry {
        manufactured: NaiveDate,
        expiry: NaiveDate,
    },

    /// Sale price per box is below purchase price.
    #[error("Sale price {sale} is below purchase price {purchase}")]
    PriceBelowCost { sale: Money, purchase: Money },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_and_shortfall() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            available: 130,
            requested: 131,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product p-1: available 130, requested 131"
        );
        assert_eq!(err.shortfall(), Some(1));
        assert_eq!(CoreError::EmptyCart.shortfall(), None);
    }

    #[test]
    fn test_validation_error_messages() {
        let expiry = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let err = ValidationError::ExpiredLot { expiry, today };
        assert_eq!(
            err.to_string(),
            "Lot expiry 2025-01-01 is before today (2025-03-01)"
        );

        let err = ValidationError::NegativeQuantity {
            field: "boxes".to_string(),
            value: -2,
        };
        assert_eq!(err.to_string(), "boxes cannot be negative (got -2)");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
